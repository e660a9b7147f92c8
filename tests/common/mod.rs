#![allow(dead_code)]

use brain::kernel::event::{ChannelEvent, PresentationChannel};
use brain::{Brain, BrainConfig, ClassifiedUtterance};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const SEED: u64 = 7;

/// Throwaway data/skills/tmp tree with one `sh` skill script.
pub struct Fixture {
    pub dir: TempDir,
    pub config: BrainConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write_json(
            &root.join("data/en/answers.json"),
            json!({
                "answers": {
                    "random_not_sure": ["Sorry, I'm not sure"],
                    "random_skill_errors": ["Sorry, %skill_name% from %domain_name% crashed"],
                    "synchronizer": { "synced_direct": "Content synced" }
                }
            }),
        );
        write_json(
            &root.join("data/fr/answers.json"),
            json!({
                "answers": {
                    "random_not_sure": "Désolé, je ne suis pas sûr",
                    "random_skill_errors": ["Désolé, %skill_name% a planté"]
                }
            }),
        );
        write_json(
            &root.join("langs.json"),
            json!({
                "langs": {
                    "en-US": { "short": "en", "min_confidence": 0.6 },
                    "fr-FR": { "short": "fr", "min_confidence": 0.5 }
                }
            }),
        );
        write_json(&root.join("skills/leon/domain.json"), json!({ "name": "Leon" }));
        write_json(&root.join("skills/leon/greeting/skill.json"), json!({ "name": "Greeting" }));
        write_json(
            &root.join("skills/leon/greeting/config/en.json"),
            json!({
                "actions": {
                    "talk": {
                        "type": "dialog",
                        "next_action": "follow_up",
                        "unknown_answers": ["I don't know that color."]
                    },
                    "follow_up": { "type": "dialog", "suggestions": ["Tell me more"] },
                    "bare": { "type": "dialog" }
                },
                "entities": {
                    "color": {
                        "options": {
                            "red": { "data": { "usage": ["stop signs"] } }
                        }
                    }
                }
            }),
        );
        write_json(
            &root.join("skills/leon/greeting/actions.json"),
            json!({
                "actions": {
                    "run": { "type": "logic" },
                    "suggest_run": {
                        "type": "logic",
                        "next_action": "follow",
                        "suggestions": ["Again"]
                    },
                    "follow": { "type": "logic", "suggestions": ["Yes", "No"] },
                    "talk": { "type": "dialog", "next_action": "follow_up" },
                    "follow_up": { "type": "dialog", "suggestions": ["Tell me more"] },
                    "bare": { "type": "dialog" }
                }
            }),
        );

        let config = BrainConfig {
            data_dir: root.join("data"),
            langs_path: root.join("langs.json"),
            skills_dir: root.join("skills"),
            tmp_dir: root.join("tmp"),
            skill_command: vec!["sh".to_string(), root.join("skill.sh").display().to_string()],
            skill_timeout: Duration::from_secs(10),
            lang: "en".to_string(),
            sync_url: None,
        };

        let fixture = Self { dir, config };
        fixture.skill("exit 0");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Replaces the skill script. `$1` is the intent file path.
    pub fn skill(&self, script: &str) {
        std::fs::write(self.root().join("skill.sh"), script).unwrap();
    }

    pub async fn brain(&self) -> (Brain, UnboundedReceiver<ChannelEvent>) {
        let (channel, events) = PresentationChannel::new();
        let brain = Brain::new(self.config.clone(), channel)
            .await
            .unwrap()
            .with_rng_seed(SEED);
        (brain, events)
    }

    pub fn utterance(&self, action: &str, confidence: f64) -> ClassifiedUtterance {
        self.utterance_with(action, confidence, json!([]), json!([]))
    }

    pub fn utterance_with(&self, action: &str, confidence: f64, entities: Value, answers: Value) -> ClassifiedUtterance {
        serde_json::from_value(json!({
            "utterance": "Hello there",
            "lang": "en",
            "classification": {
                "domain": "leon",
                "skill": "greeting",
                "action": action,
                "confidence": confidence
            },
            "entities": entities.clone(),
            "currentEntities": entities,
            "resolvers": [],
            "currentResolvers": [],
            "slots": { "name": { "value": "Ada" } },
            "answers": answers,
            "configDataFilePath": self.root().join("skills/leon/greeting/actions.json")
        }))
        .unwrap()
    }

    /// Files left in the intent directory.
    pub fn tmp_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.config.tmp_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn write_json(path: &Path, value: Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

/// Everything emitted so far.
pub fn drain(events: &mut UnboundedReceiver<ChannelEvent>) -> Vec<ChannelEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub fn answers(events: &[ChannelEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::Answer(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

pub fn entity(name: &str, option: &str, value: &str) -> Value {
    json!([{
        "entity": name,
        "option": option,
        "sourceText": value,
        "resolution": { "value": value }
    }])
}

pub fn candidates(texts: &[&str]) -> Value {
    Value::Array(texts.iter().map(|t| json!({ "answer": t })).collect())
}
