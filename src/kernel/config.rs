use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::types::Suggestion;

const DEFAULT_SKILL_COMMAND: &str = "pipenv run python bridges/python/main.py";
const DEFAULT_SKILL_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Action \"{action}\" is not defined in {path}")]
    UnknownAction { action: String, path: PathBuf },
}

/// Reads and deserializes one JSON file.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Process-level settings of the brain, loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct BrainConfig {
    /// Answer corpora live at `<data_dir>/<lang>/answers.json`.
    pub data_dir: PathBuf,
    pub langs_path: PathBuf,
    pub skills_dir: PathBuf,
    /// Intent object files are written here.
    pub tmp_dir: PathBuf,
    /// Program and leading arguments; the intent file path is appended.
    pub skill_command: Vec<String>,
    pub skill_timeout: Duration,
    pub lang: String,
    pub sync_url: Option<String>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("core/data"),
            langs_path: PathBuf::from("core/langs.json"),
            skills_dir: PathBuf::from("skills"),
            tmp_dir: PathBuf::from("tmp"),
            skill_command: split_command(DEFAULT_SKILL_COMMAND),
            skill_timeout: Duration::from_millis(DEFAULT_SKILL_TIMEOUT_MS),
            lang: "en".to_string(),
            sync_url: None,
        }
    }
}

impl BrainConfig {
    /// Loads configuration from environment variables. Every value has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Self::default();

        let skill_command = match std::env::var("BRAIN_SKILL_COMMAND") {
            Ok(raw) => {
                let command = split_command(&raw);
                if command.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "BRAIN_SKILL_COMMAND".to_string(),
                        "command is empty".to_string(),
                    ));
                }
                command
            }
            Err(_) => defaults.skill_command,
        };

        let skill_timeout = match std::env::var("BRAIN_SKILL_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| {
                    ConfigError::InvalidValue("BRAIN_SKILL_TIMEOUT_MS".to_string(), e.to_string())
                })?,
            Err(_) => defaults.skill_timeout,
        };

        Ok(Self {
            data_dir: env_path("BRAIN_DATA_DIR").unwrap_or(defaults.data_dir),
            langs_path: env_path("BRAIN_LANGS_PATH").unwrap_or(defaults.langs_path),
            skills_dir: env_path("BRAIN_SKILLS_DIR").unwrap_or(defaults.skills_dir),
            tmp_dir: env_path("BRAIN_TMP_DIR").unwrap_or(defaults.tmp_dir),
            skill_command,
            skill_timeout,
            lang: std::env::var("BRAIN_LANG").unwrap_or(defaults.lang),
            sync_url: std::env::var("BRAIN_SYNC_URL").ok().filter(|u| !u.is_empty()),
        })
    }

    pub fn answers_path(&self, lang: &str) -> PathBuf {
        self.data_dir.join(lang).join("answers.json")
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LangSpec {
    pub short: String,
    pub min_confidence: f64,
}

/// Supported languages keyed by long code (`en-US`), looked up by short code (`en`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LangTable {
    #[serde(default)]
    langs: BTreeMap<String, LangSpec>,
}

impl LangTable {
    pub fn new(langs: BTreeMap<String, LangSpec>) -> Self {
        Self { langs }
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path).await
    }

    pub fn long_code(&self, short: &str) -> Option<&str> {
        self.langs
            .iter()
            .find(|(_, spec)| spec.short == short)
            .map(|(long, _)| long.as_str())
    }

    pub fn min_confidence(&self, short: &str) -> Option<f64> {
        self.long_code(short)
            .and_then(|long| self.langs.get(long))
            .map(|spec| spec.min_confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Logic,
    Dialog,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(rename = "type")]
    pub kind: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
    /// Dialog fallback when an answer needs an entity the utterance lacks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_answers: Vec<String>,
}

/// `{ actions: { [name]: ActionDefinition } }`, loaded fresh for every invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionsFile {
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,
}

impl ActionsFile {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path).await
    }

    /// Looks up `name` and the definition its `next_action` points at.
    /// A dangling `next_action` resolves to `None`.
    pub fn resolve(
        &self,
        name: &str,
        path: &Path,
    ) -> Result<(ActionDefinition, Option<ActionDefinition>), ConfigError> {
        let action = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownAction {
                action: name.to_string(),
                path: path.to_path_buf(),
            })?;

        let next_action = match action.next_action.as_deref() {
            Some(next) => {
                let found = self.actions.get(next).cloned();
                if found.is_none() {
                    warn!(action = name, next_action = next, "Next action is not defined");
                }
                found
            }
            None => None,
        };

        Ok((action, next_action))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityOption {
    #[serde(default)]
    pub data: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityDefinition {
    #[serde(default)]
    pub options: BTreeMap<String, EntityOption>,
}

/// Per-skill dialog configuration: `<skills>/<domain>/<skill>/config/<lang>.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillConfig {
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDefinition>,
}

impl SkillConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendlyNames {
    pub skill: String,
    pub domain: String,
}

#[derive(Deserialize)]
struct NamedInfo {
    name: String,
}

/// Resolves skill/domain metadata from the skills directory.
#[derive(Debug, Clone)]
pub struct SkillCatalog {
    skills_dir: PathBuf,
}

impl SkillCatalog {
    pub fn new(skills_dir: impl Into<PathBuf>) -> Self {
        Self {
            skills_dir: skills_dir.into(),
        }
    }

    pub fn skill_config_path(&self, domain: &str, skill: &str, lang: &str) -> PathBuf {
        self.skills_dir
            .join(domain)
            .join(skill)
            .join("config")
            .join(format!("{lang}.json"))
    }

    /// Display names for apologies. Falls back to the raw identifiers.
    pub async fn friendly_names(&self, domain: &str, skill: &str) -> FriendlyNames {
        let domain_path = self.skills_dir.join(domain).join("domain.json");
        let skill_path = self.skills_dir.join(domain).join(skill).join("skill.json");

        FriendlyNames {
            skill: Self::name_or(&skill_path, skill).await,
            domain: Self::name_or(&domain_path, domain).await,
        }
    }

    async fn name_or(path: &Path, fallback: &str) -> String {
        match read_json::<NamedInfo>(path).await {
            Ok(info) => info.name,
            Err(e) => {
                warn!("Using raw identifier \"{}\": {}", fallback, e);
                fallback.to_string()
            }
        }
    }
}
