mod common;

use async_trait::async_trait;
use brain::kernel::cancel::CancellationToken;
use brain::kernel::error::{Severity, SkillFailure};
use brain::kernel::event::ChannelEvent;
use brain::kernel::skill::IntentObject;
use brain::kernel::sync::{SyncJob, Synchronizer};
use brain::kernel::types::CoreFlags;
use brain::ExecuteOptions;
use common::{answers, drain, Fixture};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CLEAN_SKILL: &str = r#"echo '{"output":{"type":"inter","speech":"Looking..."}}'
echo '{"output":{"type":"end","speech":"Done","core":{}}}'
"#;

#[tokio::test]
async fn test_clean_logic_skill() {
    let fixture = Fixture::new();
    fixture.skill(CLEAN_SKILL);
    let (brain, mut events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.speeches, vec!["Looking...".to_string(), "Done".to_string()]);
    assert_eq!(result.core, Some(CoreFlags::default()));
    assert_eq!(result.utterance.lang, "en");
    assert!(result.action.is_some());
    assert!(fixture.tmp_files().is_empty(), "intent file must be deleted");
    assert!(!brain.is_busy());

    assert_eq!(
        drain(&mut events),
        vec![
            ChannelEvent::Answer("Looking...".into()),
            ChannelEvent::Answer("Done".into()),
            ChannelEvent::IsTyping(false),
        ]
    );
    println!("Logic Passed: intermediate then final speech");
}

#[tokio::test]
async fn test_result_carries_utterance_fields_at_top_level() {
    let fixture = Fixture::new();
    fixture.skill(CLEAN_SKILL);
    let (brain, _events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["classification"]["skill"], "greeting");
    assert_eq!(json["slots"]["name"]["value"], "Ada");
    assert_eq!(json["utterance"], "Hello there");
    assert_eq!(json["lang"], "en");
    assert_eq!(json["utteranceId"], result.utterance_id.as_str());
    assert_eq!(json["speeches"], json!(["Looking...", "Done"]));
    assert!(json.get("configDataFilePath").is_some());
}

#[tokio::test]
async fn test_final_frame_may_span_lines() {
    let fixture = Fixture::new();
    fixture.skill("printf '{\"output\":{\"type\":\"end\",\\n\"speech\":\"Done\"}}\\n'\n");
    let (brain, _events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.speeches, vec!["Done".to_string()]);
    assert!(result.core.is_none());
}

#[tokio::test]
async fn test_stderr_fails_with_apology() {
    let fixture = Fixture::new();
    fixture.skill("echo '{\"output\":{\"type\":\"inter\",\"speech\":\"Looking...\"}}'\nsleep 0.2\necho boom >&2\nsleep 0.2\n");
    let (brain, mut events) = fixture.brain().await;

    let failure = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, Severity::Error);
    assert!(matches!(&failure.cause, SkillFailure::Runtime(raw) if raw.trim() == "boom"));
    assert_eq!(
        failure.speeches,
        vec![
            "Looking...".to_string(),
            "Sorry, Greeting from Leon crashed!".to_string()
        ]
    );
    assert!(fixture.tmp_files().is_empty());
    assert!(!brain.is_busy(), "slot must be released on failure");

    let emitted = drain(&mut events);
    assert_eq!(answers(&emitted), failure.speeches);
    assert_eq!(emitted.last(), Some(&ChannelEvent::IsTyping(false)));

    // The brain keeps working after a failed skill.
    fixture.skill(CLEAN_SKILL);
    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(result.speeches.len(), 2);
}

#[tokio::test]
async fn test_non_json_output_is_an_error() {
    let fixture = Fixture::new();
    fixture.skill("echo 'not json'\n");
    let (brain, _events) = fixture.brain().await;

    let failure = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, Severity::Error);
    assert!(matches!(failure.cause, SkillFailure::NonJsonOutput { .. }));
    assert!(failure.cause.to_string().contains("isn't returning JSON format"));
    assert!(fixture.tmp_files().is_empty());

    let serialized = serde_json::to_value(&failure).unwrap();
    assert_eq!(serialized["type"], "error");
    assert!(serialized["executionTime"].is_u64());
}

#[tokio::test]
async fn test_object_without_output_is_an_error() {
    let fixture = Fixture::new();
    fixture.skill("echo '{\"speech\":\"hi\"}'\n");
    let (brain, _events) = fixture.brain().await;

    let failure = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, Severity::Error);
    assert!(matches!(failure.cause, SkillFailure::NonJsonOutput { .. }));
}

#[tokio::test]
async fn test_non_object_output_is_a_warning() {
    let fixture = Fixture::new();
    fixture.skill("echo 42\n");
    let (brain, _events) = fixture.brain().await;

    let failure = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(failure.kind, Severity::Warning);
    assert!(matches!(failure.cause, SkillFailure::Malformed { ref skill, ref domain } if skill == "Greeting" && domain == "Leon"));
    assert_eq!(serde_json::to_value(&failure).unwrap()["type"], "warning");
}

#[tokio::test]
async fn test_next_action_suggestions() {
    let fixture = Fixture::new();
    fixture.skill(
        r#"echo '{"output":{"type":"end","speech":"Done","core":{"showSuggestions":true,"showNextActionSuggestions":true}}}'
"#,
    );
    let (brain, mut events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("suggest_run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.next_action.unwrap().suggestions, vec!["Yes", "No"]);

    // Next action's list first, then the current action's.
    let suggested: Vec<ChannelEvent> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, ChannelEvent::Suggest(_)))
        .collect();
    assert_eq!(
        suggested,
        vec![
            ChannelEvent::Suggest(vec!["Yes".into(), "No".into()]),
            ChannelEvent::Suggest(vec!["Again".into()]),
        ]
    );
}

#[tokio::test]
async fn test_current_suggestions_when_next_not_allowed() {
    let fixture = Fixture::new();
    fixture.skill(r#"echo '{"output":{"type":"end","speech":"Done","core":{"showSuggestions":true}}}'
"#);
    let (brain, mut events) = fixture.brain().await;

    brain
        .execute(fixture.utterance("suggest_run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(
        drain(&mut events).last(),
        Some(&ChannelEvent::Suggest(vec!["Again".into()]))
    );
}

#[tokio::test]
async fn test_second_logic_dispatch_is_dropped() {
    let fixture = Fixture::new();
    let spawns = fixture.root().join("spawns");
    fixture.skill(&format!(
        "echo x >> '{}'\nsleep 1\necho '{{\"output\":{{\"type\":\"end\",\"speech\":\"Done\"}}}}'\n",
        spawns.display()
    ));
    let (brain, _events) = fixture.brain().await;
    let brain = Arc::new(brain);

    let first = {
        let brain = brain.clone();
        let utterance = fixture.utterance("run", 0.9);
        tokio::spawn(async move { brain.execute(utterance, ExecuteOptions::default()).await })
    };

    for _ in 0..200 {
        if brain.is_busy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(brain.is_busy());

    let dropped = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();
    assert!(dropped.speeches.is_empty());

    let completed = first.await.unwrap().unwrap();
    assert_eq!(completed.speeches, vec!["Done".to_string()]);

    assert_eq!(std::fs::read_to_string(&spawns).unwrap().lines().count(), 1);
    let snapshot = brain.telemetry().await;
    assert_eq!(snapshot.skills_spawned, 1);
    assert_eq!(snapshot.outcomes.logic_dropped, 1);
    assert_eq!(snapshot.outcomes.logic_completed, 1);
    println!("Concurrency Passed: one skill process per brain");
}

#[tokio::test]
async fn test_skill_settles_once_stdout_closes() {
    let mut fixture = Fixture::new();
    fixture.config.skill_timeout = Duration::from_millis(1500);
    // Answer, close stdout, then keep running while still holding stderr.
    fixture.skill("echo '{\"output\":{\"type\":\"end\",\"speech\":\"Done\"}}'\nexec 1>&-\nsleep 5\n");
    let (brain, _events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.speeches, vec!["Done".to_string()]);
    assert!(result.execution_time < 1500);
    assert!(fixture.tmp_files().is_empty());
    assert!(!brain.is_busy());
}

#[tokio::test]
async fn test_hung_skill_times_out() {
    let mut fixture = Fixture::new();
    fixture.config.skill_timeout = Duration::from_millis(200);
    fixture.skill("sleep 5\n");
    let (brain, _events) = fixture.brain().await;

    let failure = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(failure.cause, SkillFailure::Timeout { timeout_ms: 200, .. }));
    assert_eq!(failure.kind, Severity::Error);
    assert_eq!(failure.speeches, vec!["Sorry, Greeting from Leon crashed!".to_string()]);
    assert!(failure.execution_time < 5_000);
    assert!(fixture.tmp_files().is_empty());
    assert!(!brain.is_busy());
    assert_eq!(brain.telemetry().await.outcomes.timeouts, 1);
}

#[tokio::test]
async fn test_cancellation_settles_quietly() {
    let fixture = Fixture::new();
    fixture.skill("sleep 5\n");
    let (brain, mut events) = fixture.brain().await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let options = ExecuteOptions {
        mute: false,
        cancel: Some(cancel),
    };
    let failure = brain
        .execute(fixture.utterance("run", 0.9), options)
        .await
        .unwrap_err();

    assert!(matches!(failure.cause, SkillFailure::Cancelled));
    assert!(failure.speeches.is_empty());
    assert!(drain(&mut events).is_empty());
    assert!(fixture.tmp_files().is_empty());
    assert!(!brain.is_busy());
}

#[tokio::test]
async fn test_intent_file_is_readable_by_the_skill() {
    let fixture = Fixture::new();
    let copy = fixture.root().join("intent_copy.json");
    fixture.skill(&format!(
        "if [ -f \"$1\" ]; then cp \"$1\" '{}'; fi\necho '{{\"output\":{{\"type\":\"end\",\"speech\":\"Done\"}}}}'\n",
        copy.display()
    ));
    let (brain, _events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    let intent = IntentObject::read(&copy).await.unwrap();
    assert_eq!(intent.id, result.utterance_id);
    assert_eq!(intent.lang, "en");
    assert_eq!(intent.domain, "leon");
    assert_eq!(intent.skill, "greeting");
    assert_eq!(intent.action, "run");
    assert_eq!(intent.utterance, "Hello there");
    assert_eq!(intent.slots.get("name"), Some(&json!("Ada")));
    assert!(fixture.tmp_files().is_empty());
}

#[derive(Default)]
struct RecordingSynchronizer {
    jobs: Mutex<Vec<SyncJob>>,
}

#[async_trait]
impl Synchronizer for RecordingSynchronizer {
    async fn synchronize(&self, job: &SyncJob) -> anyhow::Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

const SYNCING_SKILL: &str = r#"echo '{"output":{"type":"end","speech":"Done","options":{"synchronization":{"enabled":true,"email":"ada@example.com"}}}}'
"#;

#[tokio::test]
async fn test_synchronization_is_announced() {
    let fixture = Fixture::new();
    fixture.skill(SYNCING_SKILL);
    let synchronizer = Arc::new(RecordingSynchronizer::default());
    let (brain, _events) = fixture.brain().await;
    let brain = brain.with_synchronizer(synchronizer.clone());

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.speeches, vec!["Done".to_string(), "Content synced".to_string()]);
    let jobs = synchronizer.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].method(), "direct");
    assert_eq!(jobs[0].classification.skill, "greeting");
    assert_eq!(jobs[0].options.extra["email"], "ada@example.com");
}

#[tokio::test]
async fn test_synchronization_needs_a_final_speech() {
    let fixture = Fixture::new();
    fixture.skill(
        r#"echo '{"output":{"type":"end","options":{"synchronization":{"enabled":true}}}}'
"#,
    );
    let synchronizer = Arc::new(RecordingSynchronizer::default());
    let (brain, _events) = fixture.brain().await;
    let brain = brain.with_synchronizer(synchronizer.clone());

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert!(result.speeches.is_empty());
    assert!(synchronizer.jobs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_synchronization_without_synchronizer_is_skipped() {
    let fixture = Fixture::new();
    fixture.skill(SYNCING_SKILL);
    let (brain, _events) = fixture.brain().await;

    let result = brain
        .execute(fixture.utterance("run", 0.9), ExecuteOptions::default())
        .await
        .unwrap();

    assert_eq!(result.speeches, vec!["Done".to_string()]);
}
