use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::config::ActionDefinition;

pub type Suggestion = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub domain: String,
    pub skill: String,
    pub action: String,
    /// 0.0 - 1.0
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityResolution {
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entity extracted by the classifier. Unknown fields are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    pub resolution: EntityResolution,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityMatch {
    pub fn resolved_text(&self) -> String {
        value_text(&self.resolution.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCandidate {
    pub answer: String,
}

/// Output of the classifier. Immutable input of one `execute` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedUtterance {
    pub utterance: String,
    #[serde(default)]
    pub lang: String,
    pub classification: Classification,
    #[serde(default)]
    pub entities: Vec<EntityMatch>,
    #[serde(default)]
    pub current_entities: Vec<EntityMatch>,
    #[serde(default)]
    pub resolvers: Vec<Value>,
    #[serde(default)]
    pub current_resolvers: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<BTreeMap<String, Slot>>,
    /// Static answer candidates, dialog actions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<AnswerCandidate>>,
    pub config_data_file_path: PathBuf,
}

/// Flags a logic skill returns in its final frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreFlags {
    #[serde(default)]
    pub show_suggestions: bool,
    #[serde(default)]
    pub show_next_action_suggestions: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Terminal value of one `execute` call. The classified utterance is
/// flattened into it, so `classification`, `entities`, `slots`... sit at the
/// top level next to the execution fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub utterance_id: String,
    /// Its `lang` is the utterance's own when set, the brain's otherwise.
    #[serde(flatten)]
    pub utterance: ClassifiedUtterance,
    pub speeches: Vec<String>,
    pub core: Option<CoreFlags>,
    pub action: Option<ActionDefinition>,
    pub next_action: Option<ActionDefinition>,
    /// Milliseconds, invocation start to settlement.
    pub execution_time: u64,
}

/// Text form of a JSON scalar as it would be spoken.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
