use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::config::ConfigError;
use super::dialog::DialogError;
use super::speech::answers::AnswerError;

/// Tag carried by every rejection, mirrored to the UI as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Why one invocation could not settle successfully.
#[derive(Debug, thiserror::Error)]
pub enum SkillFailure {
    #[error("The \"{skill}\" skill from the \"{domain}\" domain isn't returning JSON format.")]
    NonJsonOutput { skill: String, domain: String },

    #[error("The \"{skill}\" skill from the \"{domain}\" domain is not well configured. Check the configuration file.")]
    Malformed { skill: String, domain: String },

    /// Raw stderr text of the skill.
    #[error("{0}")]
    Runtime(String),

    #[error("The \"{skill}\" skill from the \"{domain}\" domain did not finish within {timeout_ms}ms")]
    Timeout {
        skill: String,
        domain: String,
        timeout_ms: u64,
    },

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("Failed to launch skill process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Skill process stream failed: {0}")]
    Io(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Dialog(#[from] DialogError),
}

impl SkillFailure {
    pub fn severity(&self) -> Severity {
        match self {
            SkillFailure::Malformed { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Failures the user hears an apology for. Cancellation is caller-initiated.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, SkillFailure::Cancelled)
    }
}

/// Rejection value of `execute`. Carries the speeches produced before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct ExecutionError {
    pub kind: Severity,
    pub cause: SkillFailure,
    pub speeches: Vec<String>,
    pub execution_time: u64,
}

impl Serialize for ExecutionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ExecutionError", 4)?;
        state.serialize_field("type", &self.kind)?;
        state.serialize_field("cause", &self.cause.to_string())?;
        state.serialize_field("speeches", &self.speeches)?;
        state.serialize_field("executionTime", &self.execution_time)?;
        state.end()
    }
}

/// Construction and language-switch failures of the brain itself.
#[derive(Debug, thiserror::Error)]
pub enum BrainError {
    #[error("Language \"{0}\" is not supported")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
