use serde::{Deserialize, Serialize};

use crate::kernel::error::{Severity, SkillFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    AskedToRepeat,
    DialogAnswered,
    LogicCompleted,
    /// Logic dispatch dropped because a skill was already running.
    LogicDropped,
    Warning,
    Failed,
    TimedOut,
    Cancelled,
}

impl From<&SkillFailure> for OutcomeKind {
    fn from(failure: &SkillFailure) -> Self {
        match failure {
            SkillFailure::Timeout { .. } => OutcomeKind::TimedOut,
            SkillFailure::Cancelled => OutcomeKind::Cancelled,
            other if other.severity() == Severity::Warning => OutcomeKind::Warning,
            _ => OutcomeKind::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    SkillSpawned,

    Settled {
        outcome: OutcomeKind,
        execution_time_ms: u64,
        speech_count: usize,
    },
}
