use std::collections::VecDeque;

use super::event::{OutcomeKind, TelemetryEvent};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub outcomes: OutcomeStats,
    pub skills_spawned: u64,
    pub total_speeches: u64,
    pub avg_execution_time_ms: f64,
    pub max_execution_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeStats {
    pub asked_to_repeat: u64,
    pub dialog_answered: u64,
    pub logic_completed: u64,
    pub logic_dropped: u64,
    pub warnings: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub cancellations: u64,
}

impl OutcomeStats {
    pub fn total(&self) -> u64 {
        self.asked_to_repeat
            + self.dialog_answered
            + self.logic_completed
            + self.logic_dropped
            + self.warnings
            + self.failures
            + self.timeouts
            + self.cancellations
    }
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut total_time: u64 = 0;

    for event in events {
        match event {
            TelemetryEvent::SkillSpawned => snap.skills_spawned += 1,
            TelemetryEvent::Settled {
                outcome,
                execution_time_ms,
                speech_count,
            } => {
                let counter = match outcome {
                    OutcomeKind::AskedToRepeat => &mut snap.outcomes.asked_to_repeat,
                    OutcomeKind::DialogAnswered => &mut snap.outcomes.dialog_answered,
                    OutcomeKind::LogicCompleted => &mut snap.outcomes.logic_completed,
                    OutcomeKind::LogicDropped => &mut snap.outcomes.logic_dropped,
                    OutcomeKind::Warning => &mut snap.outcomes.warnings,
                    OutcomeKind::Failed => &mut snap.outcomes.failures,
                    OutcomeKind::TimedOut => &mut snap.outcomes.timeouts,
                    OutcomeKind::Cancelled => &mut snap.outcomes.cancellations,
                };
                *counter += 1;

                snap.total_speeches += *speech_count as u64;
                total_time += execution_time_ms;
                snap.max_execution_time_ms = snap.max_execution_time_ms.max(*execution_time_ms);
            }
        }
    }

    let settled = snap.outcomes.total();
    if settled > 0 {
        snap.avg_execution_time_ms = total_time as f64 / settled as f64;
    }

    snap
}
