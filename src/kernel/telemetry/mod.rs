//! Execution telemetry.
//!
//! Telemetry is a read-only side-effect layer: it is never consulted by the
//! scheduler or any dispatch decision. Events carry no user content (no
//! utterances, no speeches), only outcome kinds, durations and counts.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::{OutcomeKind, TelemetryEvent};
pub use metrics::TelemetrySnapshot;
pub use recorder::TelemetryRecorder;
