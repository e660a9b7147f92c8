pub mod brain;
pub mod cancel;
pub mod config;
pub mod dialog;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod skill;
pub mod speech;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod time;
pub mod types;
