pub mod intent;
pub mod protocol;
pub mod runner;

pub use intent::{new_utterance_id, IntentFile, IntentObject};
pub use protocol::{SkillOutput, SyncOptions};
pub use runner::SkillRunner;
