pub mod speaker;
pub mod synth;

pub use speaker::{strip_markup, Speaker};
pub use synth::{QueuedSynthesizer, SpeechSynthesizer, SynthCommand};
