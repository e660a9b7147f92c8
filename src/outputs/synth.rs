use tokio::sync::mpsc;
use tracing::warn;

/// Text-to-speech capability. Implementations own their failures.
pub trait SpeechSynthesizer: Send + Sync {
    /// Called on language change.
    fn init(&self, lang: &str);
    fn add(&self, speech: String, is_final: bool);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthCommand {
    Init { lang: String },
    Speak { speech: String, is_final: bool },
}

/// Forwards synthesis work to whatever drains the receiver (audio driver, test probe).
#[derive(Debug, Clone)]
pub struct QueuedSynthesizer {
    tx: mpsc::UnboundedSender<SynthCommand>,
}

impl QueuedSynthesizer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SynthCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, command: SynthCommand) {
        if self.tx.send(command).is_err() {
            warn!("Synthesis queue closed, speech dropped");
        }
    }
}

impl SpeechSynthesizer for QueuedSynthesizer {
    fn init(&self, lang: &str) {
        self.send(SynthCommand::Init {
            lang: lang.to_string(),
        });
    }

    fn add(&self, speech: String, is_final: bool) {
        self.send(SynthCommand::Speak { speech, is_final });
    }
}
