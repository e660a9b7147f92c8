use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use super::types::Suggestion;

/// Outbound signals to the presentation layer. These are the only events the UI ever sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChannelEvent {
    Answer(String),
    IsTyping(bool),
    Suggest(Vec<Suggestion>),
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::Answer(_) => "answer",
            ChannelEvent::IsTyping(_) => "is-typing",
            ChannelEvent::Suggest(_) => "suggest",
        }
    }
}

/// Push-style handle to the presentation channel (socket, CLI printer, test probe).
#[derive(Debug, Clone)]
pub struct PresentationChannel {
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl PresentationChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Never fails: a closed receiver only drops the event.
    pub fn emit(&self, event: ChannelEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(event = e.0.name(), "Presentation channel closed, event dropped");
        }
    }
}
