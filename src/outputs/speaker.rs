use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::synth::SpeechSynthesizer;
use crate::kernel::event::{ChannelEvent, PresentationChannel};
use crate::kernel::types::Suggestion;

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("markup pattern is valid"));

/// Replaces each markup tag with a single space so synthesis keeps punctuation pauses.
pub fn strip_markup(text: &str) -> String {
    MARKUP.replace_all(text, " ").into_owned()
}

/// Outbound speech: the presentation channel plus an optional synthesizer.
#[derive(Clone)]
pub struct Speaker {
    channel: PresentationChannel,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Speaker {
    pub fn new(channel: PresentationChannel, synthesizer: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self {
            channel,
            synthesizer,
        }
    }

    pub fn synthesizer(&self) -> Option<&Arc<dyn SpeechSynthesizer>> {
        self.synthesizer.as_ref()
    }

    pub fn set_synthesizer(&mut self, synthesizer: Option<Arc<dyn SpeechSynthesizer>>) {
        self.synthesizer = synthesizer;
    }

    pub fn set_channel(&mut self, channel: PresentationChannel) {
        self.channel = channel;
    }

    /// `is_final` marks the end of an utterance for synthesis buffering.
    /// The channel always receives the unstripped text.
    pub fn talk(&self, text: &str, is_final: bool) {
        if text.is_empty() {
            return;
        }
        debug!(is_final, "Talking...");

        if let Some(synthesizer) = &self.synthesizer {
            synthesizer.add(strip_markup(text), is_final);
        }
        self.channel.emit(ChannelEvent::Answer(text.to_string()));
    }

    pub fn typing(&self, is_typing: bool) {
        self.channel.emit(ChannelEvent::IsTyping(is_typing));
    }

    pub fn suggest(&self, suggestions: &[Suggestion]) {
        self.channel.emit(ChannelEvent::Suggest(suggestions.to_vec()));
    }
}
