use super::config::ActionDefinition;
use super::error::{ExecutionError, SkillFailure};
use super::time::Stopwatch;
use super::types::{ClassifiedUtterance, CoreFlags, ExecutionResult, Suggestion};
use crate::outputs::Speaker;

/// Per-invocation state of one `execute` call. Nothing here outlives the call,
/// so concurrent invocations never see each other's speeches.
pub struct ExecutionContext {
    utterance_id: String,
    lang: String,
    stopwatch: Stopwatch,
    mute: bool,
    speaker: Speaker,
    speeches: Vec<String>,
}

impl ExecutionContext {
    pub fn new(utterance_id: String, lang: String, stopwatch: Stopwatch, mute: bool, speaker: Speaker) -> Self {
        Self {
            utterance_id,
            lang,
            stopwatch,
            mute,
            speaker,
            speeches: Vec::new(),
        }
    }

    pub fn utterance_id(&self) -> &str {
        &self.utterance_id
    }

    /// Records the speech and voices it unless muted.
    pub fn say(&mut self, speech: &str, is_final: bool) {
        if !self.mute {
            self.speaker.talk(speech, is_final);
        }
        self.speeches.push(speech.to_string());
    }

    pub fn typing_stopped(&self) {
        if !self.mute {
            self.speaker.typing(false);
        }
    }

    pub fn suggest(&self, suggestions: &[Suggestion]) {
        self.speaker.suggest(suggestions);
    }

    pub fn fail(self, cause: SkillFailure) -> ExecutionError {
        ExecutionError {
            kind: cause.severity(),
            cause,
            speeches: self.speeches,
            execution_time: self.stopwatch.elapsed_ms(),
        }
    }

    pub fn settle(
        self,
        mut utterance: ClassifiedUtterance,
        core: Option<CoreFlags>,
        action: Option<ActionDefinition>,
        next_action: Option<ActionDefinition>,
    ) -> ExecutionResult {
        if utterance.lang.is_empty() {
            utterance.lang = self.lang;
        }
        ExecutionResult {
            utterance_id: self.utterance_id,
            utterance,
            speeches: self.speeches,
            core,
            action,
            next_action,
            execution_time: self.stopwatch.elapsed_ms(),
        }
    }
}
