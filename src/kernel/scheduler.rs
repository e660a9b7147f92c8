use super::config::{ActionDefinition, ActionType};
use super::types::{Classification, CoreFlags, Suggestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Logic,
    Dialog,
}

/// Pure routing decisions of the brain. No I/O, no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Confidence gate: anything strictly below the language minimum asks to repeat.
    pub fn needs_clarification(&self, classification: &Classification, min_confidence: f64) -> bool {
        classification.confidence < min_confidence
    }

    pub fn route(&self, action: &ActionDefinition) -> Dispatch {
        match action.kind {
            ActionType::Logic => Dispatch::Logic,
            ActionType::Dialog => Dispatch::Dialog,
        }
    }

    /// Suggestion lists to push after settlement, one `suggest` event each.
    ///
    /// With `core` flags (logic skills) the next action's list comes first when
    /// `showNextActionSuggestions` allows it, followed by the current action's
    /// when `showSuggestions` does. Without flags (dialog), only the next
    /// action's suggestions are offered.
    pub fn suggestions<'a>(
        &self,
        action: &'a ActionDefinition,
        next_action: Option<&'a ActionDefinition>,
        core: Option<&CoreFlags>,
    ) -> Vec<&'a [Suggestion]> {
        let next = next_action
            .map(|next| next.suggestions.as_slice())
            .filter(|s| !s.is_empty());
        let current = Some(action.suggestions.as_slice()).filter(|s| !s.is_empty());

        match core {
            Some(flags) => next
                .filter(|_| flags.show_next_action_suggestions)
                .into_iter()
                .chain(current.filter(|_| flags.show_suggestions))
                .collect(),
            None => next.into_iter().collect(),
        }
    }
}
