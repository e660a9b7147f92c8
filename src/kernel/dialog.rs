use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::warn;

use super::config::{ActionDefinition, EntityDefinition, SkillConfig};
use super::speech::find_and_map;
use super::types::{ClassifiedUtterance, EntityMatch};

const PLACEHOLDER_MARKER: &str = "{{";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{.+?\}\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DialogError {
    #[error("Action \"{0}\" has no answer candidates")]
    NoCandidates(String),
    #[error("Action \"{0}\" needs an entity the utterance lacks and declares no unknown answers")]
    NoUnknownAnswers(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogAnswer {
    pub answer: String,
    pub next_action: Option<ActionDefinition>,
}

pub fn has_placeholder(text: &str) -> bool {
    text.contains(PLACEHOLDER_MARKER)
}

/// Picks and fills a canned answer for a dialog action.
///
/// Candidates are partitioned on whether they carry a `{{ ... }}` placeholder:
/// an utterance without entities only gets placeholder-free answers, one with
/// entities only gets answers that use them. Placeholders that no entity can
/// fill are left verbatim.
pub fn resolve_dialog_answer<R: Rng + ?Sized>(
    utterance: &ClassifiedUtterance,
    config: &SkillConfig,
    rng: &mut R,
) -> Result<DialogAnswer, DialogError> {
    let action_name = utterance.classification.action.as_str();
    let candidates: Vec<&str> = utterance
        .answers
        .iter()
        .flatten()
        .map(|c| c.answer.as_str())
        .collect();
    let has_entities = !utterance.entities.is_empty();

    let filtered: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|answer| has_placeholder(answer) == has_entities)
        .collect();

    let answer = match filtered.choose(rng) {
        Some(chosen) => {
            let chosen = chosen.to_string();
            if has_entities && has_placeholder(&chosen) {
                map_entities(chosen, &utterance.current_entities, &config.entities, rng)
            } else {
                chosen
            }
        }
        None => {
            let fallback = candidates
                .choose(rng)
                .copied()
                .ok_or_else(|| DialogError::NoCandidates(action_name.to_string()))?;

            if has_placeholder(fallback) {
                config
                    .actions
                    .get(action_name)
                    .map(|action| action.unknown_answers.as_slice())
                    .unwrap_or_default()
                    .choose(rng)
                    .cloned()
                    .ok_or_else(|| DialogError::NoUnknownAnswers(action_name.to_string()))?
            } else {
                fallback.to_string()
            }
        }
    };

    let next_action = config
        .actions
        .get(action_name)
        .and_then(|action| action.next_action.as_deref())
        .and_then(|next| config.actions.get(next))
        .cloned();

    Ok(DialogAnswer {
        answer,
        next_action,
    })
}

fn map_entities<R: Rng + ?Sized>(
    mut answer: String,
    entities: &[EntityMatch],
    definitions: &BTreeMap<String, EntityDefinition>,
    rng: &mut R,
) -> String {
    for entity in entities {
        let direct = format!("{{{{ {} }}}}", entity.entity);
        answer = find_and_map(&answer, &[(direct.as_str(), entity.resolved_text().as_str())]);

        // e.g. {{ color.usage }} -> entities.color.options.red.data.usage
        let compounds: Vec<String> = PLACEHOLDER
            .find_iter(&answer)
            .map(|m| m.as_str().to_string())
            .collect();

        for placeholder in compounds {
            let Some((name, data_key)) = split_compound(&placeholder) else {
                continue;
            };
            if name != entity.entity {
                continue;
            }

            match entity_data(definitions, entity, data_key).and_then(|values| values.choose(&mut *rng)) {
                Some(value) => {
                    answer = find_and_map(&answer, &[(placeholder.as_str(), value.as_str())]);
                }
                None => warn!(
                    entity = %entity.entity,
                    data_key,
                    "No entity data for placeholder, leaving it as is"
                ),
            }
        }
    }

    if has_placeholder(&answer) {
        warn!(answer = %answer, "Answer still has unresolved placeholders");
    }
    answer
}

fn split_compound(placeholder: &str) -> Option<(&str, &str)> {
    let inner = placeholder
        .strip_prefix(PLACEHOLDER_MARKER)?
        .strip_suffix("}}")?
        .trim();
    inner.split_once('.')
}

fn entity_data<'a>(
    definitions: &'a BTreeMap<String, EntityDefinition>,
    entity: &EntityMatch,
    data_key: &str,
) -> Option<&'a [String]> {
    let option = entity.option.as_deref()?;
    definitions
        .get(&entity.entity)?
        .options
        .get(option)?
        .data
        .get(data_key)
        .map(Vec::as_slice)
}
