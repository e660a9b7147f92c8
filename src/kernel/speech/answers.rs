use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::kernel::config::{read_json, ConfigError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnswerError {
    #[error("Answer type \"{0}\" is missing from the corpus")]
    UnknownType(String),
    #[error("Answer type \"{kind}\" has no key \"{key}\"")]
    UnknownKey { kind: String, key: String },
    #[error("Answer type \"{0}\" is keyed, a key is required")]
    KeyRequired(String),
    #[error("Answer type \"{0}\" has no variants")]
    Empty(String),
}

/// One answer text, either plain or indexed one level deeper by key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnswerText {
    Plain(String),
    Keyed(BTreeMap<String, String>),
}

/// Shape of a corpus entry, decided once at load time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(AnswerText),
    Variants(Vec<AnswerText>),
}

/// Per-language answer templates, read-only during execution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerCorpus {
    #[serde(default)]
    answers: BTreeMap<String, AnswerValue>,
}

impl AnswerCorpus {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        read_json(path).await
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Picks a template for `kind` (uniformly among variants), drills into `key`
    /// when given, then applies `substitutions` in order.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        kind: &str,
        key: Option<&str>,
        substitutions: &[(&str, &str)],
        rng: &mut R,
    ) -> Result<String, AnswerError> {
        let value = self
            .answers
            .get(kind)
            .ok_or_else(|| AnswerError::UnknownType(kind.to_string()))?;

        let text = match value {
            AnswerValue::Single(text) => text,
            AnswerValue::Variants(variants) => variants
                .choose(rng)
                .ok_or_else(|| AnswerError::Empty(kind.to_string()))?,
        };

        let answer = match (text, key.filter(|k| !k.is_empty())) {
            (AnswerText::Plain(s), None) => s.clone(),
            (AnswerText::Keyed(map), Some(key)) => {
                map.get(key).cloned().ok_or_else(|| AnswerError::UnknownKey {
                    kind: kind.to_string(),
                    key: key.to_string(),
                })?
            }
            (AnswerText::Keyed(_), None) => return Err(AnswerError::KeyRequired(kind.to_string())),
            (AnswerText::Plain(_), Some(key)) => {
                return Err(AnswerError::UnknownKey {
                    kind: kind.to_string(),
                    key: key.to_string(),
                })
            }
        };

        Ok(find_and_map(&answer, substitutions))
    }
}

/// Replaces every literal occurrence of each token, applied in slice order.
pub fn find_and_map(text: &str, substitutions: &[(&str, &str)]) -> String {
    substitutions
        .iter()
        .filter(|(token, _)| !token.is_empty())
        .fold(text.to_string(), |acc, (token, replacement)| {
            acc.replace(token, replacement)
        })
}
