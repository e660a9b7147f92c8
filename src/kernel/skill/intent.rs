use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::kernel::config::{read_json, ConfigError};
use crate::kernel::types::{ClassifiedUtterance, EntityMatch};

/// Payload handed to the external skill process through a temporary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentObject {
    pub id: String,
    pub lang: String,
    pub domain: String,
    pub skill: String,
    pub action: String,
    pub utterance: String,
    pub current_entities: Vec<EntityMatch>,
    pub entities: Vec<EntityMatch>,
    pub current_resolvers: Vec<Value>,
    pub resolvers: Vec<Value>,
    /// Slot name -> slot value, flattened from the classifier's slot objects.
    pub slots: BTreeMap<String, Value>,
}

impl IntentObject {
    pub fn from_utterance(id: &str, lang: &str, utterance: &ClassifiedUtterance) -> Self {
        let slots = utterance
            .slots
            .iter()
            .flatten()
            .map(|(name, slot)| (name.clone(), slot.value.clone()))
            .collect();

        Self {
            id: id.to_string(),
            lang: lang.to_string(),
            domain: utterance.classification.domain.clone(),
            skill: utterance.classification.skill.clone(),
            action: utterance.classification.action.clone(),
            utterance: utterance.utterance.clone(),
            current_entities: utterance.current_entities.clone(),
            entities: utterance.entities.clone(),
            current_resolvers: utterance.current_resolvers.clone(),
            resolvers: utterance.resolvers.clone(),
            slots,
        }
    }

    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        read_json(path).await
    }
}

/// `<unix millis>-<4 alphanumerics>`, also the intent file stem.
pub fn new_utterance_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..4).map(|_| rng.sample(Alphanumeric) as char).collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Temporary intent object file. Deleted exactly once: explicitly via
/// [`IntentFile::remove`], or on drop if the owner never got that far.
#[derive(Debug)]
pub struct IntentFile {
    path: PathBuf,
    removed: bool,
}

impl IntentFile {
    pub fn path_for(tmp_dir: &Path, id: &str) -> PathBuf {
        tmp_dir.join(format!("{id}.json"))
    }

    /// Persists `intent`. A write failure is logged and the handle is still
    /// returned, the skill launch is attempted regardless.
    pub async fn write(tmp_dir: &Path, intent: &IntentObject) -> Self {
        let path = Self::path_for(tmp_dir, &intent.id);
        if let Err(e) = persist(tmp_dir, &path, intent).await {
            error!(path = %path.display(), "Failed to save intent object: {}", e);
        }
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Intent object file deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(path = %self.path.display(), "Failed to delete intent object file: {}", e),
        }
    }
}

impl Drop for IntentFile {
    fn drop(&mut self) {
        self.delete();
    }
}

async fn persist(tmp_dir: &Path, path: &Path, intent: &IntentObject) -> std::io::Result<()> {
    let json = serde_json::to_vec(intent).map_err(std::io::Error::other)?;
    tokio::fs::create_dir_all(tmp_dir).await?;
    tokio::fs::write(path, json).await
}
