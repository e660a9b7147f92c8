use async_trait::async_trait;
use serde::Serialize;

use super::skill::SyncOptions;
use super::types::Classification;

const DEFAULT_METHOD: &str = "direct";

/// Content synchronization requested by a completed logic skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncJob {
    pub classification: Classification,
    pub options: SyncOptions,
}

impl SyncJob {
    pub fn method(&self) -> &str {
        self.options.method.as_deref().unwrap_or(DEFAULT_METHOD)
    }

    /// Answer key spoken once the job is done, under the `synchronizer` answer type.
    pub fn completion_key(&self) -> String {
        format!("synced_{}", self.method())
    }
}

/// Hands synchronization jobs off to an external synchronizer.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    async fn synchronize(&self, job: &SyncJob) -> anyhow::Result<()>;
}
