use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::kernel::sync::{SyncJob, Synchronizer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts synchronization jobs to an HTTP endpoint.
#[derive(Clone)]
pub struct HttpSynchronizer {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    job_id: Uuid,
    method: &'a str,
    #[serde(flatten)]
    job: &'a SyncJob,
}

impl HttpSynchronizer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Synchronizer for HttpSynchronizer {
    async fn synchronize(&self, job: &SyncJob) -> Result<()> {
        let request = SyncRequest {
            job_id: Uuid::new_v4(),
            method: job.method(),
            job,
        };
        debug!(job_id = %request.job_id, url = %self.url, "Posting synchronization job");

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Synchronizer error: {}", response.status()));
        }
        Ok(())
    }
}
