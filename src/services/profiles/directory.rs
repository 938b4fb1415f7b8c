//! External identity service (batched profile lookup).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("profile service unreachable: {0}")]
    Transport(String),
    #[error("profile service answered {0}")]
    Status(u16),
    #[error("unreadable profile payload: {0}")]
    Payload(String),
}

/// One batched call for all requested subjects; returns the raw payload.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn fetch_profiles(&self, subject_ids: &[String]) -> Result<String, LookupError>;
}

#[derive(Serialize)]
struct ProfileQuery<'a> {
    uuids: &'a [String],
}

#[derive(Clone, Debug)]
pub struct HttpProfileDirectory {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpProfileDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: profile_endpoint(base_url),
        })
    }
}

fn profile_endpoint(base_url: &str) -> String {
    format!("{}/server_api/user/profile", base_url.trim_end_matches('/'))
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn fetch_profiles(&self, subject_ids: &[String]) -> Result<String, LookupError> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&ProfileQuery { uuids: subject_ids })
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        res.text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))
    }
}
