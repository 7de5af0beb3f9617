use crate::domain::model::{SilenceId, SilenceMatcher};
use crate::domain::ports::AlertSilencer;
use crate::utils::error::{Result, RunbookError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SilenceRequest<'a> {
    matchers: &'a [SilenceMatcher],
    #[serde(rename = "startsAt")]
    starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    ends_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    created_by: String,
    comment: String,
}

#[derive(Debug, Deserialize)]
struct SilenceResponse {
    #[serde(rename = "silenceID")]
    silence_id: String,
}

/// Silences alerts through the Alertmanager v2 API.
#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
    base_url: String,
    created_by: String,
    client: Client,
}

impl AlertmanagerClient {
    pub fn new(base_url: &str, created_by: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            created_by: created_by.to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl AlertSilencer for AlertmanagerClient {
    async fn silence(
        &self,
        matchers: &[SilenceMatcher],
        duration: Duration,
        comment: &str,
    ) -> Result<SilenceId> {
        let now = Utc::now();
        let request = SilenceRequest {
            matchers,
            starts_at: now,
            ends_at: now
                + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::hours(4)),
            created_by: self.created_by.clone(),
            comment: comment.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/v2/silences", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RunbookError::MalformedOutput {
                command: "POST /api/v2/silences".to_string(),
                reason: format!("alertmanager answered {}: {}", status, body),
            });
        }

        let parsed: SilenceResponse = response.json().await?;
        tracing::debug!("Created silence {}", parsed.silence_id);
        Ok(parsed.silence_id)
    }

    async fn expire(&self, silence_id: &SilenceId) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/api/v2/silence/{}", self.base_url, silence_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RunbookError::MalformedOutput {
                command: format!("DELETE /api/v2/silence/{}", silence_id),
                reason: format!("alertmanager answered {}", status),
            });
        }

        tracing::debug!("Expired silence {}", silence_id);
        Ok(())
    }
}
