//! Apify scraping backend adapter.
//!
//! Runs an actor, polls for completion with a bounded wait, and pages
//! through the default dataset. Any failure surfaces as an error that
//! the orchestrator contains into "zero results for this source".

use std::time::Duration;

use serde::Deserialize;

use scout_core::config::SourceConfig;
use scout_core::error::AppError;
use scout_core::traits::Source;

const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";
const DATASET_PAGE_SIZE: usize = 1000;

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// Terminal-vs-pending classification of an actor run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Succeeded,
    Failed,
    Pending,
}

fn classify_run_status(status: &str) -> RunOutcome {
    match status {
        "SUCCEEDED" => RunOutcome::Succeeded,
        "FAILED" | "ABORTED" | "TIMED-OUT" => RunOutcome::Failed,
        _ => RunOutcome::Pending,
    }
}

/// Source adapter backed by the Apify platform.
#[derive(Clone)]
pub struct ApifySource {
    client: reqwest::Client,
    token: String,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ApifySource {
    pub fn new(token: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent("scout/0.1 (job pipeline)")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(300),
        })
    }

    /// Override the API endpoint (for tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Start an actor run. Returns immediately with run metadata.
    async fn start_run(&self, source: &SourceConfig) -> Result<RunData, AppError> {
        let url = format!("{}/acts/{}/runs", self.base_url, source.actor);
        let body = serde_json::json!({ "runInput": source.input });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::SourceError(format!(
                "actor start returned HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let api_resp: ApiResponse<RunData> = resp
            .json()
            .await
            .map_err(|e| AppError::SourceError(format!("invalid run response: {e}")))?;
        Ok(api_resp.data)
    }

    /// Poll until the run reaches a terminal status, bounded by `max_wait`.
    async fn wait_for_run(&self, run_id: &str) -> Result<RunData, AppError> {
        let mut waited = Duration::ZERO;

        loop {
            let url = format!("{}/actor-runs/{}", self.base_url, run_id);
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(AppError::SourceError(format!(
                    "run status returned HTTP {}: {body}",
                    status.as_u16()
                )));
            }

            let api_resp: ApiResponse<RunData> = resp
                .json()
                .await
                .map_err(|e| AppError::SourceError(format!("invalid status response: {e}")))?;

            match classify_run_status(&api_resp.data.status) {
                RunOutcome::Succeeded => return Ok(api_resp.data),
                RunOutcome::Failed => {
                    return Err(AppError::SourceError(format!(
                        "actor run {run_id} ended with status {}",
                        api_resp.data.status
                    )));
                }
                RunOutcome::Pending => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                }
            }

            if waited >= self.max_wait {
                return Err(AppError::Timeout(self.max_wait.as_secs()));
            }
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;
        }
    }

    /// Fetch all dataset items, one page at a time.
    async fn fetch_dataset(&self, dataset_id: &str) -> Result<Vec<serde_json::Value>, AppError> {
        let mut items = Vec::new();
        let mut offset = 0usize;

        loop {
            let url = format!("{}/datasets/{}/items", self.base_url, dataset_id);
            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("offset", offset.to_string()),
                    ("limit", DATASET_PAGE_SIZE.to_string()),
                    ("clean", "true".to_string()),
                ])
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(AppError::SourceError(format!(
                    "dataset fetch returned HTTP {}: {body}",
                    status.as_u16()
                )));
            }

            let batch: Vec<serde_json::Value> = resp
                .json()
                .await
                .map_err(|e| AppError::SourceError(format!("invalid dataset page: {e}")))?;

            if batch.is_empty() {
                break;
            }
            offset += batch.len();
            items.extend(batch);
        }

        Ok(items)
    }
}

impl Source for ApifySource {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<serde_json::Value>, AppError> {
        tracing::info!(source = %source.name, actor = %source.actor, "Starting scrape");

        let run = self.start_run(source).await?;
        tracing::info!(run_id = %run.id, "Actor run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let items = self.fetch_dataset(&completed.default_dataset_id).await?;
        tracing::info!(source = %source.name, count = items.len(), "Fetched raw records");
        Ok(items)
    }
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(60)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_data_deserializes_from_api_shape() {
        let body = serde_json::json!({
            "data": {
                "id": "run-1",
                "status": "SUCCEEDED",
                "defaultDatasetId": "ds-9",
                "startedAt": "2026-08-20T10:00:00Z"
            }
        });
        let resp: ApiResponse<RunData> = serde_json::from_value(body).unwrap();
        assert_eq!(resp.data.id, "run-1");
        assert_eq!(resp.data.default_dataset_id, "ds-9");
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_run_status("SUCCEEDED"), RunOutcome::Succeeded);
        assert_eq!(classify_run_status("FAILED"), RunOutcome::Failed);
        assert_eq!(classify_run_status("ABORTED"), RunOutcome::Failed);
        assert_eq!(classify_run_status("TIMED-OUT"), RunOutcome::Failed);
        assert_eq!(classify_run_status("RUNNING"), RunOutcome::Pending);
        assert_eq!(classify_run_status("READY"), RunOutcome::Pending);
    }
}
