//! Telegram notification channel.
//!
//! Maps HTTP 429 responses to [`AppError::RateLimited`] with the
//! channel-specified cooldown, so the delivery wrapper can honor it
//! without consuming a retry attempt.

use std::time::Duration;

use scout_core::error::AppError;
use scout_core::traits::Notifier;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Override the API endpoint (for tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), AppError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "HTML",
            "disable_web_page_preview": false,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(REQUEST_TIMEOUT_SECS)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        if status.as_u16() == 429 {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            return Err(AppError::RateLimited {
                retry_after: parse_retry_after(&body),
            });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(AppError::DeliveryError {
            message: body,
            status_code: status.as_u16(),
            retryable: status.is_server_error(),
        })
    }
}

/// Extract `parameters.retry_after` (seconds) from a 429 response body.
fn parse_retry_after(body: &serde_json::Value) -> Duration {
    let secs = body
        .get("parameters")
        .and_then(|p| p.get("retry_after"))
        .and_then(|v| v.as_u64())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_read_from_parameters() {
        let body = serde_json::json!({
            "ok": false,
            "error_code": 429,
            "parameters": { "retry_after": 17 }
        });
        assert_eq!(parse_retry_after(&body), Duration::from_secs(17));
    }

    #[test]
    fn retry_after_falls_back_to_default() {
        assert_eq!(
            parse_retry_after(&serde_json::json!({})),
            Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)
        );
        assert_eq!(
            parse_retry_after(&serde_json::json!({"parameters": {}})),
            Duration::from_secs(DEFAULT_RETRY_AFTER_SECS)
        );
    }
}
