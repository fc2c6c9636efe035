//! Supabase (PostgREST) remote mirror of the ledger.
//!
//! Batched upserts keyed on identity. Best-effort by contract: the
//! orchestrator logs sync errors and never fails the run over them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use scout_core::error::AppError;
use scout_core::models::Listing;
use scout_core::traits::RemoteSink;

/// Stable field layout for the remote `listings` relation.
#[derive(Debug, Clone, Serialize)]
struct SyncRow<'a> {
    identity: &'a str,
    source: &'a str,
    title: &'a str,
    organization: &'a str,
    url: &'a str,
    compensation: &'a str,
    description: &'a str,
    posted_at: Option<&'a str>,
    found_at: Option<DateTime<Utc>>,
    sent_at: Option<DateTime<Utc>>,
    filtered_reason: Option<&'a str>,
    raw: &'a serde_json::Value,
}

impl<'a> From<&'a Listing> for SyncRow<'a> {
    fn from(listing: &'a Listing) -> Self {
        Self {
            identity: &listing.identity,
            source: &listing.source,
            title: &listing.title,
            organization: &listing.organization,
            url: &listing.url,
            compensation: &listing.compensation,
            description: &listing.description,
            posted_at: listing.posted_at.as_deref(),
            found_at: listing.found_at,
            sent_at: listing.sent_at,
            filtered_reason: listing.filtered_reason.as_deref(),
            raw: &listing.raw,
        }
    }
}

#[derive(Clone)]
pub struct SupabaseSink {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    table: String,
    batch_size: usize,
}

impl SupabaseSink {
    pub fn new(
        base_url: impl Into<String>,
        service_key: impl Into<String>,
        table: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            table: table.into(),
            batch_size: batch_size.max(1),
        })
    }

    async fn upsert_batch(&self, rows: &[SyncRow<'_>]) -> Result<(), AppError> {
        let url = format!(
            "{}/rest/v1/{}?on_conflict=identity",
            self.base_url, self.table
        );

        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await
            .map_err(|e| AppError::SyncError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::SyncError(format!(
                "upsert returned HTTP {}: {body}",
                status.as_u16()
            )));
        }

        Ok(())
    }
}

impl RemoteSink for SupabaseSink {
    async fn sync(&self, listings: &[Listing]) -> Result<(), AppError> {
        for chunk in listings.chunks(self.batch_size) {
            let rows: Vec<SyncRow<'_>> = chunk.iter().map(Into::into).collect();
            self.upsert_batch(&rows).await?;
            tracing::debug!(count = rows.len(), table = %self.table, "Upserted batch");
        }
        tracing::info!(count = listings.len(), table = %self.table, "Sync complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            identity: "upwork:abc".into(),
            source: "upwork".into(),
            title: "Rust Engineer".into(),
            organization: "Upwork Client".into(),
            url: "https://example.com/j".into(),
            compensation: "$75/hr".into(),
            description: "desc".into(),
            posted_at: Some("2026-08-20".into()),
            raw: serde_json::json!({"id": "abc"}),
            found_at: Some(Utc::now()),
            sent_at: None,
            filtered_reason: Some("no_target_pattern".into()),
        }
    }

    #[test]
    fn sync_row_keeps_the_stable_field_layout() {
        let item = listing();
        let row = SyncRow::from(&item);
        let value = serde_json::to_value(&row).unwrap();

        for key in [
            "identity",
            "source",
            "title",
            "organization",
            "url",
            "compensation",
            "description",
            "posted_at",
            "found_at",
            "sent_at",
            "filtered_reason",
            "raw",
        ] {
            assert!(value.get(key).is_some(), "missing field {key}");
        }
        assert_eq!(value["identity"], "upwork:abc");
        assert_eq!(value["raw"]["id"], "abc");
        assert!(value["sent_at"].is_null());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let sink = SupabaseSink::new("https://x.supabase.co/", "key", "listings", 50).unwrap();
        assert_eq!(sink.base_url, "https://x.supabase.co");
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let sink = SupabaseSink::new("https://x.supabase.co", "key", "listings", 0).unwrap();
        assert_eq!(sink.batch_size, 1);
    }
}
