use std::future::Future;

use crate::config::SourceConfig;
use crate::error::AppError;
use crate::models::{Listing, Run};

/// Fetches raw listing records from a configured source.
///
/// Implementations own the scraping backend specifics (starting remote
/// runs, polling for completion, paging results). The orchestrator
/// treats any error as "zero results for this source" and continues.
pub trait Source: Send + Sync + Clone {
    fn fetch(
        &self,
        source: &SourceConfig,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>, AppError>> + Send;
}

/// Sends one rendered message to the notification channel.
///
/// A rate-limit response must surface as [`AppError::RateLimited`] with
/// the channel-specified cooldown so the retry wrapper can honor it
/// without consuming a retry attempt.
pub trait Notifier: Send + Sync + Clone {
    fn send(&self, message: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Durable store of listings and run summaries.
///
/// Writes must be durable before the returned future resolves: the
/// orchestrator persists each listing immediately after its delivery
/// attempt, before moving to the next one.
pub trait Ledger: Send + Sync + Clone {
    /// Has this identity ever been processed by a previous run?
    fn seen(&self, identity: &str) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn upsert_listing(&self, listing: &Listing)
    -> impl Future<Output = Result<(), AppError>> + Send;

    fn get_listing(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Listing>, AppError>> + Send;

    fn insert_run(&self, run: &Run) -> impl Future<Output = Result<(), AppError>> + Send;

    fn update_run(&self, run: &Run) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Best-effort mirror of the ledger to an external store.
pub trait RemoteSink: Send + Sync + Clone {
    /// Upsert a batch of listings keyed on identity. Errors are logged
    /// by the caller and never fail the run.
    fn sync(&self, listings: &[Listing]) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op RemoteSink for when mirroring is disabled.
#[derive(Debug, Clone)]
pub struct NullSink;

impl RemoteSink for NullSink {
    async fn sync(&self, _listings: &[Listing]) -> Result<(), AppError> {
        Ok(())
    }
}
