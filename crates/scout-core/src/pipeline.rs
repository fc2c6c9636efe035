//! Run orchestration: the per-run processing pipeline.
//!
//! One execution walks every configured source in order, and every raw
//! record within a source in adapter order. For each record:
//! normalize -> dedup gate -> filter -> deliver -> persist, with the
//! durable write completing before the next record starts. Remote sync
//! runs once at the end over everything newly processed this run.
//!
//! Failure containment: source failures yield empty results and the
//! run continues; delivery failures leave the listing accepted but
//! unsent; only storage failures abort, and the abort is durably
//! recorded on the run before being re-raised.

use chrono::Utc;

use crate::config::SourceConfig;
use crate::delivery::DeliveryService;
use crate::error::AppError;
use crate::filter::FilterEngine;
use crate::models::{Listing, Run, RunSummary};
use crate::normalize::Normalizer;
use crate::traits::{Ledger, Notifier, RemoteSink, Source};

/// Orchestrates one pipeline run.
///
/// Generic over all external dependencies via traits, enabling
/// dependency injection and testability without real HTTP calls.
pub struct RunService<S, N, L, K>
where
    S: Source,
    N: Notifier,
    L: Ledger,
    K: RemoteSink,
{
    source: S,
    sources: Vec<SourceConfig>,
    normalizer: Normalizer,
    filter: FilterEngine,
    delivery: DeliveryService<N>,
    ledger: L,
    sink: Option<K>,
}

impl<S, N, L, K> RunService<S, N, L, K>
where
    S: Source,
    N: Notifier,
    L: Ledger,
    K: RemoteSink,
{
    /// Create a RunService without a remote sink.
    pub fn new(
        source: S,
        sources: Vec<SourceConfig>,
        normalizer: Normalizer,
        filter: FilterEngine,
        delivery: DeliveryService<N>,
        ledger: L,
    ) -> Self {
        Self {
            source,
            sources,
            normalizer,
            filter,
            delivery,
            ledger,
            sink: None,
        }
    }

    /// Create a RunService that mirrors processed listings to a sink.
    pub fn with_sink(
        source: S,
        sources: Vec<SourceConfig>,
        normalizer: Normalizer,
        filter: FilterEngine,
        delivery: DeliveryService<N>,
        ledger: L,
        sink: K,
    ) -> Self {
        Self {
            source,
            sources,
            normalizer,
            filter,
            delivery,
            ledger,
            sink: Some(sink),
        }
    }

    /// Execute one full run.
    ///
    /// Returns the completion summary, or the storage error that
    /// aborted the run after it has been recorded on the run record.
    pub async fn execute(&self) -> Result<RunSummary, AppError> {
        let mut run = Run::begin();
        tracing::info!(run_id = %run.id, sources = self.sources.len(), "Starting run");
        self.ledger.insert_run(&run).await?;

        match self.process_sources(&mut run).await {
            Ok(processed) => {
                self.sync_processed(&processed).await;
                run.finish();
                self.ledger.update_run(&run).await?;

                let summary = run.summary();
                tracing::info!(
                    run_id = %summary.run_id,
                    elapsed_ms = summary.elapsed.num_milliseconds(),
                    found = summary.found,
                    sent = summary.sent,
                    filtered = summary.filtered,
                    "Run complete"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(run_id = %run.id, error = %e, "Run aborted");
                run.error = Some(e.to_string());
                if let Err(persist_err) = self.ledger.update_run(&run).await {
                    tracing::error!(
                        run_id = %run.id,
                        error = %persist_err,
                        "Failed to record run failure"
                    );
                }
                Err(e)
            }
        }
    }

    /// Walk every configured source sequentially. Returns the listings
    /// newly processed this run (duplicates excluded), for sync.
    async fn process_sources(&self, run: &mut Run) -> Result<Vec<Listing>, AppError> {
        let mut processed = Vec::new();

        for source_config in &self.sources {
            let raw_records = match self.source.fetch(source_config).await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        source = %source_config.name,
                        error = %e,
                        "Source failed, continuing with zero results"
                    );
                    Vec::new()
                }
            };
            tracing::info!(
                source = %source_config.name,
                count = raw_records.len(),
                "Fetched raw records"
            );

            for raw in &raw_records {
                if let Some(listing) = self
                    .process_listing(raw, &source_config.name, run)
                    .await?
                {
                    processed.push(listing);
                }
            }
        }

        Ok(processed)
    }

    /// Process one raw record end to end. Returns `None` for records
    /// whose identity the ledger has already seen.
    ///
    /// Only storage errors propagate; everything else is contained here.
    async fn process_listing(
        &self,
        raw: &serde_json::Value,
        source_name: &str,
        run: &mut Run,
    ) -> Result<Option<Listing>, AppError> {
        let mut listing = self.normalizer.normalize(raw, source_name);

        if self.ledger.seen(&listing.identity).await? {
            // Raw-found telemetry only; duplicates don't count toward
            // the run's found counter.
            tracing::debug!(identity = %listing.identity, "Skipping duplicate");
            return Ok(None);
        }
        run.found_count += 1;

        let decision = self.filter.decide(&listing);
        if decision.accept {
            if self.delivery.deliver(&listing).await {
                listing.sent_at = Some(Utc::now());
                run.sent_count += 1;
                tracing::info!(identity = %listing.identity, title = %listing.title, "Sent");
            } else {
                // Accepted but unsent: filtered_reason stays empty.
                tracing::warn!(
                    identity = %listing.identity,
                    title = %listing.title,
                    "Failed to send"
                );
            }
        } else {
            tracing::info!(
                identity = %listing.identity,
                title = %listing.title,
                reason = %decision.reason,
                "Filtered"
            );
            listing.filtered_reason = Some(decision.reason);
        }

        // Durable write before the next listing starts. This keeps the
        // at-most-once window limited to a crash between the delivery
        // call above and this await.
        self.ledger.upsert_listing(&listing).await?;

        Ok(Some(listing))
    }

    /// Best-effort mirror of this run's listings. Never fails the run.
    async fn sync_processed(&self, processed: &[Listing]) {
        let Some(sink) = &self.sink else {
            return;
        };
        if processed.is_empty() {
            return;
        }
        match sink.sync(processed).await {
            Ok(()) => {
                tracing::info!(count = processed.len(), "Synced listings to remote store");
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    count = processed.len(),
                    "Remote sync failed, continuing"
                );
            }
        }
    }
}
