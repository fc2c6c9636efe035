use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Canonical record of one job posting.
///
/// `identity` is assigned once by the normalizer and is the sole
/// deduplication key: `source:<native-id>` when the source provides a
/// stable id, otherwise `source:<sha256 of the raw payload>`.
///
/// The lifecycle fields are owned by the pipeline, not the source.
/// After a run completes, at most one of `sent_at` / `filtered_reason`
/// is set; both stay `None` for listings that passed filters but could
/// not be delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub identity: String,
    pub source: String,
    pub title: String,
    pub organization: String,
    pub url: String,
    /// Free-text compensation as the source reported it.
    pub compensation: String,
    pub description: String,
    /// Verbatim source timestamp text. Formats vary per source, so this
    /// is never parsed during normalization.
    pub posted_at: Option<String>,
    /// Original payload, preserved for audit/replay.
    pub raw: serde_json::Value,
    pub found_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub filtered_reason: Option<String>,
}

/// One end-to-end execution of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub found_count: i64,
    pub sent_count: i64,
    pub error: Option<String>,
}

impl Run {
    /// Create a new open run with a time-derived id.
    pub fn begin() -> Self {
        let started_at = Utc::now();
        let id = format!(
            "run-{}-{}",
            started_at.format("%Y%m%dT%H%M%S%3fZ"),
            &Uuid::new_v4().to_string()[..8]
        );
        Self {
            id,
            started_at,
            finished_at: None,
            found_count: 0,
            sent_count: 0,
            error: None,
        }
    }

    /// Close the run with the current time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.id.clone(),
            elapsed: self.elapsed(),
            found: self.found_count,
            sent: self.sent_count,
            // Conflates filtered and failed-to-send, matching the
            // run-level counters the ledger records.
            filtered: self.found_count - self.sent_count,
        }
    }
}

/// Operator-facing completion summary for one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub elapsed: TimeDelta,
    pub found: i64,
    pub sent: i64,
    pub filtered: i64,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_consistency() {
        let h1 = compute_hash("hello world");
        let h2 = compute_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_compute_hash_different_inputs() {
        let h1 = compute_hash("hello");
        let h2 = compute_hash("world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = Run::begin();
        let b = Run::begin();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("run-"));
    }

    #[test]
    fn test_summary_counts() {
        let mut run = Run::begin();
        run.found_count = 5;
        run.sent_count = 2;
        run.finish();
        let summary = run.summary();
        assert_eq!(summary.found, 5);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.filtered, 3);
        assert!(summary.elapsed >= TimeDelta::zero());
    }
}
