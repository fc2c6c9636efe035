//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::SourceConfig;
use crate::error::AppError;
use crate::models::{Listing, Run};
use crate::traits::{Ledger, Notifier, RemoteSink, Source};

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock source adapter with a queue of fetch responses.
/// Each `fetch` call pops the first element; when empty, returns no records.
#[derive(Clone)]
pub struct MockSource {
    responses: Arc<Mutex<Vec<Result<Vec<serde_json::Value>, AppError>>>>,
}

impl MockSource {
    pub fn new(records: Vec<serde_json::Value>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Ok(records)])),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
        }
    }

    pub fn with_responses(responses: Vec<Result<Vec<serde_json::Value>, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }
}

impl Source for MockSource {
    async fn fetch(&self, _source: &SourceConfig) -> Result<Vec<serde_json::Value>, AppError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Mock notification channel that records every send attempt.
#[derive(Clone)]
pub struct MockNotifier {
    responses: Arc<Mutex<Vec<Result<(), AppError>>>>,
    /// Message payload of every attempt, successful or not.
    pub attempts: Arc<Mutex<Vec<String>>>,
}

impl MockNotifier {
    /// Succeeds on every send.
    pub fn new_ok() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fails every send with clones-by-reconstruction of the given error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![Err(error)])),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pops one response per send; once exhausted, fails with the last
    /// popped error kind or succeeds if the queue ended on `Ok`.
    pub fn with_responses(responses: Vec<Result<(), AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl Notifier for MockNotifier {
    async fn send(&self, message: &str) -> Result<(), AppError> {
        self.attempts.lock().unwrap().push(message.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(())
        } else if responses.len() == 1 {
            // Keep repeating the final response for subsequent calls.
            match &responses[0] {
                Ok(()) => {
                    responses.remove(0);
                    Ok(())
                }
                Err(e) => Err(reclone_error(e)),
            }
        } else {
            responses.remove(0)
        }
    }
}

/// AppError does not implement Clone (it carries source errors), so
/// mocks rebuild an equivalent value for repeated failures.
fn reclone_error(error: &AppError) -> AppError {
    match error {
        AppError::RateLimited { retry_after } => AppError::RateLimited {
            retry_after: *retry_after,
        },
        AppError::DeliveryError {
            message,
            status_code,
            retryable,
        } => AppError::DeliveryError {
            message: message.clone(),
            status_code: *status_code,
            retryable: *retryable,
        },
        other => AppError::Generic(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// MockLedger
// ---------------------------------------------------------------------------

/// In-memory ledger that records listings and runs, with an optional
/// budget of successful upserts before simulating a storage fault.
#[derive(Clone, Default)]
pub struct MockLedger {
    pub listings: Arc<Mutex<HashMap<String, Listing>>>,
    pub runs: Arc<Mutex<Vec<Run>>>,
    upsert_budget: Arc<Mutex<Option<usize>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed the first `n` upserts, then fail every later one.
    pub fn failing_after_upserts(n: usize) -> Self {
        Self {
            listings: Arc::new(Mutex::new(HashMap::new())),
            runs: Arc::new(Mutex::new(Vec::new())),
            upsert_budget: Arc::new(Mutex::new(Some(n))),
        }
    }

    pub fn listing(&self, identity: &str) -> Option<Listing> {
        self.listings.lock().unwrap().get(identity).cloned()
    }

    pub fn listing_count(&self) -> usize {
        self.listings.lock().unwrap().len()
    }

    pub fn last_run(&self) -> Option<Run> {
        self.runs.lock().unwrap().last().cloned()
    }
}

impl Ledger for MockLedger {
    async fn seen(&self, identity: &str) -> Result<bool, AppError> {
        Ok(self.listings.lock().unwrap().contains_key(identity))
    }

    async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        let mut budget = self.upsert_budget.lock().unwrap();
        if let Some(remaining) = budget.as_mut() {
            if *remaining == 0 {
                return Err(AppError::DatabaseError("disk I/O error".into()));
            }
            *remaining -= 1;
        }
        self.listings
            .lock()
            .unwrap()
            .insert(listing.identity.clone(), listing.clone());
        Ok(())
    }

    async fn get_listing(&self, identity: &str) -> Result<Option<Listing>, AppError> {
        Ok(self.listings.lock().unwrap().get(identity).cloned())
    }

    async fn insert_run(&self, run: &Run) -> Result<(), AppError> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &Run) -> Result<(), AppError> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(AppError::DatabaseError(format!(
                "unknown run id: {}",
                run.id
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Mock remote sink that records synced batches.
#[derive(Clone, Default)]
pub struct MockSink {
    pub batches: Arc<Mutex<Vec<Vec<Listing>>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }

    pub fn sync_calls(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl RemoteSink for MockSink {
    async fn sync(&self, listings: &[Listing]) -> Result<(), AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        self.batches.lock().unwrap().push(listings.to_vec());
        Ok(())
    }
}
