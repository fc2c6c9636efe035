pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod testutil;
pub mod traits;

pub use error::AppError;
pub use models::{Listing, Run, RunSummary, compute_hash};
pub use traits::{Ledger, Notifier, RemoteSink, Source};
