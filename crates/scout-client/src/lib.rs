//! External collaborators for the scout pipeline: the Apify scraping
//! backend, the Telegram notification channel, and the Supabase
//! remote mirror. Everything here talks HTTP; the pipeline semantics
//! live in `scout-core`.

pub mod apify;
pub mod supabase;
pub mod telegram;

pub use apify::ApifySource;
pub use supabase::SupabaseSink;
pub use telegram::TelegramNotifier;
