pub mod database;
pub mod ledger;

pub use database::Database;
pub use ledger::LedgerRepository;
