//! SQLite persistence: valuation history, watchlist and the financial-data
//! cache table.

pub mod cache;
pub mod db;
pub mod history;
pub mod models;
pub mod watchlist;

pub use cache::SqliteCache;
pub use db::ValuationDb;
pub use history::ValuationStore;
pub use models::*;
pub use watchlist::WatchlistManager;
