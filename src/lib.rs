//! Incremental trade history synchronizer.
//!
//! For each tracked trading pair the crate fetches only the trades newer than the pair's
//! watermark, merges them into a deduplicated history on disk, and can compute the wallets that
//! traded in all of several pairs.

pub mod api;
pub mod config;
pub mod error;
pub mod intersection;
pub mod service;
pub mod sync;
pub mod utils;

pub use error::SyncError;
pub use service::TradeSyncService;
