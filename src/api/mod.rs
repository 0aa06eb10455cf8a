//! Trade API integration module
//!
//! This module provides the page-fetch seam consumed by the sync core, the HTTP client that
//! implements it against the AVE trade API, and the trade record types shared across the crate.

/// HTTP client and the `PageFetcher` trait
mod client;
/// Trade record and API envelope types
mod types;

pub use client::{AveTradeClient, PageFetcher};
pub use types::*;
