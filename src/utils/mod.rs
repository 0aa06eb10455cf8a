//!
//! Utility module for the synchronizer.
//!
//! Re-exports time formatting helpers used by progress events and the CLI.
/// Display-time formatting
pub mod format;

pub use format::{format_display_time, format_instant};
