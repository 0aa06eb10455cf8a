//! Trade History Synchronization Module
//!
//! This module contains the core of the synchronizer: incremental, watermark-bounded paging of
//! a pair's trades and their merge into a deduplicated on-disk history. It is composed of
//! several submodules, each responsible for one aspect of a run:
//!
//! - `orchestrator`: Synchronizes one pair end to end and turns failures into results.
//! - `coordinator`: Runs the orchestrator over several pairs, strictly one after another.
//! - `stop_policy`: Decides after each page whether paging continues, and why it stops.
//! - `merger`: Dedup-by-last-write merge of fresh trades into a history.
//! - `repositories`: Watermark and history persistence behind repository traits.
//! - `progress_tracker`: Ephemeral state of a single pair run.
//! - `events`: Progress events and the injected publisher they are delivered through.
//!
//! The watermark and history files of a pair are the only shared mutable state. Both are
//! replaced as whole files, and the history is always written before the watermark.

/// Multi-pair sequencing
pub mod coordinator;
/// Progress events and publishers
pub mod events;
/// History merge
pub mod merger;
/// Single pair synchronization
pub mod orchestrator;
/// Per-run state
pub mod progress_tracker;
/// Watermark and history persistence
pub mod repositories;
/// Page stop decisions
pub mod stop_policy;
/// Shared value types
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::MultiPairCoordinator;
pub use orchestrator::PairSyncOrchestrator;
pub use types::*;
