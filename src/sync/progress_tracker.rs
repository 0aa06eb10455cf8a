//! Progress tracking for a single pair run.
//!
//! This module provides `PairRunState`, the ephemeral state of one pair synchronization: the
//! pagination cursor, the fresh trades accumulated so far, the pages consumed, the newest
//! timestamp seen and the eventual stop reason. It is created when a run starts and dropped when
//! it ends; nothing in it is persisted.

use crate::api::TradeRecord;
use crate::sync::stop_policy::{PageAssessment, PageDecision};
use crate::sync::types::StopReason;
use tracing::info;

/// Ephemeral per-run state
#[derive(Debug, Clone)]
pub struct PairRunState {
	pair_id: String,
	/// Upper bound (inclusive) of the next page request
	cursor: i64,
	page_limit: usize,
	pages_used: usize,
	/// Fresh trades across all pages, in fetch order
	fresh: Vec<TradeRecord>,
	/// Newest valid timestamp across every fetched trade
	max_tx_time: Option<i64>,
	stop_reason: StopReason,
}

impl PairRunState {
	/// Start a run at `start_cursor`. Until something else stops it the run ends on its page
	/// budget.
	pub fn new(pair_id: &str, start_cursor: i64, page_limit: usize) -> Self {
		Self {
			pair_id: pair_id.to_string(),
			cursor: start_cursor,
			page_limit,
			pages_used: 0,
			fresh: Vec::new(),
			max_tx_time: None,
			stop_reason: StopReason::PageLimit,
		}
	}

	pub fn cursor(&self) -> i64 {
		self.cursor
	}

	pub fn page_limit(&self) -> usize {
		self.page_limit
	}

	pub fn pages_used(&self) -> usize {
		self.pages_used
	}

	pub fn accumulated(&self) -> usize {
		self.fresh.len()
	}

	pub fn stop_reason(&self) -> StopReason {
		self.stop_reason
	}

	pub fn max_tx_time(&self) -> Option<i64> {
		self.max_tx_time
	}

	/// Fold an assessed page into the run. Returns the decision so the caller can halt or pace.
	pub fn record_page(&mut self, page_index: usize, assessment: PageAssessment) -> PageDecision {
		self.pages_used = page_index + 1;

		if let Some(t) = assessment.max_tx_time {
			self.max_tx_time = Some(self.max_tx_time.map_or(t, |m| m.max(t)));
		}
		self.fresh.extend(assessment.fresh);

		match assessment.decision {
			PageDecision::Continue { next_cursor } => self.cursor = next_cursor,
			PageDecision::Stop(reason) => self.stop_reason = reason,
		}
		assessment.decision
	}

	/// Record a failed page request.
	pub fn record_error(&mut self, page_index: usize) {
		self.pages_used = page_index + 1;
		self.stop_reason = StopReason::Error;
	}

	/// `"pages/limit"` label for progress events
	pub fn progress_label(&self, pages: usize) -> String {
		format!("{}/{}", pages, self.page_limit)
	}

	/// Rounded completion percentage against the page budget
	pub fn percent(&self, pages: usize) -> u32 {
		if self.page_limit == 0 {
			return 100;
		}
		((pages as f64 / self.page_limit as f64) * 100.0).round() as u32
	}

	/// Take the accumulated fresh trades, leaving the state empty.
	pub fn take_fresh(&mut self) -> Vec<TradeRecord> {
		std::mem::take(&mut self.fresh)
	}

	pub fn log_summary(&self) {
		info!(
			"Pair {} stopped ({}): {} pages of {}, {} fresh trades, newest tx_time {:?}",
			self.pair_id,
			self.stop_reason,
			self.pages_used,
			self.page_limit,
			self.fresh.len(),
			self.max_tx_time
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::testing::trade;

	fn assessment(fresh: Vec<TradeRecord>, max: i64, decision: PageDecision) -> PageAssessment {
		PageAssessment {
			got: fresh.len(),
			fresh,
			hit_boundary: false,
			last_tx_time: Some(max),
			max_tx_time: Some(max),
			decision,
		}
	}

	#[test]
	fn test_record_pages() {
		let mut state = PairRunState::new("P", 1_000, 4);
		assert_eq!(state.stop_reason(), StopReason::PageLimit);

		state.record_page(
			0,
			assessment(
				vec![trade("a", 900, "w")],
				900,
				PageDecision::Continue { next_cursor: 899 },
			),
		);
		assert_eq!(state.cursor(), 899);
		assert_eq!(state.pages_used(), 1);

		state.record_page(
			1,
			assessment(
				vec![trade("b", 800, "w")],
				800,
				PageDecision::Stop(StopReason::Boundary),
			),
		);
		assert_eq!(state.cursor(), 899);
		assert_eq!(state.pages_used(), 2);
		assert_eq!(state.accumulated(), 2);
		assert_eq!(state.max_tx_time(), Some(900));
		assert_eq!(state.stop_reason(), StopReason::Boundary);
		assert_eq!(state.progress_label(2), "2/4");
		assert_eq!(state.percent(2), 50);
	}

	#[test]
	fn test_record_error() {
		let mut state = PairRunState::new("P", 1_000, 3);
		state.record_error(0);
		assert_eq!(state.stop_reason(), StopReason::Error);
		assert_eq!(state.pages_used(), 1);
		assert_eq!(state.percent(1), 33);
	}
}
