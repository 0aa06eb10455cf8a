//! Value types shared by the sync components.

use crate::api::TradeRecord;
use serde::{Deserialize, Serialize};

/// Persisted per-pair watermark, as read at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Watermark {
	/// No trade with `tx_time <= last_fetched_time` needs to be fetched again.
	pub last_fetched_time: i64,
	/// No usable watermark was found; the run backfills with the full page budget.
	pub is_first_run: bool,
}

impl Watermark {
	pub fn first_run() -> Self {
		Self {
			last_fetched_time: 0,
			is_first_run: true,
		}
	}

	pub fn at(last_fetched_time: i64) -> Self {
		if last_fetched_time <= 0 {
			return Self::first_run();
		}
		Self {
			last_fetched_time,
			is_first_run: false,
		}
	}

	/// A trade is fresh when it is strictly newer than the watermark. Every trade is fresh on a
	/// first run.
	pub fn is_fresh(&self, record: &TradeRecord) -> bool {
		if self.is_first_run {
			return true;
		}
		record
			.valid_time()
			.is_some_and(|t| t > self.last_fetched_time)
	}

	/// The trade lies at or below the watermark, i.e. it was ingested by an earlier run.
	pub fn is_behind(&self, record: &TradeRecord) -> bool {
		if self.is_first_run {
			return false;
		}
		record
			.valid_time()
			.is_some_and(|t| t <= self.last_fetched_time)
	}
}

/// On-disk shape of the watermark file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkFile {
	pub last_fetched_time: i64,
}

/// Why a pair run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	/// A page request failed
	Error,
	/// The API returned an empty page
	Empty,
	/// The last trade of a page had no usable timestamp
	InvalidLast,
	/// A page reached trades already covered by the watermark
	Boundary,
	/// Enough fresh trades were collected for one run
	MaxFetch,
	/// The page budget was used up
	PageLimit,
	/// The run could not start or finish (e.g. unreadable history); nothing was merged
	Failed,
}

impl StopReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			StopReason::Error => "error",
			StopReason::Empty => "empty",
			StopReason::InvalidLast => "invalid_last",
			StopReason::Boundary => "boundary",
			StopReason::MaxFetch => "max_fetch",
			StopReason::PageLimit => "page_limit",
			StopReason::Failed => "failed",
		}
	}

	/// Human-readable explanation carried in `pair-done` events.
	pub fn describe(&self) -> &'static str {
		match self {
			StopReason::Error => "page request failed",
			StopReason::Empty => "page returned no trades",
			StopReason::InvalidLast => "last trade on the page had no valid timestamp",
			StopReason::Boundary => "reached trades covered by the previous run",
			StopReason::MaxFetch => "reached the per-run trade limit",
			StopReason::PageLimit => "reached the page limit",
			StopReason::Failed => "pair processing failed",
		}
	}
}

impl std::fmt::Display for StopReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of a single pair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
	pub pair_id: String,
	pub pages_used: usize,
	pub stop_reason: StopReason,
	pub added_count: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl SyncResult {
	pub fn failed(pair_id: &str, error: String) -> Self {
		Self {
			pair_id: pair_id.to_string(),
			pages_used: 0,
			stop_reason: StopReason::Failed,
			added_count: 0,
			error: Some(error),
		}
	}
}

/// Outcome of a multi-pair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MultiSyncReport {
	pub results: Vec<SyncResult>,
	pub total_added: usize,
}

/// Outcome of merging fresh trades into a stored history.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
	/// The new canonical history, descending by `tx_time`
	pub records: Vec<TradeRecord>,
	/// Net growth of the history
	pub added: usize,
}

/// Planned page budget of one pair, announced before a multi-pair run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairPlan {
	pub pair_id: String,
	pub page_limit: usize,
	pub is_first_run: bool,
	/// Watermark the run will stop at, if any
	pub boundary_time: Option<i64>,
	pub boundary_time_local: Option<String>,
}
