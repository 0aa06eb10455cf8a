use crate::api::TradeRecord;
use crate::config::RuntimeSettings;
use crate::sync::types::{StopReason, Watermark};

/// Page and record budgets for one pair run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
	/// Trades requested per page
	pub page_size: usize,
	/// Fresh trades after which the run stops
	pub max_fetch: usize,
	/// Pages after which the run stops
	pub page_limit: usize,
}

impl PageLimits {
	/// A first run may use the whole `max_fetch / page_size` budget to backfill. Later runs are
	/// additionally capped by `max_pages_after`.
	pub fn for_run(settings: &RuntimeSettings, page_size: usize, is_first_run: bool) -> Self {
		let max_pages = settings.max_pages(page_size);
		let page_limit = if is_first_run {
			max_pages
		} else {
			max_pages.min(settings.max_pages_after)
		};

		Self {
			page_size,
			max_fetch: settings.max_fetch,
			page_limit,
		}
	}
}

/// What to do after a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
	/// Fetch the next page with this cursor
	Continue { next_cursor: i64 },
	/// Halt the pair run
	Stop(StopReason),
}

/// Result of evaluating one fetched page
#[derive(Debug, Clone)]
pub struct PageAssessment {
	/// Trades on the page
	pub got: usize,
	/// Trades newer than the watermark
	pub fresh: Vec<TradeRecord>,
	/// Some trade on the page is at or below the watermark
	pub hit_boundary: bool,
	/// Valid timestamp of the page's last (oldest) trade
	pub last_tx_time: Option<i64>,
	/// Newest valid timestamp on the page
	pub max_tx_time: Option<i64>,
	pub decision: PageDecision,
}

impl PageAssessment {
	/// Cursor derived from the last trade, whether or not the run continues.
	pub fn next_cursor(&self) -> Option<i64> {
		self.last_tx_time.map(|t| t - 1)
	}

	fn empty() -> Self {
		Self {
			got: 0,
			fresh: Vec::new(),
			hit_boundary: false,
			last_tx_time: None,
			max_tx_time: None,
			decision: PageDecision::Stop(StopReason::Empty),
		}
	}
}

/// Decides after each page whether paging continues and, if not, why it stops.
///
/// Conditions are checked in a fixed order: empty page, invalid last timestamp, watermark
/// boundary, fresh-record budget, page budget. Fetch failures never reach the policy; the
/// orchestrator maps them to `StopReason::Error` directly.
#[derive(Debug, Clone, Copy)]
pub struct StopPolicy {
	watermark: Watermark,
	limits: PageLimits,
}

impl StopPolicy {
	pub fn new(watermark: Watermark, limits: PageLimits) -> Self {
		Self { watermark, limits }
	}

	/// Evaluate page number `page_index` (zero based). `accumulated_fresh` is the fresh count
	/// collected by earlier pages of this run.
	pub fn assess(
		&self,
		page_index: usize,
		page: Vec<TradeRecord>,
		accumulated_fresh: usize,
	) -> PageAssessment {
		if page.is_empty() {
			return PageAssessment::empty();
		}

		let got = page.len();
		let hit_boundary = page.iter().any(|r| self.watermark.is_behind(r));
		let last_tx_time = page.last().and_then(TradeRecord::valid_time);
		let max_tx_time = page.iter().filter_map(TradeRecord::valid_time).max();
		let fresh: Vec<TradeRecord> = page
			.into_iter()
			.filter(|r| self.watermark.is_fresh(r))
			.collect();
		let total_fresh = accumulated_fresh + fresh.len();

		let decision = match last_tx_time {
			None => PageDecision::Stop(StopReason::InvalidLast),
			Some(_) if hit_boundary => PageDecision::Stop(StopReason::Boundary),
			Some(_) if total_fresh >= self.limits.max_fetch => {
				PageDecision::Stop(StopReason::MaxFetch)
			}
			Some(_) if page_index + 1 >= self.limits.page_limit => {
				PageDecision::Stop(StopReason::PageLimit)
			}
			Some(last) => PageDecision::Continue {
				next_cursor: last - 1,
			},
		};

		PageAssessment {
			got,
			fresh,
			hit_boundary,
			last_tx_time,
			max_tx_time,
			decision,
		}
	}
}
