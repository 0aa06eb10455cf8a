//! Pair sync orchestrator.
//!
//! This module defines the `PairSyncOrchestrator`, which synchronizes the trade history of one
//! pair end to end: it reads the pair's watermark and stored history, pages backwards from "now"
//! through the trade API under the `StopPolicy`, merges the fresh trades into the history and
//! finally advances the watermark.
//!
//! The orchestrator is responsible for:
//! - Snapshotting the runtime settings and deriving the page budget for the run
//! - Driving the fetch / assess / accumulate loop and pacing between pages
//! - Publishing a `page` event per page and a closing `pair-done` event
//! - Writing the history before the watermark, so a failed write never skips trades
//! - Turning any failure into a `failed` result instead of an error
//!
//! Pages are fetched strictly one after another; each request depends on the cursor derived from
//! the previous page.

use crate::api::PageFetcher;
use crate::config::SharedSettings;
use crate::error::SyncError;
use crate::sync::events::{
	PageProgress, PairDone, ProgressDispatcher, ProgressKind, ProgressPublisher,
};
use crate::sync::progress_tracker::PairRunState;
use crate::sync::repositories::{HistoryRepository, WatermarkRepository};
use crate::sync::stop_policy::{PageDecision, PageLimits, StopPolicy};
use crate::sync::types::{PairPlan, StopReason, SyncResult};
use crate::utils::format_display_time;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Synchronizes one pair at a time.
///
/// Runs for different pairs are independent. Two concurrent runs for the same pair are not
/// guarded against; callers serialize them.
pub struct PairSyncOrchestrator {
	fetcher: Arc<dyn PageFetcher>,
	watermarks: Arc<dyn WatermarkRepository>,
	history: Arc<dyn HistoryRepository>,
	publisher: Arc<dyn ProgressPublisher>,
	settings: SharedSettings,
	page_size: usize,
}

impl PairSyncOrchestrator {
	pub fn new(
		fetcher: Arc<dyn PageFetcher>,
		watermarks: Arc<dyn WatermarkRepository>,
		history: Arc<dyn HistoryRepository>,
		publisher: Arc<dyn ProgressPublisher>,
		settings: SharedSettings,
		page_size: usize,
	) -> Self {
		Self {
			fetcher,
			watermarks,
			history,
			publisher,
			settings,
			page_size,
		}
	}

	pub fn publisher(&self) -> Arc<dyn ProgressPublisher> {
		self.publisher.clone()
	}

	pub fn settings(&self) -> &SharedSettings {
		&self.settings
	}

	/// Page budget and boundary the next run of `pair_id` would use.
	pub async fn plan(&self, pair_id: &str) -> PairPlan {
		let settings = *self.settings.read().await;
		let watermark = self.watermarks.read(pair_id).await;
		let limits = PageLimits::for_run(&settings, self.page_size, watermark.is_first_run);
		let boundary_time = (!watermark.is_first_run).then_some(watermark.last_fetched_time);

		PairPlan {
			pair_id: pair_id.to_string(),
			page_limit: limits.page_limit,
			is_first_run: watermark.is_first_run,
			boundary_time,
			boundary_time_local: boundary_time.and_then(format_display_time),
		}
	}

	/// Synchronize `pair_id`, publishing progress to `job_id` if given.
	///
	/// Never fails: errors are reported as a result with `StopReason::Failed`. The `pair-done`
	/// event is always the last event published for the pair.
	pub async fn run(&self, pair_id: &str, job_id: Option<&str>) -> SyncResult {
		let dispatcher = ProgressDispatcher::new(self.publisher.clone(), job_id);

		match self.run_pair(pair_id, &dispatcher).await {
			Ok(result) => result,
			Err(e) => {
				error!("Pair {} failed: {}", pair_id, e);
				let result = SyncResult::failed(pair_id, e.to_string());

				dispatcher.emit(ProgressKind::Error {
					pair_id: pair_id.to_string(),
					page: None,
					message: e.to_string(),
				});
				dispatcher.emit(ProgressKind::PairDone(PairDone {
					pair_id: pair_id.to_string(),
					pages_used: 0,
					stop_reason: StopReason::Failed,
					reason_text: StopReason::Failed.describe().to_string(),
					added: 0,
					watermark_updated: false,
					error: result.error.clone(),
				}));
				result
			}
		}
	}

	async fn run_pair(
		&self,
		pair_id: &str,
		dispatcher: &ProgressDispatcher,
	) -> Result<SyncResult, SyncError> {
		let settings = *self.settings.read().await;
		let watermark = self.watermarks.read(pair_id).await;
		let existing = self.history.load(pair_id).await?;

		let limits = PageLimits::for_run(&settings, self.page_size, watermark.is_first_run);
		let policy = StopPolicy::new(watermark, limits);
		let mut state = PairRunState::new(pair_id, Utc::now().timestamp(), limits.page_limit);

		info!(
			"Syncing pair {}: watermark {} (first run: {}), {} stored trades, up to {} pages",
			pair_id,
			watermark.last_fetched_time,
			watermark.is_first_run,
			existing.len(),
			limits.page_limit
		);

		for page_index in 0..limits.page_limit {
			let page = match self
				.fetcher
				.fetch_page(pair_id, state.cursor(), limits.page_size)
				.await
			{
				Ok(page) => page,
				Err(e) => {
					warn!("Page {} of {} failed: {}", page_index + 1, pair_id, e);
					state.record_error(page_index);
					dispatcher.emit(ProgressKind::Error {
						pair_id: pair_id.to_string(),
						page: Some(page_index + 1),
						message: e.to_string(),
					});
					break;
				}
			};

			let assessment = policy.assess(page_index, page, state.accumulated());
			let pages = page_index + 1;
			dispatcher.emit(ProgressKind::Page(PageProgress {
				pair_id: pair_id.to_string(),
				page: pages,
				got: assessment.got,
				fresh: assessment.fresh.len(),
				hit_boundary: assessment.hit_boundary,
				last_tx_time: assessment.last_tx_time,
				last_tx_time_local: assessment.last_tx_time.and_then(format_display_time),
				next_to_time: assessment.next_cursor(),
				accumulated_fresh: state.accumulated() + assessment.fresh.len(),
				progress: state.progress_label(pages),
				percent: state.percent(pages),
			}));

			match state.record_page(page_index, assessment) {
				PageDecision::Continue { .. } => {
					if settings.page_sleep_ms > 0 {
						tokio::time::sleep(Duration::from_millis(settings.page_sleep_ms)).await;
					}
				}
				PageDecision::Stop(_) => break,
			}
		}

		state.log_summary();
		let stop_reason = state.stop_reason();
		let newest = state.max_tx_time();

		let merged = self
			.history
			.merge(pair_id, existing, state.take_fresh())
			.await?;

		// Whatever stopped the run, the watermark follows the newest trade seen.
		let watermark_updated = match newest {
			Some(time) => self.watermarks.write(pair_id, time).await?,
			None => false,
		};

		info!(
			"Pair {} done: {} ({}), {} new trades, watermark updated: {}",
			pair_id,
			stop_reason,
			stop_reason.describe(),
			merged.added,
			watermark_updated
		);

		dispatcher.emit(ProgressKind::PairDone(PairDone {
			pair_id: pair_id.to_string(),
			pages_used: state.pages_used(),
			stop_reason,
			reason_text: stop_reason.describe().to_string(),
			added: merged.added,
			watermark_updated,
			error: None,
		}));

		Ok(SyncResult {
			pair_id: pair_id.to_string(),
			pages_used: state.pages_used(),
			stop_reason,
			added_count: merged.added,
			error: None,
		})
	}
}
