//! Caller-facing operations of the synchronizer.
//!
//! `TradeSyncService` wires the orchestrator, the multi-pair coordinator and the intersection
//! engine over one set of repositories and one progress publisher, and owns the live runtime
//! settings they read.

use crate::api::PageFetcher;
use crate::config::{AppConfig, RuntimeSettings, RuntimeUpdate, SharedSettings};
use crate::error::SyncError;
use crate::intersection::{Intersection, IntersectionEngine};
use crate::sync::events::{ProgressDispatcher, ProgressKind, ProgressPublisher};
use crate::sync::repositories::{
	FileHistoryRepository, FileWatermarkRepository, HistoryRepository, WatermarkRepository,
};
use crate::sync::{MultiPairCoordinator, MultiSyncReport, PairPlan, PairSyncOrchestrator, SyncResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Common wallets included in a `done` event
const DONE_SAMPLE_SIZE: usize = 10;

/// Result of a sync followed by an intersection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateAndIntersect {
	pub update: MultiSyncReport,
	pub intersection: Intersection,
}

/// Current runtime settings plus the page budget they imply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuntimeView {
	#[serde(flatten)]
	pub settings: RuntimeSettings,
	pub max_pages_now: usize,
}

pub struct TradeSyncService {
	orchestrator: Arc<PairSyncOrchestrator>,
	coordinator: MultiPairCoordinator,
	intersection: IntersectionEngine,
	settings: SharedSettings,
	page_size: usize,
}

impl TradeSyncService {
	pub fn new(
		fetcher: Arc<dyn PageFetcher>,
		watermarks: Arc<dyn WatermarkRepository>,
		history: Arc<dyn HistoryRepository>,
		publisher: Arc<dyn ProgressPublisher>,
		settings: SharedSettings,
		page_size: usize,
	) -> Self {
		let orchestrator = Arc::new(PairSyncOrchestrator::new(
			fetcher,
			watermarks,
			history.clone(),
			publisher,
			settings.clone(),
			page_size,
		));

		Self {
			coordinator: MultiPairCoordinator::new(orchestrator.clone()),
			intersection: IntersectionEngine::new(history),
			orchestrator,
			settings,
			page_size,
		}
	}

	/// File-backed service storing histories and watermarks under `config.data_dir`.
	pub fn from_config(
		config: &AppConfig,
		fetcher: Arc<dyn PageFetcher>,
		publisher: Arc<dyn ProgressPublisher>,
	) -> Self {
		Self::new(
			fetcher,
			Arc::new(FileWatermarkRepository::new(config.data_dir.clone())),
			Arc::new(FileHistoryRepository::new(config.data_dir.clone())),
			publisher,
			config.runtime.into_shared(),
			config.page_size,
		)
	}

	/// Synchronize one pair.
	pub async fn sync_pair(&self, pair_id: &str, job_id: Option<&str>) -> SyncResult {
		ProgressDispatcher::new(self.orchestrator.publisher(), job_id).emit(
			ProgressKind::PairStart {
				pair_id: pair_id.to_string(),
			},
		);
		self.orchestrator.run(pair_id, job_id).await
	}

	/// Synchronize several pairs sequentially.
	pub async fn sync_pairs(
		&self,
		pair_ids: &[String],
		job_id: Option<&str>,
	) -> Result<MultiSyncReport, SyncError> {
		self.coordinator.run(pair_ids, job_id).await
	}

	/// Wallets common to 2 to 4 pairs, from stored histories only.
	pub async fn compute_intersection(&self, pair_ids: &[String]) -> Result<Intersection, SyncError> {
		self.intersection.compute(pair_ids).await
	}

	/// Synchronize 2 to 4 pairs, then intersect their wallets and publish `done`.
	///
	/// The pair count is validated before anything is fetched.
	pub async fn update_and_intersect(
		&self,
		pair_ids: &[String],
		job_id: Option<&str>,
	) -> Result<UpdateAndIntersect, SyncError> {
		IntersectionEngine::validate(pair_ids)?;

		let update = self.coordinator.run(pair_ids, job_id).await?;
		let intersection = self.intersection.compute(pair_ids).await?;

		ProgressDispatcher::new(self.orchestrator.publisher(), job_id).emit(ProgressKind::Done {
			total_added: update.total_added,
			common_count: intersection.common.len(),
			per_pair: intersection.per_pair.clone(),
			sample: intersection
				.common
				.iter()
				.take(DONE_SAMPLE_SIZE)
				.cloned()
				.collect(),
		});

		Ok(UpdateAndIntersect {
			update,
			intersection,
		})
	}

	/// Page budgets the next run of each pair would use.
	pub async fn plan(&self, pair_ids: &[String]) -> Vec<PairPlan> {
		self.coordinator.plan(pair_ids).await
	}

	pub async fn runtime(&self) -> RuntimeView {
		let settings = *self.settings.read().await;
		RuntimeView {
			settings,
			max_pages_now: settings.max_pages(self.page_size),
		}
	}

	/// Apply a runtime update. Runs already in progress keep the settings they started with.
	pub async fn update_runtime(&self, update: &RuntimeUpdate) -> Result<RuntimeView, SyncError> {
		{
			let mut settings = self.settings.write().await;
			settings.apply(update)?;
			info!("Runtime settings updated: {:?}", *settings);
		}
		Ok(self.runtime().await)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::events::ChannelPublisher;
	use crate::sync::testing::{ScriptedFetcher, fast_settings, trade};
	use crate::sync::StopReason;
	use tempfile::TempDir;

	fn service(dir: &TempDir, fetcher: Arc<ScriptedFetcher>, publisher: Arc<ChannelPublisher>) -> TradeSyncService {
		let config = AppConfig {
			data_dir: dir.path().to_path_buf(),
			page_size: 2,
			runtime: fast_settings(100, 3),
			..Default::default()
		};
		TradeSyncService::from_config(&config, fetcher, publisher)
	}

	fn ids(ids: &[&str]) -> Vec<String> {
		ids.iter().map(|s| s.to_string()).collect()
	}

	#[tokio::test]
	async fn test_update_and_intersect() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		fetcher.push("A", vec![trade("a1", 30, "w1"), trade("a2", 20, "w2"), trade("a3", 10, "w3")]);
		fetcher.push("B", vec![trade("b1", 30, "w2"), trade("b2", 20, "w3"), trade("b3", 10, "w4")]);
		let publisher = Arc::new(ChannelPublisher::default());
		let mut rx = publisher.subscribe("job");
		let svc = service(&dir, fetcher, publisher);

		let out = svc.update_and_intersect(&ids(&["A", "B"]), Some("job")).await.unwrap();
		assert_eq!(out.update.total_added, 6);
		assert_eq!(out.intersection.common, vec!["w2", "w3"]);

		let mut last = None;
		while let Ok(event) = rx.try_recv() {
			last = Some(event);
		}
		match last.unwrap().kind {
			ProgressKind::Done {
				total_added,
				common_count,
				sample,
				..
			} => {
				assert_eq!(total_added, 6);
				assert_eq!(common_count, 2);
				assert_eq!(sample, vec!["w2", "w3"]);
			}
			other => panic!("expected done, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_update_and_intersect_validates_first() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		let svc = service(&dir, fetcher.clone(), Arc::new(ChannelPublisher::default()));

		let result = svc.update_and_intersect(&ids(&["A"]), None).await;
		assert!(matches!(result, Err(SyncError::InvalidInput(_))));
		assert!(fetcher.calls().is_empty());
	}

	#[tokio::test]
	async fn test_sync_pair_events() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		fetcher.push("A", vec![trade("a1", 30, "w1")]);
		let publisher = Arc::new(ChannelPublisher::default());
		let mut rx = publisher.subscribe("job");
		let svc = service(&dir, fetcher, publisher);

		let result = svc.sync_pair("A", Some("job")).await;
		assert_eq!(result.stop_reason, StopReason::Empty);

		let first = rx.try_recv().unwrap();
		assert_eq!(first.type_name(), "pair-start");
	}

	#[tokio::test]
	async fn test_runtime_update_applies_to_next_run() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		let records = (0..20).map(|i| trade(&format!("t{}", i), 1_000 - i, "w")).collect();
		fetcher.push("A", records);
		let svc = service(&dir, fetcher, Arc::new(ChannelPublisher::default()));

		assert_eq!(svc.runtime().await.max_pages_now, 50);
		let view = svc
			.update_runtime(&RuntimeUpdate {
				max_fetch: Some(6),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(view.max_pages_now, 3);

		let result = svc.sync_pair("A", None).await;
		assert_eq!(result.stop_reason, StopReason::MaxFetch);
		assert_eq!(result.pages_used, 3);
		assert_eq!(result.added_count, 6);

		assert!(svc
			.update_runtime(&RuntimeUpdate {
				max_fetch: Some(0),
				..Default::default()
			})
			.await
			.is_err());
		assert_eq!(svc.runtime().await.settings.max_fetch, 6);
	}
}
