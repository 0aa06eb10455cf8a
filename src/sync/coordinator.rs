//! Sequential synchronization of several pairs.

use crate::error::SyncError;
use crate::sync::events::{ProgressDispatcher, ProgressKind};
use crate::sync::orchestrator::PairSyncOrchestrator;
use crate::sync::types::{MultiSyncReport, PairPlan};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs the pair orchestrator over a list of pairs, one pair at a time.
///
/// Pairs are never synchronized concurrently, which bounds the load on the trade API to one
/// request in flight. A failed pair is recorded in the report and the next pair still runs.
pub struct MultiPairCoordinator {
	orchestrator: Arc<PairSyncOrchestrator>,
}

impl MultiPairCoordinator {
	pub fn new(orchestrator: Arc<PairSyncOrchestrator>) -> Self {
		Self { orchestrator }
	}

	/// Page budget of every pair for the upcoming run.
	pub async fn plan(&self, pair_ids: &[String]) -> Vec<PairPlan> {
		let mut plan = Vec::with_capacity(pair_ids.len());
		for pair_id in pair_ids {
			plan.push(self.orchestrator.plan(pair_id).await);
		}
		plan
	}

	/// Synchronize `pair_ids` in order.
	///
	/// Publishes `plan` and `start` up front, then `pair-start` before each pair; the pair's own
	/// run closes with `pair-done`. The inter-pair delay is read from the live settings before
	/// each wait.
	pub async fn run(
		&self,
		pair_ids: &[String],
		job_id: Option<&str>,
	) -> Result<MultiSyncReport, SyncError> {
		if pair_ids.is_empty() {
			return Err(SyncError::InvalidInput(
				"at least one pair id is required".to_string(),
			));
		}

		let dispatcher = ProgressDispatcher::new(self.orchestrator.publisher(), job_id);

		let plan = self.plan(pair_ids).await;
		dispatcher.emit(ProgressKind::Plan {
			total_pages: plan.iter().map(|p| p.page_limit).sum(),
			pair_count: pair_ids.len(),
			pairs: plan,
		});
		dispatcher.emit(ProgressKind::Start {
			pairs: pair_ids.to_vec(),
		});

		info!("Synchronizing {} pairs", pair_ids.len());

		let mut results = Vec::with_capacity(pair_ids.len());
		for (i, pair_id) in pair_ids.iter().enumerate() {
			dispatcher.emit(ProgressKind::PairStart {
				pair_id: pair_id.clone(),
			});
			results.push(self.orchestrator.run(pair_id, job_id).await);

			if i + 1 < pair_ids.len() {
				let pause = self.orchestrator.settings().read().await.between_pairs_ms;
				if pause > 0 {
					tokio::time::sleep(Duration::from_millis(pause)).await;
				}
			}
		}

		let total_added = results.iter().map(|r| r.added_count).sum();
		info!(
			"Synchronized {} pairs, {} new trades in total",
			results.len(),
			total_added
		);

		Ok(MultiSyncReport {
			results,
			total_added,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sync::events::ChannelPublisher;
	use crate::sync::testing::{ScriptedFetcher, fast_settings, orchestrator, trade};
	use crate::sync::types::StopReason;
	use tempfile::TempDir;

	fn pairs(ids: &[&str]) -> Vec<String> {
		ids.iter().map(|s| s.to_string()).collect()
	}

	#[tokio::test]
	async fn test_failed_pair_does_not_stop_run() {
		let dir = TempDir::new().unwrap();
		tokio::fs::write(dir.path().join("B.json"), "{broken")
			.await
			.unwrap();

		let fetcher = Arc::new(ScriptedFetcher::new());
		fetcher.push("A", vec![trade("a1", 300, "w1"), trade("a2", 200, "w2")]);
		fetcher.push("C", vec![trade("c1", 100, "w1")]);
		let publisher = Arc::new(ChannelPublisher::default());
		let coordinator = MultiPairCoordinator::new(Arc::new(orchestrator(
			dir.path(),
			fetcher.clone(),
			fast_settings(1_000, 5),
			10,
			publisher,
		)));

		let report = coordinator
			.run(&pairs(&["A", "B", "C"]), None)
			.await
			.unwrap();
		assert_eq!(report.results.len(), 3);
		assert_eq!(report.results[0].added_count, 2);
		assert_eq!(report.results[1].stop_reason, StopReason::Failed);
		assert_eq!(report.results[2].added_count, 1);
		assert_eq!(report.total_added, 3);

		// Pairs were visited in order, never interleaved.
		let visited: Vec<String> = fetcher.calls().into_iter().map(|(p, _)| p).collect();
		assert_eq!(visited, pairs(&["A", "A", "C", "C"]));
	}

	#[tokio::test]
	async fn test_event_sequence() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		fetcher.push("A", vec![trade("a1", 300, "w1")]);
		fetcher.push("B", vec![trade("b1", 300, "w1")]);
		let publisher = Arc::new(ChannelPublisher::default());
		let mut rx = publisher.subscribe("job");
		let coordinator = MultiPairCoordinator::new(Arc::new(orchestrator(
			dir.path(),
			fetcher,
			fast_settings(1_000, 5),
			10,
			publisher,
		)));

		coordinator.run(&pairs(&["A", "B"]), Some("job")).await.unwrap();

		let mut types = Vec::new();
		while let Ok(event) = rx.try_recv() {
			types.push(event.type_name());
		}
		assert_eq!(
			types,
			vec![
				"plan",
				"start",
				"pair-start",
				"page",
				"page",
				"pair-done",
				"pair-start",
				"page",
				"page",
				"pair-done",
			]
		);
	}

	#[tokio::test]
	async fn test_plan_totals() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		let publisher = Arc::new(ChannelPublisher::default());
		let mut rx = publisher.subscribe("job");
		let coordinator = MultiPairCoordinator::new(Arc::new(orchestrator(
			dir.path(),
			fetcher,
			fast_settings(500, 5),
			100,
			publisher,
		)));

		coordinator.run(&pairs(&["A", "B"]), Some("job")).await.unwrap();
		match rx.try_recv().unwrap().kind {
			ProgressKind::Plan {
				total_pages,
				pair_count,
				pairs,
			} => {
				assert_eq!(total_pages, 10);
				assert_eq!(pair_count, 2);
				assert!(pairs.iter().all(|p| p.is_first_run));
			}
			other => panic!("expected plan, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_single_pair_run() {
		let dir = TempDir::new().unwrap();
		let fetcher = Arc::new(ScriptedFetcher::new());
		fetcher.push("A", vec![trade("a1", 300, "w1"), trade("a2", 200, "w2")]);
		let coordinator = MultiPairCoordinator::new(Arc::new(orchestrator(
			dir.path(),
			fetcher,
			fast_settings(1_000, 5),
			10,
			Arc::new(ChannelPublisher::default()),
		)));

		let report = coordinator.run(&pairs(&["A"]), None).await.unwrap();
		assert_eq!(report.results.len(), 1);
		assert_eq!(report.results[0].stop_reason, StopReason::Empty);
		assert_eq!(report.total_added, 2);
	}

	#[tokio::test]
	async fn test_empty_pair_list_rejected() {
		let dir = TempDir::new().unwrap();
		let coordinator = MultiPairCoordinator::new(Arc::new(orchestrator(
			dir.path(),
			Arc::new(ScriptedFetcher::new()),
			fast_settings(1_000, 5),
			10,
			Arc::new(ChannelPublisher::default()),
		)));
		assert!(matches!(
			coordinator.run(&[], None).await,
			Err(SyncError::InvalidInput(_))
		));
	}
}
