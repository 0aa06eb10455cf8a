//! Test doubles shared by the sync unit tests.

use crate::api::{ApiError, PageFetcher, TradeRecord};
use crate::config::RuntimeSettings;
use crate::sync::events::{ChannelPublisher, ProgressPublisher};
use crate::sync::orchestrator::PairSyncOrchestrator;
use crate::sync::repositories::{FileHistoryRepository, FileWatermarkRepository};
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub fn trade(hash: &str, time: i64, wallet: &str) -> TradeRecord {
	TradeRecord {
		tx_hash: hash.to_string(),
		tx_time: Some(time),
		wallet_address: Some(wallet.to_string()),
		extra: Map::new(),
	}
}

/// Upstream stand-in serving pages from an in-memory dataset per pair.
#[derive(Default)]
pub struct ScriptedFetcher {
	pairs: Mutex<HashMap<String, Vec<TradeRecord>>>,
	failing_calls: Mutex<HashSet<usize>>,
	calls: Mutex<Vec<(String, i64)>>,
}

impl ScriptedFetcher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add upstream trades for `pair_id`.
	pub fn push(&self, pair_id: &str, records: Vec<TradeRecord>) {
		let mut pairs = self.pairs.lock().unwrap();
		let stored = pairs.entry(pair_id.to_string()).or_default();
		stored.extend(records);
		stored.sort_by_key(|r| std::cmp::Reverse(r.tx_time.unwrap_or(0)));
	}

	/// Make the `n`-th call (zero based, counted across pairs) fail.
	pub fn fail_call(&self, n: usize) {
		self.failing_calls.lock().unwrap().insert(n);
	}

	/// `(pair_id, to_time)` of every call so far
	pub fn calls(&self) -> Vec<(String, i64)> {
		self.calls.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedFetcher {
	async fn fetch_page(
		&self,
		pair_id: &str,
		to_time: i64,
		page_size: usize,
	) -> Result<Vec<TradeRecord>, ApiError> {
		let call = {
			let mut calls = self.calls.lock().unwrap();
			calls.push((pair_id.to_string(), to_time));
			calls.len() - 1
		};
		if self.failing_calls.lock().unwrap().contains(&call) {
			return Err(ApiError::Api(format!("scripted failure on call {}", call)));
		}

		let pairs = self.pairs.lock().unwrap();
		Ok(pairs
			.get(pair_id)
			.map(|records| {
				records
					.iter()
					.filter(|r| r.tx_time.unwrap_or(0) <= to_time)
					.take(page_size)
					.cloned()
					.collect()
			})
			.unwrap_or_default())
	}
}

/// Settings without pacing delays.
pub fn fast_settings(max_fetch: usize, max_pages_after: usize) -> RuntimeSettings {
	RuntimeSettings {
		max_fetch,
		max_pages_after,
		page_sleep_ms: 0,
		between_pairs_ms: 0,
	}
}

/// File-backed orchestrator rooted at `dir`.
pub fn orchestrator(
	dir: &Path,
	fetcher: Arc<ScriptedFetcher>,
	settings: RuntimeSettings,
	page_size: usize,
	publisher: Arc<ChannelPublisher>,
) -> PairSyncOrchestrator {
	let publisher: Arc<dyn ProgressPublisher> = publisher;
	PairSyncOrchestrator::new(
		fetcher,
		Arc::new(FileWatermarkRepository::new(dir.to_path_buf())),
		Arc::new(FileHistoryRepository::new(dir.to_path_buf())),
		publisher,
		settings.into_shared(),
		page_size,
	)
}
