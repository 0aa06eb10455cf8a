use crate::api::TradeRecord;
use crate::error::SyncError;
use crate::intersection::WalletSet;
use crate::sync::merger::merge_records;
use crate::sync::types::{MergeOutcome, Watermark, WatermarkFile};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Repository for per-pair watermarks
#[async_trait::async_trait]
pub trait WatermarkRepository: Send + Sync {
	/// Read the watermark. A missing or unreadable marker means a first run.
	async fn read(&self, pair_id: &str) -> Watermark;

	/// Persist `time` if it is strictly greater than the stored value. Returns whether the
	/// watermark moved.
	async fn write(&self, pair_id: &str, time: i64) -> Result<bool, SyncError>;
}

/// Repository for per-pair trade histories
#[async_trait::async_trait]
pub trait HistoryRepository: Send + Sync {
	/// Load the stored history. Missing history is empty; unparseable history is an error.
	async fn load(&self, pair_id: &str) -> Result<Vec<TradeRecord>, SyncError>;

	/// Replace the stored history with `records`.
	async fn save(&self, pair_id: &str, records: &[TradeRecord]) -> Result<(), SyncError>;

	/// Load the distinct wallet addresses of a pair. Missing history is an error here.
	async fn load_wallet_set(&self, pair_id: &str) -> Result<WalletSet, SyncError>;

	/// Merge `fresh` into `existing` and store the result as the new canonical history.
	async fn merge(
		&self,
		pair_id: &str,
		existing: Vec<TradeRecord>,
		fresh: Vec<TradeRecord>,
	) -> Result<MergeOutcome, SyncError> {
		let outcome = merge_records(existing, fresh);
		self.save(pair_id, &outcome.records).await?;
		Ok(outcome)
	}
}

/// File-based implementation of WatermarkRepository: `{data_dir}/{pair}.meta.json`
pub struct FileWatermarkRepository {
	data_dir: PathBuf,
}

impl FileWatermarkRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_meta_filename(&self, pair_id: &str) -> PathBuf {
		self.data_dir.join(format!("{}.meta.json", pair_id))
	}
}

#[async_trait::async_trait]
impl WatermarkRepository for FileWatermarkRepository {
	async fn read(&self, pair_id: &str) -> Watermark {
		let filename = self.get_meta_filename(pair_id);

		let content = match tokio::fs::read_to_string(&filename).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Watermark::first_run(),
			Err(e) => {
				warn!("Failed to read watermark {:?}: {}", filename, e);
				return Watermark::first_run();
			}
		};

		match serde_json::from_str::<WatermarkFile>(&content) {
			Ok(meta) => Watermark::at(meta.last_fetched_time),
			Err(e) => {
				warn!("Ignoring unreadable watermark {:?}: {}", filename, e);
				Watermark::first_run()
			}
		}
	}

	async fn write(&self, pair_id: &str, time: i64) -> Result<bool, SyncError> {
		let current = self.read(pair_id).await;
		if time <= current.last_fetched_time {
			debug!(
				"Watermark for {} stays at {} (candidate {})",
				pair_id, current.last_fetched_time, time
			);
			return Ok(false);
		}

		let content = serde_json::to_string_pretty(&WatermarkFile {
			last_fetched_time: time,
		})?;
		write_replacing(&self.get_meta_filename(pair_id), content.as_bytes()).await?;

		info!(
			"Watermark for {} advanced {} -> {}",
			pair_id, current.last_fetched_time, time
		);
		Ok(true)
	}
}

/// File-based implementation of HistoryRepository: `{data_dir}/{pair}.json`
pub struct FileHistoryRepository {
	data_dir: PathBuf,
}

impl FileHistoryRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_history_filename(&self, pair_id: &str) -> PathBuf {
		self.data_dir.join(format!("{}.json", pair_id))
	}

	async fn read_history(&self, pair_id: &str) -> Result<Option<Vec<TradeRecord>>, SyncError> {
		let filename = self.get_history_filename(pair_id);

		let content = match tokio::fs::read_to_string(&filename).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};

		let records = serde_json::from_str::<Vec<TradeRecord>>(&content).map_err(|e| {
			SyncError::MalformedHistory {
				pair_id: pair_id.to_string(),
				source: e,
			}
		})?;

		debug!("Loaded {} trades from {:?}", records.len(), filename);
		Ok(Some(records))
	}
}

#[async_trait::async_trait]
impl HistoryRepository for FileHistoryRepository {
	async fn load(&self, pair_id: &str) -> Result<Vec<TradeRecord>, SyncError> {
		Ok(self.read_history(pair_id).await?.unwrap_or_default())
	}

	async fn save(&self, pair_id: &str, records: &[TradeRecord]) -> Result<(), SyncError> {
		let filename = self.get_history_filename(pair_id);
		let content = serde_json::to_string_pretty(records)?;
		write_replacing(&filename, content.as_bytes()).await?;

		info!("Saved {} trades to {:?}", records.len(), filename);
		Ok(())
	}

	async fn load_wallet_set(&self, pair_id: &str) -> Result<WalletSet, SyncError> {
		let records = self
			.read_history(pair_id)
			.await?
			.ok_or_else(|| SyncError::HistoryNotFound(pair_id.to_string()))?;

		Ok(records.iter().filter_map(TradeRecord::wallet).collect())
	}
}

/// Replace `path` as a whole: write a sibling temp file, then rename over the target so readers
/// never see a partial file.
async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			tokio::fs::create_dir_all(parent).await?;
		}
	}

	let mut tmp = path.as_os_str().to_owned();
	tmp.push(".tmp");
	let tmp = PathBuf::from(tmp);

	tokio::fs::write(&tmp, bytes).await?;
	tokio::fs::rename(&tmp, path).await?;
	Ok(())
}
