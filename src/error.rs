use crate::api::ApiError;

/// Error types for pair synchronization and wallet intersection
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Fetch error: {0}")]
	Fetch(#[from] ApiError),

	#[error("Malformed history for pair {pair_id}: {source}")]
	MalformedHistory {
		pair_id: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("No history found for pair {0}")]
	HistoryNotFound(String),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialize(#[from] serde_json::Error),
}
