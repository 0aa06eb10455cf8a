//! Types for the remote trade API and the trade records it returns

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single swap/trade as returned by the trade API and as stored in a pair's history.
///
/// Only the fields the sync core reasons about are typed. Everything else the API sends is
/// kept in `extra` and written back to disk verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
	/// Transaction hash, the dedup key within a pair's history.
	#[serde(default)]
	pub tx_hash: String,
	/// Transaction time in seconds since the epoch.
	#[serde(
		default,
		deserialize_with = "integer_or_none",
		skip_serializing_if = "Option::is_none"
	)]
	pub tx_time: Option<i64>,
	/// Address of the wallet that made the trade.
	#[serde(
		default,
		deserialize_with = "string_or_none",
		skip_serializing_if = "Option::is_none"
	)]
	pub wallet_address: Option<String>,
	/// Opaque fields passed through unmodified.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl TradeRecord {
	/// Timestamp usable as a pagination cursor: present and positive.
	pub fn valid_time(&self) -> Option<i64> {
		self.tx_time.filter(|t| *t > 0)
	}

	/// Wallet address if it is a non-empty string.
	pub fn wallet(&self) -> Option<&str> {
		self.wallet_address.as_deref().filter(|w| !w.is_empty())
	}
}

/// Any JSON value that is not an integer reads as a missing timestamp.
fn integer_or_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Value::deserialize(deserializer)?.as_i64())
}

/// Any JSON value that is not a string reads as a missing wallet.
fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::String(s) => Ok(Some(s)),
		_ => Ok(None),
	}
}

/// Response envelope of `GET /v2/txs/{pair}-{chain}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxsResponse {
	#[serde(default)]
	pub data: Option<TxsData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxsData {
	/// Kept untyped so a missing or non-array `txs` degrades to an empty page.
	#[serde(default)]
	pub txs: Value,
}

impl TxsResponse {
	/// Extract the page of trades, treating anything but an array as empty.
	pub fn into_trades(self) -> Result<Vec<TradeRecord>, ApiError> {
		match self.data.map(|d| d.txs) {
			Some(Value::Array(items)) => items
				.into_iter()
				.map(|item| serde_json::from_value(item).map_err(ApiError::from))
				.collect(),
			_ => Ok(Vec::new()),
		}
	}
}

/// Error types for trade API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("Unexpected status {0}: {1}")]
	Status(u16, String),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("API error: {0}")]
	Api(String),
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_record_keeps_unknown_fields() {
		let raw = json!({
			"tx_hash": "0xabc",
			"tx_time": 1700000000,
			"wallet_address": "w1",
			"amount_usd": 12.5,
			"token0_symbol": "SOL"
		});
		let record: TradeRecord = serde_json::from_value(raw.clone()).unwrap();
		assert_eq!(record.tx_hash, "0xabc");
		assert_eq!(record.valid_time(), Some(1700000000));
		assert_eq!(record.extra.get("token0_symbol"), Some(&json!("SOL")));
		assert_eq!(serde_json::to_value(&record).unwrap(), raw);
	}

	#[test]
	fn test_invalid_time_and_wallet() {
		let record: TradeRecord =
			serde_json::from_value(json!({ "tx_hash": "a", "tx_time": 0, "wallet_address": "" }))
				.unwrap();
		assert_eq!(record.valid_time(), None);
		assert_eq!(record.wallet(), None);

		let record: TradeRecord = serde_json::from_value(json!({ "tx_hash": "b" })).unwrap();
		assert_eq!(record.valid_time(), None);
	}

	#[test]
	fn test_malformed_fields_read_as_missing() {
		let resp: TxsResponse = serde_json::from_value(json!({
			"data": { "txs": [
				{ "tx_hash": "a", "tx_time": 500, "wallet_address": "w1" },
				{ "tx_hash": "b", "tx_time": "bad", "wallet_address": 42 },
				{ "tx_hash": "c", "tx_time": 12.5, "wallet_address": null }
			] }
		}))
		.unwrap();
		let trades = resp.into_trades().unwrap();
		assert_eq!(trades.len(), 3);
		assert_eq!(trades[0].valid_time(), Some(500));
		assert_eq!(trades[1].valid_time(), None);
		assert_eq!(trades[1].wallet(), None);
		assert_eq!(trades[2].valid_time(), None);
		assert_eq!(trades[2].wallet(), None);
	}

	#[test]
	fn test_response_without_txs_is_empty_page() {
		let resp: TxsResponse = serde_json::from_value(json!({ "status": 1 })).unwrap();
		assert!(resp.into_trades().unwrap().is_empty());

		let resp: TxsResponse =
			serde_json::from_value(json!({ "data": { "txs": "nope" } })).unwrap();
		assert!(resp.into_trades().unwrap().is_empty());

		let resp: TxsResponse = serde_json::from_value(
			json!({ "data": { "txs": [{ "tx_hash": "a", "tx_time": 5 }] } }),
		)
		.unwrap();
		assert_eq!(resp.into_trades().unwrap().len(), 1);
	}
}
