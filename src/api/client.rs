//!
//! HTTP client for the AVE trade history API.
//!
//! This module defines the `PageFetcher` seam the sync core consumes and the reqwest-backed
//! `AveTradeClient` that implements it. Each call retrieves one page of trades no newer than a
//! cursor timestamp, newest first. Failures are returned as `ApiError`; nothing here retries.

use super::types::*;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Retrieves one page of a pair's trades older than (or at) a cursor.
#[async_trait]
pub trait PageFetcher: Send + Sync {
	/// Fetch at most `page_size` trades with `tx_time <= to_time`, sorted descending by `tx_time`.
	async fn fetch_page(
		&self,
		pair_id: &str,
		to_time: i64,
		page_size: usize,
	) -> Result<Vec<TradeRecord>, ApiError>;
}

/// AVE trade API client
#[derive(Clone)]
pub struct AveTradeClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL, e.g. `https://prod.ave-api.com`.
	base_url: String,
	/// Value sent in the `X-API-KEY` header.
	api_key: String,
	/// Chain suffix appended to the pair id in the request path.
	chain: String,
}

impl AveTradeClient {
	/// Create a new trade API client.
	///
	/// # Arguments
	/// * `base_url` - API root without trailing slash.
	/// * `api_key` - Key sent with every request.
	/// * `chain` - Chain name the pairs live on (`solana`, ...).
	pub fn new(base_url: String, api_key: String, chain: String) -> Result<Self, ApiError> {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()?;

		Ok(Self {
			http_client,
			base_url: base_url.trim_end_matches('/').to_string(),
			api_key,
			chain,
		})
	}

	fn txs_url(&self, pair_id: &str) -> String {
		format!("{}/v2/txs/{}-{}", self.base_url, pair_id, self.chain)
	}
}

#[async_trait]
impl PageFetcher for AveTradeClient {
	async fn fetch_page(
		&self,
		pair_id: &str,
		to_time: i64,
		page_size: usize,
	) -> Result<Vec<TradeRecord>, ApiError> {
		let url = self.txs_url(pair_id);
		debug!("Requesting {} with to_time={} limit={}", url, to_time, page_size);

		let response = self
			.http_client
			.get(&url)
			.header("X-API-KEY", &self.api_key)
			.query(&[
				("limit", page_size.to_string()),
				("sort", "desc".to_string()),
				("to_time", to_time.to_string()),
			])
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ApiError::Status(status.as_u16(), body));
		}

		let envelope: TxsResponse = response.json().await?;
		let trades = envelope.into_trades()?;

		debug!("Received {} trades for {}", trades.len(), pair_id);
		Ok(trades)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_txs_url() {
		let client = AveTradeClient::new(
			"https://prod.ave-api.com/".to_string(),
			"key".to_string(),
			"solana".to_string(),
		)
		.unwrap();
		assert_eq!(
			client.txs_url("PAIR1"),
			"https://prod.ave-api.com/v2/txs/PAIR1-solana"
		);
	}
}
