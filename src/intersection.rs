//! Wallets common to several pairs.
//!
//! The engine loads the distinct wallet addresses of each requested pair from its stored
//! history and keeps the addresses of the first pair that every other pair also contains. The
//! result follows the first pair's order of first appearance.

use crate::error::SyncError;
use crate::sync::repositories::HistoryRepository;
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

pub const MIN_INTERSECTION_PAIRS: usize = 2;
pub const MAX_INTERSECTION_PAIRS: usize = 4;

/// Distinct wallet addresses of a pair, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSet {
	ordered: Vec<String>,
	members: HashSet<String>,
}

impl WalletSet {
	pub fn insert(&mut self, wallet: &str) -> bool {
		if self.members.contains(wallet) {
			return false;
		}
		self.members.insert(wallet.to_string());
		self.ordered.push(wallet.to_string());
		true
	}

	pub fn contains(&self, wallet: &str) -> bool {
		self.members.contains(wallet)
	}

	pub fn len(&self) -> usize {
		self.ordered.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ordered.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.ordered.iter().map(String::as_str)
	}
}

impl<'a> FromIterator<&'a str> for WalletSet {
	fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
		let mut set = WalletSet::default();
		for wallet in iter {
			set.insert(wallet);
		}
		set
	}
}

/// Distinct wallet count of one pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairWalletCount {
	pub pair_id: String,
	pub unique_wallets: usize,
}

/// Result of an intersection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Intersection {
	/// Per-pair counts, in request order
	pub per_pair: Vec<PairWalletCount>,
	/// Wallets present in every pair
	pub common: Vec<String>,
}

pub struct IntersectionEngine {
	history: Arc<dyn HistoryRepository>,
}

impl IntersectionEngine {
	pub fn new(history: Arc<dyn HistoryRepository>) -> Self {
		Self { history }
	}

	/// Check the pair count bound. Runs before any history is touched.
	pub fn validate(pair_ids: &[String]) -> Result<(), SyncError> {
		if !(MIN_INTERSECTION_PAIRS..=MAX_INTERSECTION_PAIRS).contains(&pair_ids.len()) {
			return Err(SyncError::InvalidInput(format!(
				"pairs must be a list of {}~{} pair ids, got {}",
				MIN_INTERSECTION_PAIRS,
				MAX_INTERSECTION_PAIRS,
				pair_ids.len()
			)));
		}
		Ok(())
	}

	/// Compute the wallets shared by all `pair_ids`. Any missing or unreadable history fails
	/// the whole computation.
	pub async fn compute(&self, pair_ids: &[String]) -> Result<Intersection, SyncError> {
		Self::validate(pair_ids)?;

		let sets = try_join_all(
			pair_ids
				.iter()
				.map(|pair_id| self.history.load_wallet_set(pair_id)),
		)
		.await?;

		let intersection = intersect(pair_ids, &sets);
		info!(
			"{} wallets common to {} pairs",
			intersection.common.len(),
			pair_ids.len()
		);
		Ok(intersection)
	}
}

fn intersect(pair_ids: &[String], sets: &[WalletSet]) -> Intersection {
	let per_pair = pair_ids
		.iter()
		.zip(sets)
		.map(|(pair_id, set)| PairWalletCount {
			pair_id: pair_id.clone(),
			unique_wallets: set.len(),
		})
		.collect();

	let common = match sets.split_first() {
		Some((first, rest)) => first
			.iter()
			.filter(|w| rest.iter().all(|s| s.contains(w)))
			.map(str::to_string)
			.collect(),
		None => Vec::new(),
	};

	Intersection { per_pair, common }
}
