//! Merging freshly fetched trades into a pair's stored history.
//!
//! The merge is a dedup-by-last-write: fresh trades are laid out ahead of the existing history,
//! a `tx_hash` keyed table is built where a later entry overwrites an earlier one with the same
//! key, and the table is flattened and re-sorted newest first. Ordering is rebuilt from scratch
//! on every merge rather than maintained incrementally.

use crate::api::TradeRecord;
use crate::sync::types::MergeOutcome;
use std::collections::HashMap;

/// Merge `fresh` (any order) ahead of `existing` and return the canonical history.
pub fn merge_records(existing: Vec<TradeRecord>, fresh: Vec<TradeRecord>) -> MergeOutcome {
	let before = existing.len();

	// Slot per distinct key, in first-seen order; the value is whatever was written last.
	let mut slots: HashMap<String, usize> = HashMap::with_capacity(before + fresh.len());
	let mut records: Vec<TradeRecord> = Vec::with_capacity(before + fresh.len());

	for record in fresh.into_iter().chain(existing) {
		match slots.get(&record.tx_hash) {
			Some(&slot) => records[slot] = record,
			None => {
				slots.insert(record.tx_hash.clone(), records.len());
				records.push(record);
			}
		}
	}

	sort_descending(&mut records);

	MergeOutcome {
		added: records.len().saturating_sub(before),
		records,
	}
}

/// Stable sort, newest first. Trades without a timestamp sink to the end.
pub fn sort_descending(records: &mut [TradeRecord]) {
	records.sort_by_key(|r| std::cmp::Reverse(r.tx_time.unwrap_or(0)));
}
