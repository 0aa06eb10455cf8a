//! Progress events for trade history synchronization.
//!
//! This module defines the structured events emitted while pairs are synchronized, the
//! `ProgressPublisher` sink that receives them keyed by a caller-chosen job id, and the
//! `ProgressDispatcher` the orchestrator uses to emit them. Publishing is best effort: it never
//! blocks the sync and never reports failure back to it, and events for a job nobody listens to
//! are dropped.
//!
//! Publishers are injected rather than global, so independent orchestrators (and tests) never
//! see each other's events.

use crate::intersection::PairWalletCount;
use crate::sync::types::{PairPlan, StopReason};
use crate::utils::format_instant;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// A progress event as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
	pub timestamp: DateTime<Utc>,
	/// `timestamp` rendered in display time
	pub local_time: String,
	#[serde(flatten)]
	pub kind: ProgressKind,
}

impl ProgressEvent {
	pub fn now(kind: ProgressKind) -> Self {
		let timestamp = Utc::now();
		Self {
			local_time: format_instant(&timestamp),
			timestamp,
			kind,
		}
	}

	pub fn type_name(&self) -> &'static str {
		match self.kind {
			ProgressKind::Plan { .. } => "plan",
			ProgressKind::Start { .. } => "start",
			ProgressKind::PairStart { .. } => "pair-start",
			ProgressKind::Page(_) => "page",
			ProgressKind::Error { .. } => "error",
			ProgressKind::PairDone(_) => "pair-done",
			ProgressKind::Done { .. } => "done",
		}
	}
}

/// Type-specific event payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressKind {
	/// Page budget of every pair, sent before a multi-pair run starts
	Plan {
		total_pages: usize,
		pair_count: usize,
		pairs: Vec<PairPlan>,
	},
	/// A multi-pair run is starting
	Start { pairs: Vec<String> },
	/// A pair run is starting
	PairStart { pair_id: String },
	/// One page was fetched and assessed
	Page(PageProgress),
	/// A page request or a whole pair failed
	Error {
		pair_id: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		page: Option<usize>,
		message: String,
	},
	/// A pair run finished; always the pair's last event
	PairDone(PairDone),
	/// Sync and intersection both finished
	Done {
		total_added: usize,
		common_count: usize,
		per_pair: Vec<PairWalletCount>,
		/// First few common wallets
		sample: Vec<String>,
	},
}

/// Per-page progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageProgress {
	pub pair_id: String,
	/// One based page number
	pub page: usize,
	pub got: usize,
	pub fresh: usize,
	pub hit_boundary: bool,
	pub last_tx_time: Option<i64>,
	pub last_tx_time_local: Option<String>,
	pub next_to_time: Option<i64>,
	pub accumulated_fresh: usize,
	/// `"page/limit"`
	pub progress: String,
	pub percent: u32,
}

/// Terminal per-pair summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairDone {
	pub pair_id: String,
	pub pages_used: usize,
	pub stop_reason: StopReason,
	pub reason_text: String,
	pub added: usize,
	pub watermark_updated: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Sink for progress events.
///
/// Implementations must return promptly and swallow their own failures.
pub trait ProgressPublisher: Send + Sync {
	fn publish(&self, job_id: &str, event: ProgressEvent);
}

/// Publisher that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl ProgressPublisher for NoopPublisher {
	fn publish(&self, _job_id: &str, _event: ProgressEvent) {}
}

/// In-process publisher fanning events out to subscribers of a job over broadcast channels.
///
/// A subscriber that falls more than `capacity` events behind loses the oldest ones.
pub struct ChannelPublisher {
	channels: Mutex<HashMap<String, broadcast::Sender<ProgressEvent>>>,
	capacity: usize,
}

impl ChannelPublisher {
	pub fn new(capacity: usize) -> Self {
		Self {
			channels: Mutex::new(HashMap::new()),
			capacity: capacity.max(1),
		}
	}

	fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ProgressEvent>>> {
		self.channels
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	/// Subscribe to the events of `job_id`. Dropping the receiver unsubscribes.
	pub fn subscribe(&self, job_id: &str) -> broadcast::Receiver<ProgressEvent> {
		let mut channels = self.channels();
		match channels.get(job_id) {
			Some(tx) => tx.subscribe(),
			None => {
				let (tx, rx) = broadcast::channel(self.capacity);
				channels.insert(job_id.to_string(), tx);
				rx
			}
		}
	}

	/// Live subscribers of `job_id`
	pub fn subscriber_count(&self, job_id: &str) -> usize {
		self.channels()
			.get(job_id)
			.map(|tx| tx.receiver_count())
			.unwrap_or(0)
	}
}

impl Default for ChannelPublisher {
	fn default() -> Self {
		Self::new(1024)
	}
}

impl ProgressPublisher for ChannelPublisher {
	fn publish(&self, job_id: &str, event: ProgressEvent) {
		let mut channels = self.channels();
		let Some(tx) = channels.get(job_id) else {
			return;
		};
		if tx.send(event).is_err() {
			// Every receiver is gone.
			channels.remove(job_id);
		}
	}
}

/// Emits events for one job, if any, through a shared publisher.
#[derive(Clone)]
pub struct ProgressDispatcher {
	publisher: Arc<dyn ProgressPublisher>,
	job_id: Option<String>,
}

impl ProgressDispatcher {
	pub fn new(publisher: Arc<dyn ProgressPublisher>, job_id: Option<&str>) -> Self {
		Self {
			publisher,
			job_id: job_id.map(str::to_string),
		}
	}

	/// Publish `kind` stamped with the current time. Without a job id this does nothing.
	pub fn emit(&self, kind: ProgressKind) {
		let Some(job_id) = &self.job_id else {
			return;
		};
		let event = ProgressEvent::now(kind);
		debug!("Job {} event {}", job_id, event.type_name());
		self.publisher.publish(job_id, event);
	}
}
