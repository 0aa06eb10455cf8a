//! Configuration for the trade history synchronizer
//!
//! `AppConfig` holds the values fixed for the life of the process (API endpoint, storage
//! directory, page size). `RuntimeSettings` holds the pacing and fetch bounds, which can be
//! changed while the process runs through a `SharedSettings` handle and optionally written back
//! to the dotenv file so they survive a restart.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_API_BASE: &str = "https://prod.ave-api.com";
pub const DEFAULT_CHAIN: &str = "solana";
pub const DEFAULT_DATA_DIR: &str = "tokenlist";
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub const ENV_MAX_FETCH: &str = "MAX_FETCH_LIMIT";
pub const ENV_MAX_PAGES_AFTER: &str = "MAX_PAGES_AFTER";
pub const ENV_SLEEP_MS: &str = "AVE_SLEEP_MS";
pub const ENV_BETWEEN_PAIRS_MS: &str = "AVE_BETWEEN_PAIRS_MS";

/// Runtime-mutable fetch bounds and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
	/// Maximum number of fresh trades collected in one pair run
	pub max_fetch: usize,
	/// Page cap for runs after the first one
	pub max_pages_after: usize,
	/// Delay after each non-terminal page
	pub page_sleep_ms: u64,
	/// Delay between two pairs of a multi-pair run
	pub between_pairs_ms: u64,
}

impl Default for RuntimeSettings {
	fn default() -> Self {
		Self {
			max_fetch: 10_000,
			max_pages_after: 50,
			page_sleep_ms: 250,
			between_pairs_ms: 800,
		}
	}
}

/// Settings shared between the running sync and whoever adjusts them.
pub type SharedSettings = Arc<RwLock<RuntimeSettings>>;

impl RuntimeSettings {
	/// Read overrides from the environment on top of the defaults.
	pub fn from_env() -> Result<Self, SyncError> {
		let defaults = Self::default();
		let settings = Self {
			max_fetch: env_or(ENV_MAX_FETCH, defaults.max_fetch)?,
			max_pages_after: env_or(ENV_MAX_PAGES_AFTER, defaults.max_pages_after)?,
			page_sleep_ms: env_or(ENV_SLEEP_MS, defaults.page_sleep_ms)?,
			between_pairs_ms: env_or(ENV_BETWEEN_PAIRS_MS, defaults.between_pairs_ms)?,
		};
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<(), SyncError> {
		if self.max_fetch == 0 {
			return Err(SyncError::InvalidInput(
				"max_fetch_limit must be a positive integer".to_string(),
			));
		}
		if self.max_pages_after == 0 {
			return Err(SyncError::InvalidInput(
				"max_pages_after must be a positive integer".to_string(),
			));
		}
		Ok(())
	}

	/// Page budget of a first run: `floor(max_fetch / page_size)`.
	pub fn max_pages(&self, page_size: usize) -> usize {
		if page_size == 0 {
			return 0;
		}
		self.max_fetch / page_size
	}

	/// Apply a partial update. Every supplied field is validated before any is written, so a
	/// rejected update leaves the settings untouched.
	pub fn apply(&mut self, update: &RuntimeUpdate) -> Result<(), SyncError> {
		let mut next = *self;

		if let Some(v) = update.max_fetch {
			next.max_fetch = positive(v, "max_fetch_limit")?;
		}
		if let Some(v) = update.max_pages_after {
			next.max_pages_after = positive(v, "max_pages_after")?;
		}
		if let Some(v) = update.page_sleep_ms {
			next.page_sleep_ms = non_negative(v, "sleep_ms")?;
		}
		if let Some(v) = update.between_pairs_ms {
			next.between_pairs_ms = non_negative(v, "between_pairs_ms")?;
		}

		*self = next;
		Ok(())
	}

	pub fn into_shared(self) -> SharedSettings {
		Arc::new(RwLock::new(self))
	}
}

/// Partial runtime update; unset fields are left alone.
///
/// Values are signed so out-of-range input can be rejected instead of failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuntimeUpdate {
	pub max_fetch: Option<i64>,
	pub max_pages_after: Option<i64>,
	pub page_sleep_ms: Option<i64>,
	pub between_pairs_ms: Option<i64>,
}

impl RuntimeUpdate {
	pub fn is_empty(&self) -> bool {
		self.max_fetch.is_none()
			&& self.max_pages_after.is_none()
			&& self.page_sleep_ms.is_none()
			&& self.between_pairs_ms.is_none()
	}

	/// The `KEY=value` pairs this update touches, taking the values from `settings`.
	fn env_entries(&self, settings: &RuntimeSettings) -> Vec<(&'static str, String)> {
		let mut entries = Vec::new();
		if self.max_fetch.is_some() {
			entries.push((ENV_MAX_FETCH, settings.max_fetch.to_string()));
		}
		if self.max_pages_after.is_some() {
			entries.push((ENV_MAX_PAGES_AFTER, settings.max_pages_after.to_string()));
		}
		if self.page_sleep_ms.is_some() {
			entries.push((ENV_SLEEP_MS, settings.page_sleep_ms.to_string()));
		}
		if self.between_pairs_ms.is_some() {
			entries.push((ENV_BETWEEN_PAIRS_MS, settings.between_pairs_ms.to_string()));
		}
		entries
	}
}

/// Process-wide configuration loaded once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
	pub api_base: String,
	pub api_key: Option<String>,
	pub chain: String,
	/// Directory holding `{pair}.json` histories and `{pair}.meta.json` watermarks
	pub data_dir: PathBuf,
	pub page_size: usize,
	pub runtime: RuntimeSettings,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			api_base: DEFAULT_API_BASE.to_string(),
			api_key: None,
			chain: DEFAULT_CHAIN.to_string(),
			data_dir: PathBuf::from(DEFAULT_DATA_DIR),
			page_size: DEFAULT_PAGE_SIZE,
			runtime: RuntimeSettings::default(),
		}
	}
}

impl AppConfig {
	/// Load from the environment, reading a `.env` file first if one exists.
	pub fn from_env() -> Result<Self, SyncError> {
		dotenvy::dotenv().ok();

		let page_size = env_or("PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
		if page_size == 0 {
			return Err(SyncError::InvalidInput(
				"PAGE_SIZE must be a positive integer".to_string(),
			));
		}

		Ok(Self {
			api_base: env::var("AVE_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
			api_key: env::var("AVE_API_KEY").ok().filter(|k| !k.is_empty()),
			chain: env::var("AVE_CHAIN").unwrap_or_else(|_| DEFAULT_CHAIN.to_string()),
			data_dir: env::var("TOKENLIST_DIR")
				.map(PathBuf::from)
				.unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
			page_size,
			runtime: RuntimeSettings::from_env()?,
		})
	}
}

/// Write the keys touched by `update` into a dotenv file, replacing existing lines.
pub async fn persist_to_env_file(
	path: &Path,
	settings: &RuntimeSettings,
	update: &RuntimeUpdate,
) -> Result<(), SyncError> {
	let mut text = match tokio::fs::read_to_string(path).await {
		Ok(text) => text,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
		Err(e) => return Err(e.into()),
	};

	for (key, value) in update.env_entries(settings) {
		text = upsert_env_line(&text, key, &value);
	}

	tokio::fs::write(path, text).await?;
	Ok(())
}

fn upsert_env_line(text: &str, key: &str, value: &str) -> String {
	let prefix = format!("{}=", key);
	let mut found = false;
	let mut lines: Vec<String> = text
		.lines()
		.map(|line| {
			if !found && line.starts_with(&prefix) {
				found = true;
				format!("{}{}", prefix, value)
			} else {
				line.to_string()
			}
		})
		.collect();

	if !found {
		lines.push(format!("{}{}", prefix, value));
	}

	let mut out = lines.join("\n");
	out.push('\n');
	out
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, SyncError> {
	match env::var(key) {
		Ok(raw) if !raw.trim().is_empty() => raw
			.trim()
			.parse()
			.map_err(|_| SyncError::InvalidInput(format!("{} has an invalid value: {}", key, raw))),
		_ => Ok(default),
	}
}

fn positive(v: i64, name: &str) -> Result<usize, SyncError> {
	if v <= 0 {
		return Err(SyncError::InvalidInput(format!(
			"{} must be a positive integer",
			name
		)));
	}
	Ok(v as usize)
}

fn non_negative(v: i64, name: &str) -> Result<u64, SyncError> {
	if v < 0 {
		return Err(SyncError::InvalidInput(format!("{} must be >= 0", name)));
	}
	Ok(v as u64)
}
