use clap::{Parser, Subcommand};
use pair_history_sync::api::AveTradeClient;
use pair_history_sync::config::{AppConfig, RuntimeUpdate, persist_to_env_file};
use pair_history_sync::sync::events::ChannelPublisher;
use pair_history_sync::{SyncError, TradeSyncService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "pair-history-sync", about = "Incremental trade history sync and wallet intersection")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Fetch new trades for each pair
	Sync {
		#[arg(required = true)]
		pairs: Vec<String>,
		#[arg(long)]
		job_id: Option<String>,
	},
	/// Wallets common to 2-4 pairs, from stored history only
	Common {
		#[arg(required = true)]
		pairs: Vec<String>,
	},
	/// Sync 2-4 pairs, then compute their common wallets
	UpdateAndCommon {
		#[arg(required = true)]
		pairs: Vec<String>,
		#[arg(long)]
		job_id: Option<String>,
	},
	/// Show the runtime settings
	Config,
	/// Change runtime settings and optionally write them to the dotenv file
	SetRuntime {
		#[arg(long)]
		max_fetch: Option<i64>,
		#[arg(long)]
		max_pages_after: Option<i64>,
		#[arg(long)]
		sleep_ms: Option<i64>,
		#[arg(long)]
		between_pairs_ms: Option<i64>,
		#[arg(long)]
		no_persist: bool,
		#[arg(long, default_value = ".env")]
		env_file: PathBuf,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let cli = Cli::parse();
	if let Err(e) = run(cli).await {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<(), SyncError> {
	let config = AppConfig::from_env()?;
	info!("Using data directory {:?}", config.data_dir);

	let client = AveTradeClient::new(
		config.api_base.clone(),
		config.api_key.clone().unwrap_or_default(),
		config.chain.clone(),
	)?;
	let publisher = Arc::new(ChannelPublisher::default());
	let service = TradeSyncService::from_config(&config, Arc::new(client), publisher.clone());

	match cli.command {
		Command::Sync { pairs, job_id } => {
			require_api_key(&config)?;
			let job_id = job_id.unwrap_or_else(new_job_id);
			let watcher = watch_job(&publisher, &job_id);
			let report = service.sync_pairs(&pairs, Some(&job_id)).await?;
			drop(service);
			drop(publisher);
			watcher.await.ok();
			print_json(&report)?;
		}
		Command::Common { pairs } => {
			print_json(&service.compute_intersection(&pairs).await?)?;
		}
		Command::UpdateAndCommon { pairs, job_id } => {
			require_api_key(&config)?;
			let job_id = job_id.unwrap_or_else(new_job_id);
			let watcher = watch_job(&publisher, &job_id);
			let out = service.update_and_intersect(&pairs, Some(&job_id)).await?;
			drop(service);
			drop(publisher);
			watcher.await.ok();
			print_json(&out)?;
		}
		Command::Config => {
			print_json(&service.runtime().await)?;
		}
		Command::SetRuntime {
			max_fetch,
			max_pages_after,
			sleep_ms,
			between_pairs_ms,
			no_persist,
			env_file,
		} => {
			let update = RuntimeUpdate {
				max_fetch,
				max_pages_after,
				page_sleep_ms: sleep_ms,
				between_pairs_ms,
			};
			if update.is_empty() {
				return Err(SyncError::InvalidInput("no runtime setting given".to_string()));
			}
			let view = service.update_runtime(&update).await?;
			if !no_persist {
				persist_to_env_file(&env_file, &view.settings, &update).await?;
				info!("Persisted runtime settings to {:?}", env_file);
			}
			print_json(&view)?;
		}
	}

	Ok(())
}

fn require_api_key(config: &AppConfig) -> Result<(), SyncError> {
	if config.api_key.is_none() {
		return Err(SyncError::InvalidInput("AVE_API_KEY is not set".to_string()));
	}
	Ok(())
}

fn new_job_id() -> String {
	chrono::Utc::now().timestamp_millis().to_string()
}

/// Log every event of `job_id` until the service and its publisher are dropped.
fn watch_job(publisher: &Arc<ChannelPublisher>, job_id: &str) -> tokio::task::JoinHandle<()> {
	let mut rx = publisher.subscribe(job_id);
	tokio::spawn(async move {
		loop {
			match rx.recv().await {
				Ok(event) => match serde_json::to_string(&event) {
					Ok(line) => info!("{}", line),
					Err(e) => warn!("Unprintable {} event: {}", event.type_name(), e),
				},
				Err(RecvError::Lagged(n)) => warn!("Progress log skipped {} events", n),
				Err(RecvError::Closed) => break,
			}
		}
	})
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SyncError> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
