//! vpw-tracker - vanity plate watchlist
//!
//! Keeps a watchlist of personalized plate candidates and re-checks their
//! availability with each jurisdiction's service, at most once per calendar
//! month per plate unless forced.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vpw_common::config::{
    load_toml_config, RootFolderInitializer, RootFolderResolver, StorageBackend, TomlConfig,
};
use vpw_common::events::EventBus;
use vpw_common::model::{Facets, Jurisdiction};
use vpw_common::{normalize, time, PlateKey};
use vpw_tracker::services::{AvailabilityRouter, RefreshScheduler};
use vpw_tracker::store::{JsonFileStorage, PlateStorage, PlateStore, SqliteStorage};
use vpw_tracker::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "vpw-tracker", version, about = "Vanity plate availability watchlist")]
struct Cli {
    /// Folder holding the plate database (overrides VPW_ROOT_FOLDER and TOML)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: <config dir>/vpw/vpw-tracker.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct PlateArgs {
    /// Plate text; normalized to uppercase letters/digits, O becomes 0
    plate: String,

    /// Jurisdiction tag (ID, CA)
    #[arg(long, short = 'j', default_value = "ID")]
    jurisdiction: Jurisdiction,

    #[arg(long)]
    vehicle_type: Option<String>,

    #[arg(long)]
    plate_type: Option<String>,

    #[arg(long)]
    program: Option<String>,

    #[arg(long)]
    program_id: Option<String>,

    #[arg(long)]
    program_sub_category: Option<String>,
}

impl PlateArgs {
    fn facets(&self) -> Facets {
        Facets {
            vehicle_type: self.vehicle_type.clone(),
            plate_type: self.plate_type.clone(),
            program: self.program.clone(),
            program_id: self.program_id.clone(),
            program_sub_category: self.program_sub_category.clone(),
        }
    }

    fn key(&self) -> PlateKey {
        PlateKey::new(&normalize(&self.plate), self.jurisdiction.clone(), &self.facets())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a plate to the watchlist
    Add(PlateArgs),
    /// List watched plates
    List {
        /// Only plates an unforced refresh would check
        #[arg(long)]
        due: bool,
    },
    /// Remove a plate from the watchlist
    Remove(PlateArgs),
    /// Re-check availability of due plates
    Refresh {
        /// Check every plate regardless of when it was last checked
        #[arg(long)]
        force: bool,
    },
    /// Write the watchlist as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Replace the watchlist with a JSON export
    Import { file: PathBuf },
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Read quietly first: the log level comes from this config
    let (config, config_source) = load_toml_config(cli.config.as_deref(), "vpw-tracker");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting vpw-tracker v{}", env!("CARGO_PKG_VERSION"));
    config_source.log();

    let resolver = RootFolderResolver::new(cli.root_folder.clone(), &config);
    let initializer = RootFolderInitializer::new(resolver.resolve());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let event_bus = EventBus::new(100);
    let storage = open_storage(&config, &initializer).await?;
    let store = Arc::new(PlateStore::new(storage).with_events(event_bus.clone()));
    store.migrate_on_startup().await?;

    match cli.command {
        Command::Add(args) => {
            let record = store
                .add_plate(&args.plate, args.jurisdiction.clone(), args.facets())
                .await?;
            println!("Watching {} ({})", record.plate_text, record.jurisdiction());
        }
        Command::List { due } => {
            let records = store.load().await?;
            let now = time::now();
            for record in records {
                let record_due = vpw_tracker::services::is_due(&record, now);
                if due && !record_due {
                    continue;
                }
                println!(
                    "{:<8} {:<3} {:<12} {}{}",
                    record.plate_text,
                    record.jurisdiction().to_string(),
                    record.last_status.to_string(),
                    record.last_checked_utc.as_deref().unwrap_or("never"),
                    if record_due { "  (due)" } else { "" }
                );
            }
        }
        Command::Remove(args) => {
            let key = args.key();
            if store.delete_by_key(&key).await? {
                println!("Removed {}", key);
            } else {
                println!("No plate matches {}", key);
            }
        }
        Command::Refresh { force } => {
            let scheduler = build_scheduler(&config, store.clone(), event_bus.clone())?;
            let summary = scheduler
                .run_with_progress(force, |p| {
                    println!("[{}/{}] {} -> {}", p.completed, p.total, p.plate_text, p.status);
                })
                .await?;
            println!(
                "Checked {} plate(s), {} failed ({:?})",
                summary.total, summary.failed, summary.outcome
            );
        }
        Command::Export { output } => {
            let dump = store.export().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, dump)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", dump),
            }
        }
        Command::Import { file } => {
            let payload = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let count = store.import(&payload).await?;
            println!("Imported {} plate(s)", count);
        }
        Command::Serve { port } => {
            let scheduler = build_scheduler(&config, store.clone(), event_bus.clone())?;
            let state = AppState::new(store, Arc::new(scheduler), event_bus);
            let app = build_router(state);

            let port = port.unwrap_or(config.http.port);
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
            info!("Listening on http://127.0.0.1:{}", port);
            info!("Health check: http://127.0.0.1:{}/health", port);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

async fn open_storage(
    config: &TomlConfig,
    initializer: &RootFolderInitializer,
) -> Result<Arc<dyn PlateStorage>> {
    let storage: Arc<dyn PlateStorage> = match config.storage.backend {
        StorageBackend::Sqlite => {
            let db_path = initializer.database_path();
            info!("Database: {}", db_path.display());
            Arc::new(SqliteStorage::open(&db_path).await?)
        }
        StorageBackend::Json => {
            let path = initializer.json_store_path();
            info!("Plate file: {}", path.display());
            Arc::new(JsonFileStorage::new(path))
        }
    };
    Ok(storage)
}

fn build_scheduler(
    config: &TomlConfig,
    store: Arc<PlateStore>,
    event_bus: EventBus,
) -> Result<RefreshScheduler> {
    let mut availability = config.availability.clone();
    availability.apply_env_overrides();

    let router = AvailabilityRouter::from_config(&availability)?;
    Ok(RefreshScheduler::new(
        store,
        Arc::new(router),
        time::millis_to_duration(availability.request_delay_ms),
        event_bus,
    ))
}
