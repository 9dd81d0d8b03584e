//! eventfeed CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use eventfeed::{
    config::{api_key_from_env, load_config},
    error::Result,
    pipeline::{self, RunServices, Sharder},
    services::{Coordinates, Enrichment, Geocoder, PlaceCacheEntry, PlaceLookup, collectors_from_config},
    storage::{CacheStore, JsonFileCache, LocalStorage},
};

/// eventfeed - Kids Events Feed Aggregator
#[derive(Parser, Debug)]
#[command(
    name = "eventfeed",
    version,
    about = "Aggregates kids events into a deduplicated JSON feed"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "eventfeed.toml")]
    config: PathBuf,

    /// Override the output directory from the config
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full aggregation (default)
    Run {
        /// Skip geocoding and place-id lookups
        #[arg(long)]
        skip_enrichment: bool,
    },

    /// Re-split an existing events.json into weekly shards
    Shard,

    /// Validate the configuration file
    Validate,

    /// Show lookup cache statistics
    CacheStats,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("eventfeed starting...");

    let mut config = load_config(&cli.config)?;
    if let Some(dir) = cli.output {
        config.output.dir = dir;
    }

    let today = Local::now().date_naive();
    let storage = LocalStorage::new(&config.output.dir);

    match cli.command.unwrap_or(Command::Run {
        skip_enrichment: false,
    }) {
        Command::Run { skip_enrichment } => {
            let collectors = collectors_from_config(&config, today);
            if collectors.is_empty() {
                log::warn!("No enabled sources configured in {}", cli.config.display());
            }

            let api_key = api_key_from_env();
            let mut geocoder = if config.geocoding.enabled && !skip_enrichment {
                Some(Geocoder::from_config(&config.geocoding, api_key.as_deref())?)
            } else {
                None
            };
            let mut lookup = if config.enrichment.enabled && !skip_enrichment {
                Some(PlaceLookup::from_config(&config.enrichment, api_key.as_deref())?)
            } else {
                None
            };

            let services = RunServices {
                geocoder: geocoder.as_mut(),
                enrichment: lookup.as_mut().map(|l| l as &mut dyn Enrichment),
            };

            let summary =
                pipeline::run_aggregation(&config, collectors, services, &storage, today).await?;

            log::info!(
                "Wrote {} events to {}",
                summary.statistics.total_events,
                storage.root().display()
            );
            if !summary.failed_sources.is_empty() {
                log::warn!("Failed sources: {}", summary.failed_sources.join(", "));
            }
        }

        Command::Shard => {
            let sharder = Sharder::new(today, config.sharding.weeks);
            let report = sharder.split_by_week(&storage).await?;
            log::info!(
                "{} events sharded, {} beyond the last week",
                report.sharded(),
                report.unsharded
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({} sources)", config.sources.len());

            for source in &config.sources {
                let state = if !source.enabled {
                    "disabled"
                } else if source.path.exists() {
                    "ok"
                } else {
                    "file not found"
                };
                log::info!("  {} -> {} ({})", source.name, source.path.display(), state);
            }

            if api_key_from_env().is_none() {
                log::warn!("No Maps API key in the environment; lookups will be skipped");
            }
            log::info!("All validations passed!");
        }

        Command::CacheStats => {
            let places: JsonFileCache<PlaceCacheEntry> =
                JsonFileCache::open(&config.enrichment.cache_file);
            let resolved = places.values().filter(|e| e.place_id.is_some()).count();
            log::info!(
                "Place cache {}: {} entries ({} resolved, {} negative)",
                places.path().display(),
                places.len(),
                resolved,
                places.len() - resolved
            );

            let geocodes: JsonFileCache<Option<Coordinates>> =
                JsonFileCache::open(&config.geocoding.cache_file);
            let found = geocodes.values().filter(|c| c.is_some()).count();
            log::info!(
                "Geocode cache {}: {} entries ({} resolved, {} negative)",
                geocodes.path().display(),
                geocodes.len(),
                found,
                geocodes.len() - found
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
