// src/pipeline/run.rs

//! Full aggregation run.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Config, FeedDocument, FullFeedDocument, Statistics};
use crate::services::{Collector, Enrichment, Geocoder};
use crate::storage::FeedStorage;

use super::aggregate::{Aggregator, EnrichReport, GeocodeReport, ValidationReport};
use super::metadata::build_metadata;
use super::priority::SourcePriority;
use super::shard::{ShardReport, Sharder};

const TOTAL_STEPS: usize = 6;

/// Optional stages wired in by the caller.
#[derive(Default)]
pub struct RunServices<'a> {
    pub geocoder: Option<&'a mut Geocoder>,
    pub enrichment: Option<&'a mut dyn Enrichment>,
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub collected: usize,
    pub duplicates: usize,
    pub failed_sources: Vec<String>,
    pub past_removed: usize,
    pub validation: ValidationReport,
    pub geocoding: Option<GeocodeReport>,
    pub enrichment: Option<EnrichReport>,
    pub statistics: Statistics,
    /// `None` when sharding failed
    pub shards: Option<ShardReport>,
}

fn step(current: usize, message: &str) {
    log::info!("[{}/{}] {}", current, TOTAL_STEPS, message);
}

/// Collect, clean, enrich and write the feed.
///
/// A failing collector is logged and skipped. Failing to write the main
/// feed files is fatal. A sharding failure is logged and reported as
/// `shards: None`.
pub async fn run_aggregation(
    config: &Config,
    mut collectors: Vec<Box<dyn Collector>>,
    services: RunServices<'_>,
    storage: &dyn FeedStorage,
    today: NaiveDate,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut aggregator = Aggregator::new(today);

    step(1, "Collect - Fetching events from sources");
    let priority = SourcePriority::new(config.aggregation.source_priority.iter().cloned());
    priority.order(&mut collectors, |c| c.name());

    for collector in &collectors {
        let days_ahead = collector
            .days_ahead()
            .unwrap_or(config.aggregation.default_days_ahead);
        log::info!("Fetching {} ({} days ahead)", collector.name(), days_ahead);

        match collector.fetch_events(days_ahead).await {
            Ok(events) => {
                let report = aggregator.add_events(events, collector.name());
                summary.collected += report.added;
                summary.duplicates += report.duplicates;
            }
            Err(e) => {
                log::warn!("Error fetching {}: {}", collector.name(), e);
                summary.failed_sources.push(collector.name().to_string());
            }
        }
    }

    step(2, "Validate - Dropping past and incomplete events");
    summary.past_removed = aggregator.filter_past_events();
    summary.validation = aggregator.validate_events();

    step(3, "Enrich - Repairing coordinates and resolving place ids");
    if let Some(geocoder) = services.geocoder {
        summary.geocoding = Some(aggregator.geocode_venues(geocoder, &config.geocoding).await);
    }
    match services.enrichment {
        Some(enrichment) => {
            summary.enrichment = Some(aggregator.enrich_with_place_ids(enrichment).await);
        }
        None => log::info!("Place-id enrichment skipped"),
    }

    step(4, "Sort - Ordering events and computing statistics");
    aggregator.sort_events();
    summary.statistics = aggregator.get_statistics();
    log_statistics(&summary.statistics);

    step(5, "Write - Saving feed files");
    let metadata = build_metadata(aggregator.events(), today);
    let events = aggregator.into_events();
    storage
        .write_full_feed(&FullFeedDocument::new(
            events.clone(),
            summary.statistics.clone(),
        ))
        .await?;
    storage.write_feed(&FeedDocument::new(events)).await?;
    storage.write_metadata(&metadata).await?;

    step(6, "Shard - Splitting feed by week");
    let sharder = Sharder::new(today, config.sharding.weeks);
    summary.shards = match sharder.split_by_week(storage).await {
        Ok(report) => Some(report),
        Err(e) => {
            log::warn!("Could not split by week: {}", e);
            None
        }
    };

    log::info!(
        "Aggregation complete: {} events from {} sources ({} failed)",
        summary.statistics.total_events,
        summary.statistics.sources.len(),
        summary.failed_sources.len()
    );
    Ok(summary)
}

fn log_statistics(stats: &Statistics) {
    log::info!("Total events: {}", stats.total_events);
    if let (Some(earliest), Some(latest)) = (&stats.date_range.earliest, &stats.date_range.latest) {
        log::info!("Date range: {} to {}", earliest, latest);
    }
    for (source, count) in &stats.sources {
        log::info!("  {}: {}", source, count);
    }
    for (category, count) in &stats.categories {
        log::debug!("  category {}: {}", category, count);
    }
}
