//! Pipeline stages.
//!
//! - [`aggregate`]: dedup, validation, enrichment, ordering, statistics
//! - [`priority`]: explicit source ranking
//! - [`metadata`]: next-seven-days page summary
//! - [`shard`]: weekly feed shards
//! - [`run`]: the full aggregation run

pub mod aggregate;
pub mod metadata;
pub mod priority;
pub mod run;
pub mod shard;

pub use aggregate::{
    AddReport, Aggregator, EnrichReport, GeocodeReport, ValidationReport, statistics,
};
pub use metadata::build_metadata;
pub use priority::SourcePriority;
pub use run::{RunServices, RunSummary, run_aggregation};
pub use shard::{ShardReport, Sharder};
