// src/pipeline/shard.rs

//! Weekly sharding of the canonical feed.
//!
//! Shard `n` (0-based) covers `[today + 7n, today + 7(n+1))`. Events on or
//! after `today + 7 * weeks` stay in the canonical feed only.

use chrono::{Days, NaiveDate, Utc};

use crate::error::Result;
use crate::models::{EventRecord, WeekShard};
use crate::storage::FeedStorage;
use crate::utils::{format_date, parse_date};

pub const DAYS_PER_WEEK: u64 = 7;

/// Where the events of one split went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    /// Event count per shard, in week order
    pub per_week: Vec<usize>,
    /// Dated on or after the last window
    pub unsharded: usize,
    /// Dated before today
    pub past: usize,
    /// Date missing or unparseable
    pub skipped: usize,
}

impl ShardReport {
    pub fn sharded(&self) -> usize {
        self.per_week.iter().sum()
    }
}

/// Splits events into consecutive 7-day windows starting today.
#[derive(Debug, Clone, Copy)]
pub struct Sharder {
    today: NaiveDate,
    weeks: u32,
}

impl Sharder {
    pub fn new(today: NaiveDate, weeks: u32) -> Self {
        Self { today, weeks }
    }

    pub fn weeks(&self) -> u32 {
        self.weeks
    }

    /// `[start, end)` of 0-based week `n`.
    pub fn window(&self, n: u32) -> (NaiveDate, NaiveDate) {
        let start = self.today + Days::new(u64::from(n) * DAYS_PER_WEEK);
        (start, start + Days::new(DAYS_PER_WEEK))
    }

    /// 0-based week index of `date`, if it falls inside any window.
    fn week_of(&self, date: NaiveDate) -> std::result::Result<u32, ShardMiss> {
        let offset = (date - self.today).num_days();
        if offset < 0 {
            return Err(ShardMiss::Past);
        }
        let week = offset / DAYS_PER_WEEK as i64;
        if week >= i64::from(self.weeks) {
            return Err(ShardMiss::Beyond);
        }
        Ok(week as u32)
    }

    /// Partition `events` into one shard per week.
    pub fn split(&self, events: &[EventRecord]) -> (Vec<WeekShard>, ShardReport) {
        let mut buckets: Vec<Vec<EventRecord>> = vec![Vec::new(); self.weeks as usize];
        let mut report = ShardReport::default();

        for event in events {
            let Some(date) = event.date.as_deref().and_then(parse_date) else {
                report.skipped += 1;
                continue;
            };
            match self.week_of(date) {
                Ok(week) => buckets[week as usize].push(event.clone()),
                Err(ShardMiss::Past) => report.past += 1,
                Err(ShardMiss::Beyond) => report.unsharded += 1,
            }
        }

        let generated_at = Utc::now();
        let shards: Vec<WeekShard> = buckets
            .into_iter()
            .enumerate()
            .map(|(n, events)| {
                let (start, end) = self.window(n as u32);
                WeekShard {
                    generated_at,
                    total_events: events.len(),
                    week: format!("Week {}", n + 1),
                    start: format_date(start),
                    end: format_date(end),
                    events,
                }
            })
            .collect();

        report.per_week = shards.iter().map(|s| s.total_events).collect();
        (shards, report)
    }

    /// Split `events` and write every shard, empty ones included.
    pub async fn write_shards(
        &self,
        events: &[EventRecord],
        storage: &dyn FeedStorage,
    ) -> Result<ShardReport> {
        let (shards, report) = self.split(events);

        for (n, shard) in shards.iter().enumerate() {
            storage.write_shard(n + 1, shard).await?;
        }

        log::info!(
            "Split {} events into {} weeks ({} beyond the last week, {} past, {} undated)",
            report.sharded(),
            self.weeks,
            report.unsharded,
            report.past,
            report.skipped
        );
        Ok(report)
    }

    /// Re-read the canonical feed from storage and write its shards.
    pub async fn split_by_week(&self, storage: &dyn FeedStorage) -> Result<ShardReport> {
        let feed = storage.load_feed().await?;
        if feed.events.is_empty() {
            log::warn!("Canonical feed has no events; writing empty shards");
        }
        self.write_shards(&feed.events, storage).await
    }
}

enum ShardMiss {
    Past,
    Beyond,
}
