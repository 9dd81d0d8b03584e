// src/services/collector.rs

//! Event sources.
//!
//! Site-specific scrapers run outside this crate and drop their output as
//! JSON files; [`JsonFileCollector`] reads one such file per source.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Config, EventRecord};
use crate::utils::parse_date;

/// A module producing event records from one external source.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source identifier stamped on every record.
    fn name(&self) -> &str;

    /// Lookahead window used when the caller has no better value.
    fn days_ahead(&self) -> Option<u32> {
        None
    }

    /// Events from today through `today + days_ahead`.
    async fn fetch_events(&self, days_ahead: u32) -> Result<Vec<EventRecord>>;
}

/// Scraper output: either a bare list or an object with an `events` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceFile {
    List(Vec<EventRecord>),
    Wrapped { events: Vec<EventRecord> },
}

impl SourceFile {
    fn into_events(self) -> Vec<EventRecord> {
        match self {
            SourceFile::List(events) => events,
            SourceFile::Wrapped { events } => events,
        }
    }
}

/// Reads events from a JSON file written by an external scraper.
#[derive(Debug, Clone)]
pub struct JsonFileCollector {
    name: String,
    path: PathBuf,
    days_ahead: Option<u32>,
    today: NaiveDate,
}

impl JsonFileCollector {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, today: NaiveDate) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            days_ahead: None,
            today,
        }
    }

    pub fn with_days_ahead(mut self, days_ahead: Option<u32>) -> Self {
        self.days_ahead = days_ahead;
        self
    }

    /// Records dated after the window are dropped. Undated or unparseable
    /// records pass through for validation to judge.
    fn within_window(&self, event: &EventRecord, days_ahead: u32) -> bool {
        let Some(last) = self.today.checked_add_days(Days::new(u64::from(days_ahead))) else {
            return true;
        };
        match event.date.as_deref().and_then(parse_date) {
            Some(date) => date <= last,
            None => true,
        }
    }
}

#[async_trait]
impl Collector for JsonFileCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn days_ahead(&self) -> Option<u32> {
        self.days_ahead
    }

    async fn fetch_events(&self, days_ahead: u32) -> Result<Vec<EventRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            AppError::collector(&self.name, format!("{}: {}", self.path.display(), e))
        })?;

        let file: SourceFile = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::collector(&self.name, format!("{}: {}", self.path.display(), e))
        })?;

        let events = file.into_events();
        let total = events.len();
        let kept: Vec<EventRecord> = events
            .into_iter()
            .filter(|e| self.within_window(e, days_ahead))
            .collect();

        if kept.len() < total {
            log::debug!(
                "{}: {} events beyond {} days dropped",
                self.name,
                total - kept.len(),
                days_ahead
            );
        }
        Ok(kept)
    }
}

/// Build one collector per enabled source, in configured order.
pub fn collectors_from_config(config: &Config, today: NaiveDate) -> Vec<Box<dyn Collector>> {
    config
        .enabled_sources()
        .map(|source| {
            Box::new(
                JsonFileCollector::new(&source.name, &source.path, today)
                    .with_days_ahead(source.days_ahead),
            ) as Box<dyn Collector>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceConfig;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 1).unwrap()
    }

    #[tokio::test]
    async fn test_reads_bare_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tpl.json");
        std::fs::write(
            &path,
            r#"[{"title":"Storytime","date":"2025-11-05","start_time":"10:00","venue":{"name":"Main Library"}}]"#,
        )
        .unwrap();

        let collector = JsonFileCollector::new("TPL", &path, today());
        let events = collector.fetch_events(7).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title.as_deref(), Some("Storytime"));
    }

    #[tokio::test]
    async fn test_reads_wrapped_list_and_applies_window() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rom.json");
        std::fs::write(
            &path,
            r#"{"generated_at":"x","events":[
                {"title":"Soon","date":"2025-11-03","start_time":"10:00"},
                {"title":"Edge","date":"2025-11-08","start_time":"10:00"},
                {"title":"Later","date":"2025-11-20","start_time":"10:00"},
                {"title":"Undated","start_time":"10:00"}
            ]}"#,
        )
        .unwrap();

        let collector = JsonFileCollector::new("ROM", &path, today());
        let events = collector.fetch_events(7).await.unwrap();
        let titles: Vec<_> = events.iter().filter_map(|e| e.title.as_deref()).collect();
        assert_eq!(titles, vec!["Soon", "Edge", "Undated"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_collector_error() {
        let tmp = TempDir::new().unwrap();
        let collector = JsonFileCollector::new("Gone", tmp.path().join("gone.json"), today());

        let err = collector.fetch_events(7).await.unwrap_err();
        assert!(matches!(err, AppError::Collector { ref source_name, .. } if source_name == "Gone"));
    }

    #[tokio::test]
    async fn test_malformed_file_is_collector_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, r#"{"events": 5}"#).unwrap();

        let collector = JsonFileCollector::new("Bad", &path, today());
        assert!(collector.fetch_events(7).await.is_err());
    }

    #[test]
    fn test_collectors_from_config_skips_disabled() {
        let mut config = Config::default();
        config.sources = vec![
            SourceConfig {
                name: "TPL".to_string(),
                path: PathBuf::from("tpl.json"),
                days_ahead: None,
                enabled: true,
            },
            SourceConfig {
                name: "ROM".to_string(),
                path: PathBuf::from("rom.json"),
                days_ahead: Some(90),
                enabled: false,
            },
        ];

        let collectors = collectors_from_config(&config, today());
        assert_eq!(collectors.len(), 1);
        assert_eq!(collectors[0].name(), "TPL");
        assert_eq!(collectors[0].days_ahead(), None);
    }
}
