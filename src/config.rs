// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the TOML configuration and picking up
//! credentials from the environment.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Primary environment variable holding the Maps API key.
pub const MAPS_API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";

/// Fallback environment variable for the API key.
pub const GENERIC_API_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Load and validate configuration.
///
/// A missing file yields the defaults; a file that exists but does not
/// parse or validate is an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();

    let config = if path.exists() {
        log::info!("Loading config from {}", path.display());
        Config::load(path)
            .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?
    } else {
        log::warn!("Config {} not found, using defaults", path.display());
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

/// API key from the environment, if any.
pub fn api_key_from_env() -> Option<String> {
    pick_api_key(
        std::env::var(MAPS_API_KEY_VAR).ok(),
        std::env::var(GENERIC_API_KEY_VAR).ok(),
    )
}

/// Prefer the Maps-specific key; blank values count as unset.
pub fn pick_api_key(maps: Option<String>, generic: Option<String>) -> Option<String> {
    let usable = |key: Option<String>| {
        key.map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    };
    usable(maps).or_else(|| usable(generic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pick_api_key() {
        assert_eq!(
            pick_api_key(Some("maps".into()), Some("generic".into())),
            Some("maps".to_string())
        );
        assert_eq!(
            pick_api_key(None, Some("generic".into())),
            Some("generic".to_string())
        );
        assert_eq!(
            pick_api_key(Some("  ".into()), Some("generic".into())),
            Some("generic".to_string())
        );
        assert_eq!(pick_api_key(None, None), None);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.sharding.weeks, 4);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("eventfeed.toml");
        std::fs::write(&path, "[sharding]\nweeks = 0\n").unwrap();
        assert!(load_config(&path).is_err());

        std::fs::write(&path, "[sharding\n").unwrap();
        assert!(matches!(load_config(&path), Err(AppError::Config(_))));
    }
}
