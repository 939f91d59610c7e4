//! Application-level configuration loading: search and playback tunables from a
//! JSON file, secrets from the environment.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::playback_service::PlaybackTuning;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TUNE_TRIVIA_CONFIG_PATH";
const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";
const YOUTUBE_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Video search tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Results requested per query.
    pub max_results: u8,
    /// Lifetime of a cached result set.
    pub cache_ttl: Duration,
    /// Period of the cache cleanup task.
    pub cleanup_interval: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            cache_ttl: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub search: SearchSettings,
    pub playback: PlaybackTuning,
    /// How long to wait for the browser player to answer a query.
    pub player_query_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            playback: PlaybackTuning::default(),
            player_query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document; absent keys keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

/// Secrets supplied through the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Expected value of the `X-Admin-Token` header. Admin routes are closed without it.
    pub admin_token: Option<String>,
    /// YouTube Data API key. Video search is disabled without it.
    pub youtube_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            admin_token: non_empty_env(ADMIN_TOKEN_ENV),
            youtube_api_key: non_empty_env(YOUTUBE_API_KEY_ENV),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    search: RawSearch,
    playback: RawPlayback,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSearch {
    max_results: Option<u8>,
    cache_ttl_secs: Option<u64>,
    cleanup_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPlayback {
    settle_delay_ms: Option<u64>,
    pause_recheck_ms: Option<u64>,
    max_pause_checks: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_attempts: Option<u32>,
    fallback_duration_secs: Option<u64>,
    tail_margin_secs: Option<u32>,
    query_timeout_ms: Option<u64>,
}

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let search_defaults = SearchSettings::default();
        let search = SearchSettings {
            max_results: value
                .search
                .max_results
                .unwrap_or(search_defaults.max_results)
                .clamp(1, 50),
            cache_ttl: value
                .search
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(search_defaults.cache_ttl),
            cleanup_interval: value
                .search
                .cleanup_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(search_defaults.cleanup_interval),
        };

        let defaults = PlaybackTuning::default();
        let raw = value.playback;
        let playback = PlaybackTuning {
            settle_delay: raw
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            pause_recheck: raw
                .pause_recheck_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.pause_recheck),
            max_pause_checks: raw.max_pause_checks.unwrap_or(defaults.max_pause_checks),
            retry_delay: raw
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            fallback_duration: raw
                .fallback_duration_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fallback_duration),
            tail_margin_secs: raw.tail_margin_secs.unwrap_or(defaults.tail_margin_secs),
        };

        Self {
            search,
            playback,
            player_query_timeout: raw
                .query_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_QUERY_TIMEOUT),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.search, SearchSettings::default());
        assert_eq!(config.playback, PlaybackTuning::default());
        assert_eq!(config.player_query_timeout, DEFAULT_QUERY_TIMEOUT);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = AppConfig::from_json(
            r#"{ "search": { "cache_ttl_secs": 60 }, "playback": { "max_attempts": 3, "query_timeout_ms": 750 } }"#,
        )
        .unwrap();
        assert_eq!(config.search.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.playback.max_attempts, 3);
        assert_eq!(config.playback.settle_delay, Duration::from_secs(1));
        assert_eq!(config.player_query_timeout, Duration::from_millis(750));
    }

    #[test]
    fn invalid_values_are_clamped() {
        let config = AppConfig::from_json(
            r#"{ "search": { "max_results": 0 }, "playback": { "max_attempts": 0, "fallback_duration_secs": 0 } }"#,
        )
        .unwrap();
        assert_eq!(config.search.max_results, 1);
        assert_eq!(config.playback.max_attempts, 1);
        assert_eq!(config.playback.fallback_duration, Duration::from_secs(10));
    }
}
