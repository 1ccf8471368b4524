//! Application configuration loaded from environment variables.
//!
//! Every variable is optional. A `.env` file is read first if present.

use crate::services::collector::CollectTimeouts;
use crate::services::pipeline::PipelineSettings;
use crate::services::rewards::{RewardSchedule, ScheduleError};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Relays queried when `RELAYS` is not set.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.nostr.band",
];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay endpoints (WebSocket URLs)
    pub relays: Vec<String>,
    /// Record kind for workouts
    pub workout_kind: u32,
    pub relay_timeout: Duration,
    pub global_timeout: Duration,
    /// Max records requested per relay
    pub query_limit: u32,
    /// Client identifiers to keep (empty keeps all)
    pub client_tags: Vec<String>,
    /// Drop records whose id does not match their content
    pub verify_event_ids: bool,
    /// File cache directory (in-memory cache if unset)
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
    /// Server port
    pub port: u16,
    /// Allowed CORS origin
    pub frontend_url: String,
    pub payout_api_url: Option<String>,
    pub payout_api_key: Option<String>,
    /// JSON reward schedule overriding the built-in ones
    pub reward_schedule_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            workout_kind: crate::models::record::WORKOUT_KIND,
            relay_timeout: Duration::from_secs(10),
            global_timeout: Duration::from_secs(30),
            query_limit: 2000,
            client_tags: Vec::new(),
            verify_event_ids: false,
            cache_dir: None,
            cache_ttl: Duration::from_secs(15 * 60),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            payout_api_url: None,
            payout_api_key: None,
            reward_schedule_file: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            relays: get("RELAYS").map(|v| split_list(&v)).unwrap_or(defaults.relays),
            workout_kind: parse_or("WORKOUT_KIND", get("WORKOUT_KIND"), defaults.workout_kind)?,
            relay_timeout: parse_secs_or(
                "RELAY_TIMEOUT_SECS",
                get("RELAY_TIMEOUT_SECS"),
                defaults.relay_timeout,
            )?,
            global_timeout: parse_secs_or(
                "GLOBAL_TIMEOUT_SECS",
                get("GLOBAL_TIMEOUT_SECS"),
                defaults.global_timeout,
            )?,
            query_limit: parse_or("QUERY_LIMIT", get("QUERY_LIMIT"), defaults.query_limit)?,
            client_tags: get("CLIENT_TAGS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            verify_event_ids: parse_or(
                "VERIFY_EVENT_IDS",
                get("VERIFY_EVENT_IDS"),
                defaults.verify_event_ids,
            )?,
            cache_dir: get("CACHE_DIR").map(PathBuf::from),
            cache_ttl: parse_secs_or("CACHE_TTL_SECS", get("CACHE_TTL_SECS"), defaults.cache_ttl)?,
            port: parse_or("PORT", get("PORT"), defaults.port)?,
            frontend_url: get("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            payout_api_url: get("PAYOUT_API_URL"),
            payout_api_key: get("PAYOUT_API_KEY"),
            reward_schedule_file: get("REWARD_SCHEDULE_FILE").map(PathBuf::from),
        })
    }

    pub fn collect_timeouts(&self) -> CollectTimeouts {
        CollectTimeouts {
            per_endpoint: self.relay_timeout,
            global: self.global_timeout,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            endpoints: self.relays.clone(),
            kind: self.workout_kind,
            timeouts: self.collect_timeouts(),
            query_limit: Some(self.query_limit),
            client_tags: self.client_tags.clone(),
            cache_ttl: self.cache_ttl,
        }
    }

    /// Reward schedule: a file (explicit or configured) wins over a
    /// built-in name; `tiered` is the fallback.
    pub fn reward_schedule(
        &self,
        name: Option<&str>,
        file: Option<&std::path::Path>,
    ) -> Result<RewardSchedule, ScheduleError> {
        match (file, name, &self.reward_schedule_file) {
            (Some(path), _, _) => RewardSchedule::from_file(path),
            (None, Some(name), _) => RewardSchedule::named(name),
            (None, None, Some(path)) => RewardSchedule::from_file(path),
            (None, None, None) => Ok(RewardSchedule::tiered()),
        }
    }

    /// Payments API URL and key, both required to send real payouts.
    pub fn payout_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .payout_api_url
            .as_deref()
            .ok_or(ConfigError::Missing("PAYOUT_API_URL"))?;
        let key = self
            .payout_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("PAYOUT_API_KEY"))?;
        Ok((url, key))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn parse_secs_or(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(name, value, default.as_secs()).map(Duration::from_secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
