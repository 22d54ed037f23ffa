use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Bright Data proxy
    pub brightdata_api_key: String,
    pub serp_zone: String,
    pub unlocker_zone: String,

    // Per-operation timeouts (seconds)
    pub serp_timeout_secs: u64,
    pub unlock_timeout_secs: u64,
    pub auth_fetch_timeout_secs: u64,
    pub fetch_timeout_secs: u64,

    // Per-request budget caps
    pub max_search_calls: u64,
    pub max_document_fetches: u64,
    pub max_total_bytes: u64,
    pub max_wall_clock_ms: u64,

    // Domains that block direct fetches and must go through the unlocker
    pub unlock_domains: Vec<String>,
    // Domains whose blocked/empty responses get a shorter retry TTL (hours)
    pub short_ttl_domains: Vec<(String, i64)>,

    // Postgres cache tables; absent means in-memory cache only
    pub database_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            brightdata_api_key: required_env("BRIGHTDATA_API_KEY"),
            serp_zone: required_env("BRIGHTDATA_SERP_ZONE"),
            unlocker_zone: required_env("BRIGHTDATA_UNLOCKER_ZONE"),
            serp_timeout_secs: env_u64("SERP_TIMEOUT_SECS", 20),
            unlock_timeout_secs: env_u64("UNLOCK_TIMEOUT_SECS", 45),
            auth_fetch_timeout_secs: env_u64("AUTH_FETCH_TIMEOUT_SECS", 30),
            fetch_timeout_secs: env_u64("FETCH_TIMEOUT_SECS", 15),
            max_search_calls: env_u64("MAX_SEARCH_CALLS", 12),
            max_document_fetches: env_u64("MAX_DOCUMENT_FETCHES", 3),
            max_total_bytes: env_u64("MAX_TOTAL_BYTES", 5_000_000),
            max_wall_clock_ms: env_u64("MAX_WALL_CLOCK_MS", 90_000),
            unlock_domains: env_list("UNLOCK_DOMAINS"),
            short_ttl_domains: env_ttl_overrides("SHORT_TTL_DOMAINS"),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }

    /// Log the active knobs without leaking the API key.
    pub fn log_redacted(&self) {
        info!(
            serp_zone = %self.serp_zone,
            unlocker_zone = %self.unlocker_zone,
            max_search_calls = self.max_search_calls,
            max_document_fetches = self.max_document_fetches,
            max_total_bytes = self.max_total_bytes,
            max_wall_clock_ms = self.max_wall_clock_ms,
            unlock_domains = self.unlock_domains.len(),
            persistent_cache = self.database_url.is_some(),
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{key} must be a number")))
        .unwrap_or(default)
}

/// Comma-separated list, empty entries dropped.
fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// "domain=hours" pairs, comma-separated: "vivino.com=2,wine-searcher.com=1".
fn env_ttl_overrides(key: &str) -> Vec<(String, i64)> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .filter_map(|pair| {
                    let (domain, hours) = pair.split_once('=')?;
                    Some((domain.trim().to_lowercase(), hours.trim().parse().ok()?))
                })
                .collect()
        })
        .unwrap_or_default()
}
