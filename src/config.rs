//! Runtime tunables for a single scheduler invocation, together with the
//! local/remote endpoint the binding talks to. Built from CLI flags via `clap`.

use clap::ArgMatches;

/// Scheduler tunables, all with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub local_folder: String,
    pub database_path: String,
    pub server_url: String,
    pub credentials: String,

    pub delay_secs: u64,
    pub max_sync_step: i64,
    pub limit_pending: i64,
    pub error_skip_period_secs: i64,
    pub default_page_size: usize,
    pub max_loops: Option<u64>,
}

impl Config {
    pub const DEFAULT_DELAY_SECS: u64 = 5;
    pub const DEFAULT_MAX_SYNC_STEP: i64 = 10;
    pub const DEFAULT_LIMIT_PENDING: i64 = 100;
    pub const DEFAULT_ERROR_SKIP_PERIOD_SECS: i64 = 300;
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    pub fn new(local_folder: String, server_url: String, credentials: String) -> Self {
        Self {
            database_path: format!("{}/.pairsync.sqlite", local_folder.trim_end_matches('/')),
            local_folder,
            server_url,
            credentials,
            delay_secs: Self::DEFAULT_DELAY_SECS,
            max_sync_step: Self::DEFAULT_MAX_SYNC_STEP,
            limit_pending: Self::DEFAULT_LIMIT_PENDING,
            error_skip_period_secs: Self::DEFAULT_ERROR_SKIP_PERIOD_SECS,
            default_page_size: Self::DEFAULT_PAGE_SIZE,
            max_loops: None,
        }
    }

    /// Overlays `clap` flags (when present) onto the defaults; any flag left
    /// unset keeps its default rather than being forced to zero.
    pub fn from_matches(local_folder: &str, server_url: &str, credentials: &str, matches: &ArgMatches) -> Self {
        let mut config = Self::new(local_folder.to_string(), server_url.to_string(), credentials.to_string());
        if let Some(v) = matches.value_of("delay").and_then(|v| v.parse().ok()) {
            config.delay_secs = v;
        }
        if let Some(v) = matches.value_of("max-sync-step").and_then(|v| v.parse().ok()) {
            config.max_sync_step = v;
        }
        if let Some(v) = matches.value_of("limit-pending").and_then(|v| v.parse().ok()) {
            config.limit_pending = v;
        }
        if let Some(v) = matches.value_of("error-skip-period").and_then(|v| v.parse().ok()) {
            config.error_skip_period_secs = v;
        }
        if let Some(v) = matches.value_of("max-loops").and_then(|v| v.parse().ok()) {
            config.max_loops = Some(v);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_tunables() {
        let config = Config::new("/tmp/root".to_string(), "https://example.com".to_string(), "token".to_string());
        assert_eq!(config.delay_secs, 5);
        assert_eq!(config.max_sync_step, 10);
        assert_eq!(config.limit_pending, 100);
        assert_eq!(config.error_skip_period_secs, 300);
        assert_eq!(config.default_page_size, 100);
    }
}
