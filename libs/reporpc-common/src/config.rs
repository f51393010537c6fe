use std::env;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub projects_config_path: String,
    pub default_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub max_batch_size: usize,
    /// LOG_FORMAT=json switches the subscriber to JSON lines
    pub log_json: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let max_timeout_ms = env_or("MAX_TIMEOUT_MS", 300_000);
        Self {
            port: env_or("PORT", 3000),
            projects_config_path: env::var("PROJECTS_CONFIG_PATH")
                .unwrap_or_else(|_| "config/projects.json".to_string()),
            default_timeout_ms: env_or("DEFAULT_TIMEOUT_MS", 30_000u64).min(max_timeout_ms),
            max_timeout_ms,
            max_batch_size: env_or("MAX_BATCH_SIZE", 64),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }

    /// Resolve a caller-requested deadline: default when absent, never above the max
    pub fn effective_timeout_ms(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_timeout_ms)
            .min(self.max_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
