use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read once from the environment and passed into
/// each manager context. No module reads env vars after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// Default TTL for manager cache entries.
    pub cache_ttl: Duration,
    /// Opt-in error logging; managers stay silent without it.
    pub debug_log: bool,
    /// Fixed system user that authors welcome messages.
    pub welcome_sender_id: i64,
    pub welcome_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("fitdesk.db"),
            cache_ttl: Duration::from_secs(300),
            debug_log: false,
            welcome_sender_id: 1,
            welcome_message: "Welcome to your dashboard! Your coach will be in touch soon."
                .to_string(),
        }
    }
}

impl Config {
    /// Load from the environment, with `.env` support. Unset or
    /// unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            database_path: std::env::var("FITDESK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            cache_ttl: std::env::var("FITDESK_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            debug_log: std::env::var("FITDESK_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.debug_log),
            welcome_sender_id: std::env::var("FITDESK_WELCOME_SENDER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.welcome_sender_id),
            welcome_message: std::env::var("FITDESK_WELCOME_MESSAGE")
                .unwrap_or(defaults.welcome_message),
        }
    }
}
