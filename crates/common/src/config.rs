/// How the binary picks its market data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Live when credentials are present and the market is open, else fallback.
    Auto,
    Live,
    Fallback,
}

impl std::str::FromStr for FeedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(FeedMode::Auto),
            "live" => Ok(FeedMode::Live),
            "fallback" => Ok(FeedMode::Fallback),
            other => Err(format!(
                "FEED_MODE must be 'auto', 'live' or 'fallback', got: '{other}'"
            )),
        }
    }
}

/// Process-level settings loaded from environment variables at startup.
/// Thresholds live in the TOML file named by `scan_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    // Kite Connect credentials; both must be set for live mode.
    pub kite_api_key: Option<String>,
    pub kite_access_token: Option<String>,

    pub feed_mode: FeedMode,

    // Input files
    pub scan_config_path: String,
    pub universe_path: String,
    pub baseline_path: String,
    pub snapshot_path: String,

    // Output: SQLite when set, otherwise CSV files under `log_dir`.
    pub database_url: Option<String>,
    pub log_dir: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads `.env` if present. Panics on a malformed `FEED_MODE`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let feed_mode = optional_env("FEED_MODE")
            .map(|v| v.parse::<FeedMode>().unwrap_or_else(|e| panic!("ERROR: {e}")))
            .unwrap_or(FeedMode::Auto);

        Config {
            kite_api_key: optional_env("KITE_API_KEY"),
            kite_access_token: optional_env("KITE_ACCESS_TOKEN"),
            feed_mode,
            scan_config_path: optional_env("SURGE_CONFIG_PATH")
                .unwrap_or_else(|| "config/surge.toml".to_string()),
            universe_path: optional_env("UNIVERSE_PATH")
                .unwrap_or_else(|| "data/ind_nifty200list.csv".to_string()),
            baseline_path: optional_env("BASELINE_PATH")
                .unwrap_or_else(|| "data/baseline_volumes.csv".to_string()),
            snapshot_path: optional_env("SNAPSHOT_PATH")
                .unwrap_or_else(|| "data/ltp_snapshot_last.json".to_string()),
            database_url: optional_env("DATABASE_URL"),
            log_dir: optional_env("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        }
    }

    /// Both Kite credentials, if configured.
    pub fn kite_credentials(&self) -> Option<(&str, &str)> {
        match (&self.kite_api_key, &self.kite_access_token) {
            (Some(key), Some(token)) => Some((key.as_str(), token.as_str())),
            _ => None,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_mode_parses_case_insensitively() {
        assert_eq!("LIVE".parse::<FeedMode>(), Ok(FeedMode::Live));
        assert_eq!(" fallback ".parse::<FeedMode>(), Ok(FeedMode::Fallback));
        assert!("paper".parse::<FeedMode>().is_err());
    }
}
