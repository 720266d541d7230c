use crate::constants;
use crate::error::{Result, SteamError};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub steam: SteamConfig,
    pub ledger: LedgerConfig,
    pub retry: RetryConfig,
    pub reviews: ReviewsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SteamConfig {
    pub app_list_url: String,
    pub app_details_url: String,
    pub app_reviews_url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            app_list_url: constants::APP_LIST_URL.to_string(),
            app_details_url: constants::APP_DETAILS_URL.to_string(),
            app_reviews_url: constants::APP_REVIEWS_URL.to_string(),
            timeout_seconds: 30,
            user_agent: format!("steam_reviews/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    pub games_file: String,
    pub non_games_file: String,
    pub unclassified_file: String,
    /// Persist apps the store has no data for so later runs skip them.
    pub track_unclassified: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            games_file: constants::GAMES_FILE.to_string(),
            non_games_file: constants::NON_GAMES_FILE.to_string(),
            unclassified_file: constants::UNCLASSIFIED_FILE.to_string(),
            track_unclassified: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_secs: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_secs: constants::DEFAULT_RETRY_DELAY_SECS,
            multiplier: 2.0,
            max_delay_secs: 1800,
            jitter: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewsConfig {
    pub review_dir: PathBuf,
    pub num_per_page: u32,
    pub language: String,
    pub filter: String,
    pub requests_per_window: u64,
    pub window_secs: u64,
    /// Stop paginating once a page holds only reviews already on disk.
    pub incremental: bool,
}

impl Default for ReviewsConfig {
    fn default() -> Self {
        Self {
            review_dir: PathBuf::from("data"),
            num_per_page: 100,
            language: "all".to_string(),
            filter: "recent".to_string(),
            requests_per_window: 150,
            window_secs: 300,
            incremental: true,
        }
    }
}

impl Config {
    /// Loads the file at `config_path` if it exists, then applies environment overrides.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                SteamError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            toml::from_str(&config_content)?
        } else {
            debug!("No config file at {}, using defaults", config_path.display());
            Config::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("STEAM_DATA_DIR") {
            self.ledger.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("STEAM_REVIEW_DIR") {
            self.reviews.review_dir = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("STEAM_MAX_RETRIES") {
            self.retry.max_retries = v.parse().map_err(|e| {
                SteamError::Config(format!("STEAM_MAX_RETRIES '{}' is invalid: {}", v, e))
            })?;
        }
        if let Ok(v) = std::env::var("STEAM_RETRY_DELAY_SECS") {
            self.retry.initial_delay_secs = v.parse().map_err(|e| {
                SteamError::Config(format!("STEAM_RETRY_DELAY_SECS '{}' is invalid: {}", v, e))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.retry.multiplier < 1.0 {
            return Err(SteamError::Config(
                "retry.multiplier must be at least 1.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(SteamError::Config("retry.jitter must be within 0..=1".into()));
        }
        if self.reviews.num_per_page == 0 || self.reviews.num_per_page > 100 {
            return Err(SteamError::Config(
                "reviews.num_per_page must be within 1..=100".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(retry: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: retry.max_retries,
            initial_delay: Duration::from_secs(retry.initial_delay_secs),
            multiplier: retry.multiplier,
            max_delay: Duration::from_secs(retry.max_delay_secs),
            jitter: retry.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.ledger.games_file, "processed_game_ids");
        assert_eq!(config.ledger.non_games_file, "processed_app_ids");
        assert_eq!(config.retry.initial_delay_secs, 300);
        assert!(config.ledger.track_unclassified);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[retry]\nmax_retries = 2\n\n[reviews]\nlanguage = \"english\"").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.reviews.language, "english");
        assert_eq!(config.reviews.num_per_page, 100);
    }

    #[test]
    fn default_policy_matches_default_config() {
        let policy = Config::default().retry_policy();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.initial_delay, Duration::from_secs(300));
        assert_eq!(policy.max_retries, 5);
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[retry]\nmultiplier = 0.5\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(SteamError::Config(_))
        ));
    }
}
