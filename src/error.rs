use crate::types::AppId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SteamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request to {url} returned status {status}")]
    Network { url: String, status: u16 },

    #[error("{what} still failing after {attempts} attempts")]
    Exhausted { what: String, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, SteamError>;

/// Failures surfaced by the classifier once its own retry loop gives up.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error(transparent)]
    Steam(#[from] SteamError),

    #[error("App {app_id} still failing after {attempts} attempts")]
    RetriesExhausted { app_id: AppId, attempts: u32 },
}
