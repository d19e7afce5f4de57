use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Market data for an instrument or a whole tick could not be obtained.
    /// Never fatal: the tick proceeds without it.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A threshold or setting is malformed. Fatal at session start.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
