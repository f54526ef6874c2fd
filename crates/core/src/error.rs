use thiserror::Error;

pub type InsightResult<T> = Result<T, InsightError>;

#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tabular store error: {0}")]
    Store(String),

    #[error("Tabular store timed out after {0} ms")]
    Timeout(u64),

    #[error("Malformed response for {template}: {reason}")]
    MalformedResponse { template: String, reason: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Export error: {0}")]
    Export(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for InsightError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
