use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Sample error: {0}")]
    Sample(String),

    #[error("Targets error: {0}")]
    Targets(String),

    #[error("Aggregation error: {0}")]
    Aggregation(String),

    #[error("Comparison error: {0}")]
    Comparison(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Table registry error: {0}")]
    Registry(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::prelude::PolarsError> for ReconError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        ReconError::Polars(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
