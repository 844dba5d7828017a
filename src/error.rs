use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A mandatory input artifact is missing, unreadable or empty.
    #[error("Source '{source_name}' unavailable at {path}: {reason}")]
    SourceUnavailable {
        source_name: String,
        path: String,
        reason: String,
    },

    /// A record was linked more than once. Only a cascade bug can produce this.
    #[error("Run integrity violated: {0}")]
    RunIntegrity(String),
}

impl MergeError {
    pub fn source_unavailable(
        source_name: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        reason: impl Into<String>,
    ) -> Self {
        MergeError::SourceUnavailable {
            source_name: source_name.into(),
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
