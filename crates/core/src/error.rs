use thiserror::Error;

pub type RecResult<T> = Result<T, RecError>;

#[derive(Error, Debug)]
pub enum RecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed record in {source_name} at line {line}: {reason}")]
    MalformedRecord {
        source_name: String,
        line: u64,
        reason: String,
    },

    #[error("Pipeline stage error: {0}")]
    Stage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RecError {
    pub fn malformed(source_name: impl Into<String>, line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_name: source_name.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for RecError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
