use thiserror::Error;

pub type Result<T> = std::result::Result<T, DebtError>;

#[derive(Error, Debug)]
pub enum DebtError {
    #[error("Insufficient data: {0}")]
    DataInsufficient(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitHub API error ({status}) for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl DebtError {
    /// Errors scoped to one record: the record is excluded and the run goes on.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            DebtError::DataInsufficient(_) | DebtError::MalformedInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_scoped_kinds() {
        assert!(DebtError::DataInsufficient("stars".into()).is_record_scoped());
        assert!(DebtError::MalformedInput("created_at".into()).is_record_scoped());
        assert!(!DebtError::Configuration("cutoff".into()).is_record_scoped());
    }
}
