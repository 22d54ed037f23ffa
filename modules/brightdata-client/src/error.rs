use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrightDataError>;

#[derive(Debug, Error)]
pub enum BrightDataError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BrightDataError {
    fn from(err: reqwest::Error) -> Self {
        BrightDataError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for BrightDataError {
    fn from(err: serde_json::Error) -> Self {
        BrightDataError::Parse(err.to_string())
    }
}
