// src/attachment/error.rs
/// Failure of a single status fetch. Never fatal to a poll session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Status request failed: {0}")]
    Request(String),

    #[error("Status service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode status response: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
