//! Generation client error types.

use thiserror::Error;

pub type GenAiResult<T> = Result<T, GenAiError>;

#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generation API returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode generation response: {0}")]
    Decode(String),

    #[error("Failed generation after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("No candidates returned from model after {attempts} attempts")]
    NoOutput { attempts: u32 },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

impl GenAiError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check if a single attempt's failure is worth retrying.
    ///
    /// Network failures, request timeouts, throttling and server errors are
    /// transient. Other client errors mean the request itself is wrong.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenAiError::Transport(_) => true,
            GenAiError::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(e: reqwest::Error) -> Self {
        // The URL can carry credentials; never echo it.
        let e = e.without_url();
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GenAiError::transport("connection reset").is_retryable());
        assert!(GenAiError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(GenAiError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(GenAiError::Http { status: 408, body: String::new() }.is_retryable());
        assert!(!GenAiError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!GenAiError::Http { status: 403, body: String::new() }.is_retryable());
        assert!(!GenAiError::decode("eof").is_retryable());
        assert!(!GenAiError::Cancelled.is_retryable());
    }
}
