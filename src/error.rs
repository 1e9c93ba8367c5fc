use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlimmingError {
    #[error("API key is blank")]
    BlankCredential,

    #[error("Authorization rejected: {0}")]
    Auth(String),

    #[error("Compression service unavailable: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("Background task failed: {0}")]
    Worker(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SlimmingError {
    /// True for failures that mean the active key was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, SlimmingError::Auth(_))
    }

    /// Transport failures are worth retrying without changing the key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SlimmingError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, SlimmingError>;
