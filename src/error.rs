use thiserror::Error;

/// Errors that can occur in the capture pipeline
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Detection request failed: {0}")]
    Network(String),

    #[error("Unexpected detection response: {0}")]
    Protocol(String),
}
