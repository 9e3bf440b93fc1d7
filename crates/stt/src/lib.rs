mod engine;

pub use engine::{
    ModelProfile, SpeechTranscriber, TranscribeRequest, Transcription, STT_SAMPLE_RATE,
};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SttError {
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
}

impl SttError {
    /// Whether a commit-path call may be retried against the same span.
    ///
    /// Timeouts are transient. An unavailable model will not recover within
    /// a retry budget, and invalid audio will stay invalid.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SttError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, SttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(SttError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!SttError::ModelUnavailable("quality".into()).is_retryable());
        assert!(!SttError::InvalidAudio("empty span".into()).is_retryable());
    }
}
