use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Standard sample rate expected by inference backends.
pub const STT_SAMPLE_RATE: u32 = 16000;

/// Latency/accuracy trade-off for an inference call.
///
/// `Fast` backs the preview path (small model, short calls); `Quality`
/// backs the commit path. A backend must accept concurrent calls with
/// distinct profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProfile {
    Fast,
    Quality,
}

impl std::fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProfile::Fast => f.write_str("fast"),
            ModelProfile::Quality => f.write_str("quality"),
        }
    }
}

/// One inference call. Samples are shared so a request can be built from a
/// buffer snapshot without copying again.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Mono f32 PCM.
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    /// Language code, or "auto" for detection.
    pub language: String,
    /// Recently committed text supplied as a continuity hint. Empty when
    /// the caller opts out (the preview path does).
    pub context: String,
    pub profile: ModelProfile,
}

impl TranscribeRequest {
    /// Duration of the request audio in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

/// Result of one inference call.
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Transcription {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// Opaque speech-to-text backend.
///
/// The pipeline assumes no cross-call state beyond the explicit `context`
/// argument; the backend may cache models per profile however it likes.
#[async_trait::async_trait]
pub trait SpeechTranscriber: Send + Sync {
    async fn transcribe(&self, request: TranscribeRequest) -> crate::Result<Transcription>;

    /// Model identifier for a profile, for logs and status reporting.
    fn model_name(&self, profile: ModelProfile) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_duration() {
        let req = TranscribeRequest {
            samples: vec![0.0f32; 8000].into(),
            sample_rate: STT_SAMPLE_RATE,
            language: "auto".into(),
            context: String::new(),
            profile: ModelProfile::Fast,
        };
        assert_eq!(req.duration_ms(), 500);
    }

    #[test]
    fn test_profile_serde() {
        assert_eq!(
            serde_json::to_string(&ModelProfile::Quality).unwrap(),
            "\"quality\""
        );
    }
}
