//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable configuration passed into each component at construction.
///
/// Loaded once (typically from `config.json`), never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input device identifier, None for the host default.
    pub device: Option<String>,
    /// Model identifier for the fast (preview) profile.
    pub fast_model: String,
    /// Model identifier for the quality (commit) profile.
    pub quality_model: String,
    /// Language code, or "auto" for detection.
    pub language: String,

    /// Cadence of fast-profile decodes, in wall-clock milliseconds.
    pub preview_interval_ms: u64,
    /// Minimum uncommitted audio before the preview path decodes at all.
    pub min_span_ms: u64,

    /// RMS amplitude below which a chunk counts as silent.
    pub silence_rms_threshold: f32,
    /// Silence required alongside a sentence-terminal preview before a
    /// boundary commit fires.
    pub min_silence_ms: u64,
    /// Continuous silence after which a span commits without punctuation.
    pub silence_timeout_ms: u64,
    /// Hard span cap; a forced cut fires here regardless of boundaries.
    pub max_span_ms: u64,
    /// Characters that terminate a sentence for boundary detection.
    pub sentence_terminals: Vec<char>,

    /// Total character budget of the committed-text context window.
    pub context_budget_chars: usize,
    /// Tail of the window actually sent with each quality call.
    pub context_clip_chars: usize,

    /// Upper bound on a single inference call before it counts as a
    /// timeout failure.
    pub inference_timeout_ms: u64,
    /// Retries for a retryable commit failure before degrading.
    pub commit_retry_limit: u32,
    /// Base backoff between commit retries (linear: base * attempt).
    pub commit_backoff_ms: u64,
    /// Spans shorter than this are skipped and merged into the next one.
    /// The end-of-stream flush ignores this and finalizes any remainder.
    pub min_commit_span_ms: u64,

    /// Append finalized lines to this file when set.
    pub transcript_log: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            device: None,
            fast_model: "whisper-tiny".into(),
            quality_model: "whisper-small".into(),
            language: "auto".into(),
            preview_interval_ms: 500,
            min_span_ms: 1000,
            silence_rms_threshold: 0.01,
            min_silence_ms: 400,
            silence_timeout_ms: 1200,
            max_span_ms: 15_000,
            sentence_terminals: vec!['.', '!', '?', '…', '。', '！', '？'],
            context_budget_chars: 1000,
            context_clip_chars: 200,
            inference_timeout_ms: 10_000,
            commit_retry_limit: 2,
            commit_backoff_ms: 250,
            min_commit_span_ms: 200,
            transcript_log: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_span_ms == 0 {
            return Err(crate::PipelineError::InvalidConfig(
                "max_span_ms must be positive".into(),
            ));
        }
        if self.silence_timeout_ms >= self.max_span_ms {
            return Err(crate::PipelineError::InvalidConfig(format!(
                "silence_timeout_ms ({}) must be below max_span_ms ({})",
                self.silence_timeout_ms, self.max_span_ms
            )));
        }
        if self.min_silence_ms > self.silence_timeout_ms {
            return Err(crate::PipelineError::InvalidConfig(format!(
                "min_silence_ms ({}) must not exceed silence_timeout_ms ({})",
                self.min_silence_ms, self.silence_timeout_ms
            )));
        }
        if self.sentence_terminals.is_empty() {
            return Err(crate::PipelineError::InvalidConfig(
                "sentence_terminals must not be empty".into(),
            ));
        }
        if self.context_clip_chars > self.context_budget_chars {
            return Err(crate::PipelineError::InvalidConfig(format!(
                "context_clip_chars ({}) must not exceed context_budget_chars ({})",
                self.context_clip_chars, self.context_budget_chars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = PipelineConfig {
            silence_timeout_ms: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = std::env::temp_dir().join(format!("livecap-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = PipelineConfig::default();
        config.language = "es".into();
        config.device = Some("BlackHole 2ch".into());
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.language, "es");
        assert_eq!(loaded.device.as_deref(), Some("BlackHole 2ch"));
        assert_eq!(loaded.max_span_ms, 15_000);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"language": "ca"}"#).unwrap();
        assert_eq!(config.language, "ca");
        assert_eq!(config.silence_timeout_ms, 1200);
    }
}
