//! Silence detection for the caption pipeline.
//!
//! The commit strategy only needs a per-chunk silent/speech classification;
//! the detection method stays behind the `SilenceDetector` trait so an
//! acoustic VAD can be substituted without touching the pipeline.

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("invalid detector settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, VadError>;

/// Per-chunk silence classification.
pub trait SilenceDetector: Send {
    /// Classify a block of mono f32 samples as silent or not.
    fn is_silent(&mut self, samples: &[f32]) -> bool;

    /// Reset any internal smoothing state.
    fn reset(&mut self);
}

/// Settings for the RMS energy detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsSettings {
    /// RMS amplitude below which a chunk counts as silent (0.0..1.0).
    pub threshold: f32,
    /// Consecutive chunks that must agree before a state flip is reported.
    /// 1 disables smoothing.
    pub smoothing_chunks: u8,
}

impl Default for RmsSettings {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            smoothing_chunks: 1,
        }
    }
}

/// RMS amplitude of a block of samples. Empty input counts as silence.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Energy-threshold silence detector with optional flip smoothing.
///
/// Smoothing keeps a single noisy chunk from toggling the silence state:
/// a flip is only reported after `smoothing_chunks` consecutive chunks
/// agree on the new state.
pub struct RmsDetector {
    settings: RmsSettings,
    current_silent: bool,
    pending_flips: u8,
}

impl RmsDetector {
    pub fn new(settings: RmsSettings) -> Result<Self> {
        if !settings.threshold.is_finite() || settings.threshold < 0.0 {
            return Err(VadError::InvalidSettings(format!(
                "threshold must be a non-negative finite value, got {}",
                settings.threshold
            )));
        }
        if settings.smoothing_chunks == 0 {
            return Err(VadError::InvalidSettings(
                "smoothing_chunks must be at least 1".into(),
            ));
        }
        Ok(Self {
            settings,
            current_silent: true,
            pending_flips: 0,
        })
    }

    pub fn settings(&self) -> RmsSettings {
        self.settings
    }
}

impl SilenceDetector for RmsDetector {
    fn is_silent(&mut self, samples: &[f32]) -> bool {
        let silent = rms(samples) < self.settings.threshold;

        if silent == self.current_silent {
            self.pending_flips = 0;
        } else {
            self.pending_flips = self.pending_flips.saturating_add(1);
            if self.pending_flips >= self.settings.smoothing_chunks {
                tracing::trace!(silent, "silence state flip");
                self.current_silent = silent;
                self.pending_flips = 0;
            }
        }

        self.current_silent
    }

    fn reset(&mut self) {
        self.current_silent = true;
        self.pending_flips = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (i as f32 * 0.3).sin())
            .collect()
    }

    #[test]
    fn test_rms_of_empty_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant() {
        let samples = vec![0.5f32; 160];
        assert!((rms(&samples) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_detects_speech_and_silence() {
        let mut det = RmsDetector::new(RmsSettings::default()).unwrap();
        assert!(det.is_silent(&vec![0.0; 800]));
        assert!(!det.is_silent(&tone(0.2, 800)));
        assert!(det.is_silent(&vec![0.0001; 800]));
    }

    #[test]
    fn test_smoothing_delays_flip() {
        let mut det = RmsDetector::new(RmsSettings {
            threshold: 0.01,
            smoothing_chunks: 2,
        })
        .unwrap();

        // Starts silent; one loud chunk is not enough to flip.
        assert!(det.is_silent(&tone(0.2, 800)));
        // Second consecutive loud chunk flips the state.
        assert!(!det.is_silent(&tone(0.2, 800)));
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(RmsDetector::new(RmsSettings {
            threshold: -1.0,
            smoothing_chunks: 1,
        })
        .is_err());
        assert!(RmsDetector::new(RmsSettings {
            threshold: 0.01,
            smoothing_chunks: 0,
        })
        .is_err());
    }
}
