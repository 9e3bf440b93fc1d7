//! Silence state tracking for the commit strategy.

use livecap_vad::SilenceDetector;

/// Tracks the current silence run over the incoming chunk stream.
///
/// All timing comes from chunk timestamps, not wall clock, so a stream
/// played faster than real time produces the same commit boundaries.
pub struct SilenceTracker {
    detector: Box<dyn SilenceDetector>,
    is_silent: bool,
    /// Start of the current silence run, None while speech is active.
    silence_started_at: Option<u64>,
}

impl SilenceTracker {
    pub fn new(detector: Box<dyn SilenceDetector>) -> Self {
        Self {
            detector,
            is_silent: true,
            silence_started_at: Some(0),
        }
    }

    /// Classify one chunk. Returns the updated silence state.
    pub fn update(&mut self, samples: &[f32], chunk_start_ms: u64) -> bool {
        let silent = self.detector.is_silent(samples);

        if silent && !self.is_silent {
            self.silence_started_at = Some(chunk_start_ms);
            tracing::trace!(at_ms = chunk_start_ms, "silence run started");
        } else if !silent {
            self.silence_started_at = None;
        }
        self.is_silent = silent;
        silent
    }

    pub fn is_silent(&self) -> bool {
        self.is_silent
    }

    /// Length of the current silence run as of `now_ms` (stream time).
    pub fn silence_duration_ms(&self, now_ms: u64) -> u64 {
        match self.silence_started_at {
            Some(start) if self.is_silent => now_ms.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.is_silent = true;
        self.silence_started_at = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecap_vad::{RmsDetector, RmsSettings};

    fn tracker() -> SilenceTracker {
        SilenceTracker::new(Box::new(RmsDetector::new(RmsSettings::default()).unwrap()))
    }

    fn speech() -> Vec<f32> {
        (0..800).map(|i| 0.2 * (i as f32 * 0.3).sin()).collect()
    }

    #[test]
    fn test_initial_state_is_silent_from_zero() {
        let tracker = tracker();
        assert!(tracker.is_silent());
        assert_eq!(tracker.silence_duration_ms(500), 500);
    }

    #[test]
    fn test_silence_run_measured_from_speech_end() {
        let mut tracker = tracker();
        tracker.update(&speech(), 0);
        assert!(!tracker.is_silent());
        assert_eq!(tracker.silence_duration_ms(50), 0);

        tracker.update(&vec![0.0; 800], 50);
        tracker.update(&vec![0.0; 800], 100);
        assert!(tracker.is_silent());
        assert_eq!(tracker.silence_duration_ms(150), 100);
    }

    #[test]
    fn test_speech_resets_run() {
        let mut tracker = tracker();
        tracker.update(&vec![0.0; 800], 0);
        tracker.update(&speech(), 50);
        tracker.update(&vec![0.0; 800], 100);
        assert_eq!(tracker.silence_duration_ms(200), 100);
    }
}
