//! Sink-side caption state.

use crate::{EventKind, TranscriptEvent};

/// Rendering model for a caption sink.
///
/// Keeps committed lines apart from the single active preview, replaces a
/// preview with its superseding event instead of appending, and discards
/// previews that arrive out of order (a slow inference response landing
/// after a newer one).
#[derive(Debug, Default)]
pub struct CaptionState {
    committed: Vec<String>,
    preview: String,
    /// Highest sequence_id applied so far; stale events compare below it.
    last_sequence_id: u64,
}

impl CaptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns true if the displayed text changed.
    pub fn apply(&mut self, event: &TranscriptEvent) -> bool {
        if event.sequence_id <= self.last_sequence_id && self.last_sequence_id != 0 {
            return false;
        }
        self.last_sequence_id = event.sequence_id;

        match event.kind {
            EventKind::Preview => {
                self.preview = event.text.clone();
            }
            EventKind::Final => {
                // The final supersedes whatever preview covered this span.
                self.preview.clear();
                if !event.text.is_empty() {
                    self.committed.push(event.text.clone());
                }
            }
        }
        true
    }

    /// Finalized text so far.
    pub fn committed_text(&self) -> String {
        self.committed.join(" ")
    }

    /// The active (de-emphasized) preview line, empty when none.
    pub fn preview_text(&self) -> &str {
        &self.preview
    }

    /// Full display text: committed followed by the active preview.
    pub fn display_text(&self) -> String {
        let committed = self.committed_text();
        if self.preview.is_empty() {
            committed
        } else if committed.is_empty() {
            self.preview.clone()
        } else {
            format!("{} {}", committed, self.preview)
        }
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.preview.clear();
        self.last_sequence_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    fn preview(text: &str, seq: u64) -> TranscriptEvent {
        TranscriptEvent::preview(text, Span::new(0, 1000), seq)
    }

    #[test]
    fn test_preview_replaced_not_appended() {
        let mut state = CaptionState::new();
        state.apply(&preview("hel", 1));
        state.apply(&preview("hello th", 2));
        assert_eq!(state.display_text(), "hello th");
    }

    #[test]
    fn test_stale_previews_discarded() {
        let mut state = CaptionState::new();
        // Out-of-order arrival: seq 3 first, then stragglers 1 and 2.
        assert!(state.apply(&preview("third", 3)));
        assert!(!state.apply(&preview("first", 1)));
        assert!(!state.apply(&preview("second", 2)));
        assert_eq!(state.display_text(), "third");
    }

    #[test]
    fn test_final_supersedes_preview() {
        let mut state = CaptionState::new();
        state.apply(&preview("hello wor", 1));
        state.apply(&TranscriptEvent::finalized(
            "hello world.",
            Span::new(0, 1000),
            2,
        ));
        assert_eq!(state.committed_text(), "hello world.");
        assert_eq!(state.preview_text(), "");
        assert_eq!(state.display_text(), "hello world.");
    }

    #[test]
    fn test_empty_preview_clears_stale_text() {
        let mut state = CaptionState::new();
        state.apply(&preview("noise", 1));
        state.apply(&preview("", 2));
        assert_eq!(state.display_text(), "");
    }
}
