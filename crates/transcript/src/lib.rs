//! Transcript event contracts shared between the pipeline and caption UIs.
//!
//! Defines the wire types a caption sink consumes, the sink-side state
//! model that replaces previews without duplicating text, and the
//! persistent transcript record/log.

mod log;
mod state;

pub use log::TranscriptLog;
pub use state::CaptionState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contiguous region of audio bounded by two commit cut points,
/// stream-relative milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Span {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Whether an event text is still revisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Low-latency hypothesis for a still-growing span; superseded by
    /// later events for overlapping spans.
    Preview,
    /// High-accuracy text for a closed span; never revised.
    Final,
}

/// One caption update.
///
/// `sequence_id` increases strictly across the event stream; sinks must
/// drop a Preview whose sequence_id is lower than the last one seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub kind: EventKind,
    pub span: Span,
    pub sequence_id: u64,
}

impl TranscriptEvent {
    pub fn preview(text: impl Into<String>, span: Span, sequence_id: u64) -> Self {
        Self {
            text: text.into(),
            kind: EventKind::Preview,
            span,
            sequence_id,
        }
    }

    pub fn finalized(text: impl Into<String>, span: Span, sequence_id: u64) -> Self {
        Self {
            text: text.into(),
            kind: EventKind::Final,
            span,
            sequence_id,
        }
    }

    pub fn is_final(&self) -> bool {
        self.kind == EventKind::Final
    }
}

/// Consumer of the ordered caption event stream.
///
/// Implementations must render Preview distinctly from Final and replace
/// a Preview with its superseding event rather than appending; the
/// `CaptionState` helper implements that policy.
pub trait CaptionSink: Send + Sync {
    fn publish(&self, event: TranscriptEvent);
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("transcript log io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TranscriptError>;

/// A finalized caption line within a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: Uuid,
    pub text: String,
    pub span: Span,
}

/// A whole captioning session, exportable as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: Uuid,
    pub title: Option<String>,
    pub lines: Vec<Line>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: None,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a Final event. Preview events are ignored.
    pub fn push_final(&mut self, event: &TranscriptEvent) {
        if !event.is_final() || event.text.is_empty() {
            return;
        }
        self.lines.push(Line {
            id: Uuid::new_v4(),
            text: event.text.clone(),
            span: event.span,
        });
        self.updated_at = Utc::now();
    }

    pub fn full_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
