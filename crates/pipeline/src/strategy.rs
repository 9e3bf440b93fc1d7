//! Commit strategy: when does preview text become final text.
//!
//! Formalized as a state machine over one span at a time. The engine only
//! evaluates signals already produced elsewhere (preview text, silence
//! run, span length); it never calls inference itself.

use crate::config::PipelineConfig;

/// Why a span is being finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitReason {
    /// Preview ended on terminal punctuation and a short silence followed.
    SentenceBoundary,
    /// Continuous silence exceeded the timeout; catches trailing clauses
    /// with no punctuation.
    SilenceTimeout,
    /// Hard span cap reached; bounds worst-case latency and memory.
    MaxDurationExceeded,
}

/// A single finalization order. Produced once per span, consumed exactly
/// once by the commit worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitDecision {
    pub reason: CommitReason,
    /// Stream-relative cut point; audio before it belongs to this span.
    pub cut_ms: u64,
}

/// Lifecycle of the active span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanPhase {
    /// Audio is accumulating; triggers are being evaluated.
    Accumulating,
    /// A decision is out; no further decision may be emitted. This is the
    /// admission control that keeps at most one commit in flight.
    PendingCommit,
    /// The commit landed; the engine is about to advance to the next span.
    Committed,
}

/// Signals evaluated on each chunk arrival.
#[derive(Debug, Clone)]
pub struct SpanSignals<'a> {
    /// Latest preview hypothesis for the uncommitted span.
    pub preview_text: &'a str,
    /// Length of the current silence run, in stream milliseconds.
    pub silence_ms: u64,
    /// Whether any speech was observed inside the active span.
    pub has_speech: bool,
    /// Stream-relative end of buffered audio.
    pub buffer_end_ms: u64,
}

/// State machine deciding span boundaries.
pub struct CommitStrategyEngine {
    phase: SpanPhase,
    span_start_ms: u64,
    min_silence_ms: u64,
    silence_timeout_ms: u64,
    max_span_ms: u64,
    sentence_terminals: Vec<char>,
}

impl CommitStrategyEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            phase: SpanPhase::Accumulating,
            span_start_ms: 0,
            min_silence_ms: config.min_silence_ms,
            silence_timeout_ms: config.silence_timeout_ms,
            max_span_ms: config.max_span_ms,
            sentence_terminals: config.sentence_terminals.clone(),
        }
    }

    pub fn phase(&self) -> SpanPhase {
        self.phase
    }

    pub fn span_start_ms(&self) -> u64 {
        self.span_start_ms
    }

    fn ends_on_terminal(&self, text: &str) -> bool {
        text.trim_end()
            .chars()
            .next_back()
            .map(|c| self.sentence_terminals.contains(&c))
            .unwrap_or(false)
    }

    /// Evaluate the triggers against the current signals.
    ///
    /// Emits at most one decision per span; once a decision is out the
    /// engine stays in `PendingCommit` until the outcome arrives.
    ///
    /// Tie-break when several triggers fire on the same chunk:
    /// `MaxDurationExceeded` first (worst-case latency bound), then
    /// `SentenceBoundary` (better textual boundary), then
    /// `SilenceTimeout`.
    pub fn evaluate(&mut self, signals: &SpanSignals<'_>) -> Option<CommitDecision> {
        if self.phase != SpanPhase::Accumulating {
            return None;
        }

        let span_ms = signals.buffer_end_ms.saturating_sub(self.span_start_ms);

        let decision = if span_ms >= self.max_span_ms {
            // Forced cut lands exactly at the cap, not at the chunk edge
            // that happened to cross it.
            Some(CommitDecision {
                reason: CommitReason::MaxDurationExceeded,
                cut_ms: self.span_start_ms + self.max_span_ms,
            })
        } else if signals.has_speech
            && self.ends_on_terminal(signals.preview_text)
            && signals.silence_ms >= self.min_silence_ms
        {
            Some(CommitDecision {
                reason: CommitReason::SentenceBoundary,
                cut_ms: signals.buffer_end_ms,
            })
        } else if signals.has_speech && signals.silence_ms >= self.silence_timeout_ms {
            Some(CommitDecision {
                reason: CommitReason::SilenceTimeout,
                cut_ms: signals.buffer_end_ms,
            })
        } else {
            None
        };

        if let Some(decision) = decision {
            tracing::debug!(
                reason = ?decision.reason,
                cut_ms = decision.cut_ms,
                span_ms,
                "commit decision"
            );
            self.phase = SpanPhase::PendingCommit;
        }

        decision
    }

    /// The commit worker finalized the span (possibly degraded).
    pub fn complete(&mut self, cut_ms: u64) {
        debug_assert_eq!(self.phase, SpanPhase::PendingCommit);
        self.phase = SpanPhase::Committed;
        self.span_start_ms = cut_ms;
    }

    /// Start accumulating the next span at the committed cut.
    pub fn advance(&mut self) {
        debug_assert_eq!(self.phase, SpanPhase::Committed);
        self.phase = SpanPhase::Accumulating;
    }

    /// The commit was skipped (invalid/too-short audio): return to
    /// accumulation without advancing, merging the span into the next.
    pub fn abort(&mut self) {
        tracing::debug!(span_start_ms = self.span_start_ms, "commit aborted");
        self.phase = SpanPhase::Accumulating;
    }
}
