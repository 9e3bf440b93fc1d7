//! Quality-profile commit worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use livecap_bus::PipelineStatus;
use livecap_stt::{ModelProfile, SpeechTranscriber, SttError, TranscribeRequest};
use livecap_transcript::{CaptionSink, Span, TranscriptEvent, TranscriptLog};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chunk_buffer::SharedChunkBuffer;
use crate::config::PipelineConfig;
use crate::context::ContextManager;
use crate::preview::PreviewShared;
use crate::strategy::CommitDecision;

/// Work item for the commit worker.
#[derive(Debug)]
pub(crate) enum CommitJob {
    Decision(CommitDecision),
    /// End-of-stream: finalize whatever remains in the buffer.
    Flush,
}

/// Result reported back to the ingest loop so the strategy engine can
/// advance (or abort) its span state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The span up to `cut_ms` was finalized and trimmed from the buffer.
    Committed { cut_ms: u64 },
    /// Nothing was finalized; the span stays open and absorbs later audio.
    Skipped,
}

/// Runs quality inference over decided spans, one at a time, and emits
/// Final events. A failed span degrades to the last preview hypothesis
/// rather than stalling the stream.
pub(crate) struct CommitWorker {
    pub buffer: SharedChunkBuffer,
    pub transcriber: Arc<dyn SpeechTranscriber>,
    pub sink: Arc<dyn CaptionSink>,
    pub shared: Arc<PreviewShared>,
    pub sequence: Arc<AtomicU64>,
    pub status: Arc<PipelineStatus>,
    pub cancel: CancellationToken,
    pub context: ContextManager,
    pub log: Option<TranscriptLog>,
    pub language: String,
    pub context_clip_chars: usize,
    pub inference_timeout: Duration,
    pub retry_limit: u32,
    pub backoff: Duration,
    pub min_commit_span_ms: u64,
}

impl CommitWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn from_config(
        config: &PipelineConfig,
        buffer: SharedChunkBuffer,
        transcriber: Arc<dyn SpeechTranscriber>,
        sink: Arc<dyn CaptionSink>,
        shared: Arc<PreviewShared>,
        sequence: Arc<AtomicU64>,
        status: Arc<PipelineStatus>,
        cancel: CancellationToken,
        log: Option<TranscriptLog>,
    ) -> Self {
        Self {
            buffer,
            transcriber,
            sink,
            shared,
            sequence,
            status,
            cancel,
            context: ContextManager::new(config.context_budget_chars),
            log,
            language: config.language.clone(),
            context_clip_chars: config.context_clip_chars,
            inference_timeout: Duration::from_millis(config.inference_timeout_ms),
            retry_limit: config.commit_retry_limit,
            backoff: Duration::from_millis(config.commit_backoff_ms),
            min_commit_span_ms: config.min_commit_span_ms,
        }
    }

    pub async fn run(
        mut self,
        mut jobs: mpsc::Receiver<CommitJob>,
        outcomes: mpsc::Sender<CommitOutcome>,
    ) {
        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let flush = matches!(job, CommitJob::Flush);
            let cut_ms = match job {
                CommitJob::Decision(decision) => decision.cut_ms,
                // Flush finalizes everything buffered at processing time.
                CommitJob::Flush => self.buffer.end_ms(),
            };

            let outcome = self.commit_span(cut_ms, flush).await;
            if outcomes.send(outcome).await.is_err() {
                break;
            }
            if flush {
                break;
            }
        }
        tracing::debug!("commit worker stopped");
    }

    async fn commit_span(&mut self, cut_ms: u64, flush: bool) -> CommitOutcome {
        let snap = self.buffer.snapshot_until(cut_ms);
        let span_ms = snap.duration_ms();
        if span_ms == 0 {
            return CommitOutcome::Skipped;
        }
        // Short spans merge into the next one mid-stream. At end-of-stream
        // there is no next span, so the flush finalizes the tail no matter
        // how short it is.
        if !flush && span_ms < self.min_commit_span_ms {
            return CommitOutcome::Skipped;
        }

        let hint = self.context.hint(self.context_clip_chars);
        let started = Instant::now();

        let mut attempt: u32 = 0;
        let text = loop {
            let request = TranscribeRequest {
                samples: snap.samples.clone(),
                sample_rate: livecap_bus::SAMPLE_RATE,
                language: self.language.clone(),
                context: hint.clone(),
                profile: ModelProfile::Quality,
            };

            let result = tokio::time::timeout(
                self.inference_timeout,
                self.transcriber.transcribe(request),
            )
            .await;

            let error = match result {
                Ok(Ok(t)) => break t.text,
                Ok(Err(SttError::InvalidAudio(detail))) => {
                    // Undecodable audio: leave the span open so it merges
                    // into the next decision instead of being emitted.
                    tracing::warn!(
                        span_start_ms = snap.start_ms,
                        cut_ms,
                        detail = %detail,
                        "skipping undecodable span"
                    );
                    return CommitOutcome::Skipped;
                }
                Ok(Err(e)) => e,
                Err(_) => SttError::Timeout(self.inference_timeout),
            };

            // Flush gets a single attempt; shutdown should not hang on a
            // struggling backend.
            if error.is_retryable() && attempt < self.retry_limit && !flush {
                attempt += 1;
                self.status.record_commit_retry();
                tracing::warn!(
                    span_start_ms = snap.start_ms,
                    attempt,
                    error = %error,
                    "commit inference failed, retrying"
                );
                tokio::time::sleep(self.backoff * attempt).await;
                continue;
            }

            tracing::error!(
                span_start_ms = snap.start_ms,
                cut_ms,
                error = %error,
                "commit inference exhausted, degrading to preview text"
            );
            self.status.record_degraded_commit();
            break self.shared.get();
        };

        let mut text = text.trim().to_string();
        // Models sometimes echo the context hint verbatim on silence-heavy
        // spans; treat that as an empty result.
        if !hint.is_empty() && text.eq_ignore_ascii_case(hint.trim()) {
            tracing::debug!(span_start_ms = snap.start_ms, "discarding echoed context");
            text.clear();
        }

        // Degraded spans count as committed too; they emitted a Final.
        self.status
            .record_commit(started.elapsed().as_millis() as u64, span_ms);

        if !text.is_empty() {
            self.context.append(&text);
            if let Some(log) = &mut self.log {
                if let Err(e) = log.append(&text) {
                    tracing::warn!(path = %log.path().display(), error = %e, "transcript log write failed");
                }
            }
        }

        self.buffer.trim(cut_ms);
        self.shared.clear();

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.sink.publish(TranscriptEvent::finalized(
            text,
            Span::new(snap.start_ms, snap.end_ms),
            seq,
        ));

        CommitOutcome::Committed { cut_ms }
    }
}
