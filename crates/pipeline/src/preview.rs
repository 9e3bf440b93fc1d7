//! Fast-profile preview worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use livecap_bus::PipelineStatus;
use livecap_stt::{ModelProfile, SpeechTranscriber, TranscribeRequest};
use livecap_transcript::{CaptionSink, Span, TranscriptEvent};
use livecap_vad::rms;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::chunk_buffer::SharedChunkBuffer;
use crate::config::PipelineConfig;

/// Latest preview hypothesis, shared with the strategy engine (boundary
/// detection) and the commit worker (degraded fallback).
#[derive(Debug, Default)]
pub(crate) struct PreviewShared {
    text: Mutex<String>,
}

impl PreviewShared {
    pub fn get(&self) -> String {
        self.text.lock().expect("preview mutex poisoned").clone()
    }

    pub fn set(&self, text: &str) {
        *self.text.lock().expect("preview mutex poisoned") = text.to_string();
    }

    pub fn clear(&self) {
        self.text.lock().expect("preview mutex poisoned").clear();
    }
}

/// Decodes the uncommitted span with the fast profile on a fixed cadence
/// and publishes revisable Preview events.
///
/// At most one inference call is outstanding: the loop awaits each call,
/// and ticks missed during a slow call are skipped (newest-wins). Preview
/// calls deliberately carry no context hint; locality beats continuity at
/// this latency budget.
pub(crate) struct PreviewWorker {
    pub buffer: SharedChunkBuffer,
    pub transcriber: Arc<dyn SpeechTranscriber>,
    pub sink: Arc<dyn CaptionSink>,
    pub shared: Arc<PreviewShared>,
    pub sequence: Arc<AtomicU64>,
    pub status: Arc<PipelineStatus>,
    pub cancel: CancellationToken,
    pub language: String,
    pub preview_interval: Duration,
    pub min_span_ms: u64,
    pub silence_rms_threshold: f32,
    pub inference_timeout: Duration,
}

impl PreviewWorker {
    pub fn from_config(
        config: &PipelineConfig,
        buffer: SharedChunkBuffer,
        transcriber: Arc<dyn SpeechTranscriber>,
        sink: Arc<dyn CaptionSink>,
        shared: Arc<PreviewShared>,
        sequence: Arc<AtomicU64>,
        status: Arc<PipelineStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            buffer,
            transcriber,
            sink,
            shared,
            sequence,
            status,
            cancel,
            language: config.language.clone(),
            preview_interval: Duration::from_millis(config.preview_interval_ms),
            min_span_ms: config.min_span_ms,
            silence_rms_threshold: config.silence_rms_threshold,
            inference_timeout: Duration::from_millis(config.inference_timeout_ms),
        }
    }

    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.preview_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            self.decode_once().await;
        }
        tracing::debug!("preview worker stopped");
    }

    async fn decode_once(&self) {
        let snap = self.buffer.snapshot();
        if snap.duration_ms() < self.min_span_ms {
            return;
        }

        // A fully silent span has no hypothesis; publish an empty preview
        // once so stale caption text does not linger on screen.
        if rms(&snap.samples) < self.silence_rms_threshold {
            if !self.shared.get().is_empty() {
                self.shared.clear();
                self.publish("", snap.start_ms, snap.end_ms);
            }
            return;
        }

        let request = TranscribeRequest {
            samples: snap.samples.clone(),
            sample_rate: livecap_bus::SAMPLE_RATE,
            language: self.language.clone(),
            context: String::new(),
            profile: ModelProfile::Fast,
        };

        let started = Instant::now();
        let result = tokio::time::timeout(
            self.inference_timeout,
            self.transcriber.transcribe(request),
        )
        .await;

        let transcription = match result {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => {
                // Non-fatal for preview: skip this tick.
                tracing::warn!(
                    span_start_ms = snap.start_ms,
                    span_end_ms = snap.end_ms,
                    error = %e,
                    "preview inference failed"
                );
                return;
            }
            Err(_) => {
                tracing::warn!(
                    span_start_ms = snap.start_ms,
                    timeout_ms = self.inference_timeout.as_millis() as u64,
                    "preview inference timed out"
                );
                return;
            }
        };

        // Stale-guard: a commit landed while the call was in flight, so
        // this hypothesis describes audio that is partly finalized.
        if self.buffer.span_start_ms() != snap.start_ms {
            tracing::debug!(
                snapshot_start_ms = snap.start_ms,
                span_start_ms = self.buffer.span_start_ms(),
                "dropping stale preview"
            );
            return;
        }

        self.status
            .record_preview(started.elapsed().as_millis() as u64);

        let text = transcription.text.trim().to_string();
        self.shared.set(&text);
        self.publish(&text, snap.start_ms, snap.end_ms);
    }

    fn publish(&self, text: &str, start_ms: u64, end_ms: u64) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.sink.publish(TranscriptEvent::preview(
            text,
            Span::new(start_ms, end_ms),
            seq,
        ));
    }
}
