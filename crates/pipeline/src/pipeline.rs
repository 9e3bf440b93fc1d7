//! Pipeline assembly and the ingest loop.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use livecap_bus::{AudioBusReceiver, PipelineStatus};
use livecap_stt::SpeechTranscriber;
use livecap_transcript::{CaptionSink, TranscriptLog};
use livecap_vad::{RmsDetector, RmsSettings};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunk_buffer::SharedChunkBuffer;
use crate::commit::{CommitJob, CommitOutcome, CommitWorker};
use crate::config::PipelineConfig;
use crate::preview::{PreviewShared, PreviewWorker};
use crate::silence::SilenceTracker;
use crate::strategy::{CommitStrategyEngine, SpanSignals};
use crate::PipelineError;

const JOB_QUEUE_DEPTH: usize = 4;

/// Running dual-model transcription pipeline.
///
/// `spawn` wires three tokio tasks around a shared chunk buffer:
/// - ingest: drains the audio bus, tracks silence, runs the commit
///   strategy engine and applies commit outcomes,
/// - preview: periodic fast-profile decode of the uncommitted span,
/// - commit: serialized quality-profile decode of decided spans.
pub struct TranscriptionPipeline;

impl TranscriptionPipeline {
    pub fn spawn(
        config: PipelineConfig,
        transcriber: Arc<dyn SpeechTranscriber>,
        receiver: AudioBusReceiver,
        sink: Arc<dyn CaptionSink>,
    ) -> Result<PipelineHandle, PipelineError> {
        config.validate()?;

        let detector = RmsDetector::new(RmsSettings {
            threshold: config.silence_rms_threshold,
            ..RmsSettings::default()
        })?;

        let log = match &config.transcript_log {
            Some(path) => Some(TranscriptLog::open(path)?),
            None => None,
        };

        let buffer = SharedChunkBuffer::new(livecap_bus::SAMPLE_RATE);
        let shared = Arc::new(PreviewShared::default());
        let sequence = Arc::new(AtomicU64::new(0));
        let status = Arc::new(PipelineStatus::new());
        let cancel = CancellationToken::new();

        let (jobs_tx, jobs_rx) = mpsc::channel::<CommitJob>(JOB_QUEUE_DEPTH);
        let (outcome_tx, outcome_rx) = mpsc::channel::<CommitOutcome>(JOB_QUEUE_DEPTH);

        let preview = PreviewWorker::from_config(
            &config,
            buffer.clone(),
            transcriber.clone(),
            sink.clone(),
            shared.clone(),
            sequence.clone(),
            status.clone(),
            cancel.clone(),
        );
        let preview_task = tokio::spawn(preview.run());

        let commit = CommitWorker::from_config(
            &config,
            buffer.clone(),
            transcriber,
            sink,
            shared.clone(),
            sequence,
            status.clone(),
            cancel.clone(),
            log,
        );
        let commit_task = tokio::spawn(commit.run(jobs_rx, outcome_tx));

        let ingest = IngestLoop {
            receiver,
            buffer,
            shared,
            silence: SilenceTracker::new(Box::new(detector)),
            engine: CommitStrategyEngine::new(&config),
            status: status.clone(),
            cancel: cancel.clone(),
            jobs_tx,
            outcome_rx,
        };
        let ingest_task = tokio::spawn(ingest.run());

        Ok(PipelineHandle {
            cancel,
            status,
            ingest_task,
            preview_task,
            commit_task,
        })
    }
}

/// Handle to a spawned pipeline.
pub struct PipelineHandle {
    cancel: CancellationToken,
    status: Arc<PipelineStatus>,
    ingest_task: JoinHandle<()>,
    preview_task: JoinHandle<()>,
    commit_task: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn status(&self) -> &Arc<PipelineStatus> {
        &self.status
    }

    /// Wait for the pipeline to drain after the audio source closed.
    ///
    /// The ingest task ends once the bus is closed and the final flush
    /// commit lands; the workers are cancelled afterwards.
    pub async fn join(self) {
        let _ = self.ingest_task.await;
        self.cancel.cancel();
        let _ = self.preview_task.await;
        let _ = self.commit_task.await;
    }

    /// Abort immediately without flushing buffered audio.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.ingest_task.await;
        let _ = self.preview_task.await;
        let _ = self.commit_task.await;
    }
}

struct IngestLoop {
    receiver: AudioBusReceiver,
    buffer: SharedChunkBuffer,
    shared: Arc<PreviewShared>,
    silence: SilenceTracker,
    engine: CommitStrategyEngine,
    status: Arc<PipelineStatus>,
    cancel: CancellationToken,
    jobs_tx: mpsc::Sender<CommitJob>,
    outcome_rx: mpsc::Receiver<CommitOutcome>,
}

impl IngestLoop {
    async fn run(mut self) {
        let mut span_has_speech = false;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                outcome = self.outcome_rx.recv() => {
                    let Some(outcome) = outcome else { return };
                    match outcome {
                        CommitOutcome::Committed { cut_ms } => {
                            self.engine.complete(cut_ms);
                            self.engine.advance();
                            span_has_speech = false;
                        }
                        CommitOutcome::Skipped => self.engine.abort(),
                    }
                }
                chunk = self.receiver.recv() => {
                    let Some(chunk) = chunk else { break };
                    self.buffer.append(&chunk.samples);
                    self.status.add_audio_ingested_ms(chunk.duration_ms());
                    self.status.set_gaps_detected(self.receiver.gaps_detected());

                    let silent = self.silence.update(&chunk.samples, chunk.start_ms);
                    if !silent {
                        span_has_speech = true;
                    }

                    let buffer_end_ms = self.buffer.end_ms();
                    let preview_text = self.shared.get();
                    let signals = SpanSignals {
                        preview_text: &preview_text,
                        silence_ms: self.silence.silence_duration_ms(chunk.end_ms()),
                        has_speech: span_has_speech,
                        buffer_end_ms,
                    };

                    if let Some(decision) = self.engine.evaluate(&signals) {
                        if self.jobs_tx.try_send(CommitJob::Decision(decision)).is_err() {
                            // Commit worker backlogged or gone; re-open the
                            // span so the audio is not stranded.
                            tracing::warn!(cut_ms = decision.cut_ms, "commit queue full, deferring");
                            self.engine.abort();
                        }
                    }
                }
            }
        }

        // Source closed: finalize what remains, then wait for the outcome
        // so callers observe a fully drained stream after join().
        if self.jobs_tx.send(CommitJob::Flush).await.is_ok() {
            // An earlier decision may still be in flight; drain outcomes
            // until the worker exits after the flush.
            while self.outcome_rx.recv().await.is_some() {}
        }
        tracing::debug!("ingest loop stopped");
    }
}
