//! Audio chunk bus between capture and the caption pipeline.
//!
//! Delivers fixed-format audio from the capture thread to the pipeline's
//! ingest task with bounded buffering. The bus is lossy on overload: the
//! capture side must never block, so a full channel drops the new chunk
//! and counts it instead of applying backpressure to the device callback.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Standard pipeline sample rate (16kHz mono).
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of each audio chunk in milliseconds.
pub const CHUNK_DURATION_MS: u32 = 50;

/// Number of samples per chunk at the standard sample rate.
pub const CHUNK_SAMPLES: usize = (SAMPLE_RATE as usize * CHUNK_DURATION_MS as usize) / 1000;

/// Audio chunk with a monotonic start timestamp and sequence number.
///
/// Timestamps count milliseconds of audio since stream start (derived from
/// sample counts, never wall clock), so downstream span math is exact and
/// reproducible in tests.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic sequence number for ordering and gap detection.
    pub seq: u64,
    /// Stream-relative start timestamp in milliseconds.
    pub start_ms: u64,
    /// Sample rate of the audio data.
    pub sample_rate: u32,
    /// Audio samples (shared ownership for zero-copy hand-off).
    pub samples: Arc<[f32]>,
}

impl AudioChunk {
    pub fn new(seq: u64, start_ms: u64, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            seq,
            start_ms,
            sample_rate,
            samples: samples.into(),
        }
    }

    /// Duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Stream-relative end timestamp in milliseconds.
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms()
    }
}

/// Configuration for the audio bus.
#[derive(Debug, Clone)]
pub struct AudioBusConfig {
    /// Target buffer capacity in milliseconds.
    pub capacity_ms: u32,
    /// Expected chunk size in milliseconds (for calculating channel capacity).
    pub chunk_size_ms: u32,
}

impl Default for AudioBusConfig {
    fn default() -> Self {
        Self {
            capacity_ms: 2000,
            chunk_size_ms: CHUNK_DURATION_MS,
        }
    }
}

impl AudioBusConfig {
    fn channel_capacity(&self) -> usize {
        if self.chunk_size_ms == 0 {
            return 32;
        }
        ((self.capacity_ms / self.chunk_size_ms) as usize).max(8)
    }
}

/// Sender half of the audio bus. Lives on the capture side.
#[derive(Clone)]
pub struct AudioBusSender {
    tx: mpsc::Sender<AudioChunk>,
    seq_counter: Arc<AtomicU64>,
    dropped_chunks: Arc<AtomicU64>,
}

impl AudioBusSender {
    /// Send an audio chunk without blocking, dropping it if the bus is full.
    ///
    /// Returns true if the chunk was enqueued.
    pub fn send(&self, start_ms: u64, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> bool {
        let seq = self.seq_counter.fetch_add(1, Ordering::Relaxed);
        let chunk = AudioChunk::new(seq, start_ms, sample_rate, samples);

        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped_chunks.fetch_add(1, Ordering::Relaxed) + 1;
                // Rate-limit logging: only log every 10th drop to avoid spam
                if dropped % 10 == 1 {
                    tracing::warn!(dropped, seq, "audio bus full, dropping chunks");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("audio bus closed");
                false
            }
        }
    }

    /// Number of chunks dropped due to a full bus.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    /// Next sequence number to be assigned.
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::Relaxed)
    }
}

/// Receiver half of the audio bus. Lives on the pipeline ingest task.
pub struct AudioBusReceiver {
    rx: mpsc::Receiver<AudioChunk>,
    last_seq: Option<u64>,
    gaps_detected: u64,
}

impl AudioBusReceiver {
    /// Receive the next audio chunk. Returns None when all senders are gone.
    pub async fn recv(&mut self) -> Option<AudioChunk> {
        let chunk = self.rx.recv().await?;
        self.track_seq(&chunk);
        Some(chunk)
    }

    /// Try to receive a chunk without blocking.
    pub fn try_recv(&mut self) -> Option<AudioChunk> {
        let chunk = self.rx.try_recv().ok()?;
        self.track_seq(&chunk);
        Some(chunk)
    }

    fn track_seq(&mut self, chunk: &AudioChunk) {
        if let Some(last) = self.last_seq {
            if chunk.seq > last + 1 {
                let gap = chunk.seq - last - 1;
                self.gaps_detected += gap;
                tracing::debug!(
                    gap,
                    last_seq = last,
                    seq = chunk.seq,
                    "audio bus gap detected"
                );
            }
        }
        self.last_seq = Some(chunk.seq);
    }

    /// Number of missing chunks observed via sequence gaps.
    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected
    }
}

/// Bounded, lossy audio bus for capture-to-pipeline delivery.
pub struct AudioBus {
    sender: AudioBusSender,
    receiver: Option<AudioBusReceiver>,
}

impl AudioBus {
    pub fn new() -> Self {
        Self::with_config(AudioBusConfig::default())
    }

    pub fn with_config(config: AudioBusConfig) -> Self {
        let capacity = config.channel_capacity();
        let (tx, rx) = mpsc::channel(capacity);

        tracing::debug!(
            capacity_ms = config.capacity_ms,
            chunks = capacity,
            chunk_ms = config.chunk_size_ms,
            "created audio bus"
        );

        Self {
            sender: AudioBusSender {
                tx,
                seq_counter: Arc::new(AtomicU64::new(0)),
                dropped_chunks: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(AudioBusReceiver {
                rx,
                last_seq: None,
                gaps_detected: 0,
            }),
        }
    }

    /// Get a clone of the sender.
    pub fn sender(&self) -> AudioBusSender {
        self.sender.clone()
    }

    /// Take the receiver (can only be called once).
    pub fn take_receiver(&mut self) -> Option<AudioBusReceiver> {
        self.receiver.take()
    }
}

impl Default for AudioBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Live pipeline metrics with atomic fields for lock-free updates.
///
/// Shared via `Arc<PipelineStatus>` and written from the workers without
/// locks; a UI or log reporter reads a consistent-enough snapshot.
#[derive(Debug, Default)]
pub struct PipelineStatus {
    /// Chunks dropped on the capture side.
    dropped_chunks: AtomicU64,
    /// Missing chunks observed via sequence gaps.
    gaps_detected: AtomicU64,
    /// Total audio ingested, in milliseconds.
    audio_ingested_ms: AtomicU64,
    /// Fast-profile decodes completed.
    preview_decodes: AtomicU64,
    /// Last fast-profile inference latency in milliseconds.
    preview_latency_ms: AtomicU64,
    /// Spans finalized (including degraded commits).
    committed_spans: AtomicU64,
    /// Commit attempts past the first, across all spans.
    commit_retries: AtomicU64,
    /// Spans finalized from preview text after quality inference failed.
    degraded_commits: AtomicU64,
    /// Last quality-profile inference latency in milliseconds.
    commit_latency_ms: AtomicU64,
    /// Real-time factor of the last quality decode, stored as f32 bits.
    commit_rtf_bits: AtomicU32,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    pub fn gaps_detected(&self) -> u64 {
        self.gaps_detected.load(Ordering::Relaxed)
    }

    pub fn audio_ingested_ms(&self) -> u64 {
        self.audio_ingested_ms.load(Ordering::Relaxed)
    }

    pub fn preview_decodes(&self) -> u64 {
        self.preview_decodes.load(Ordering::Relaxed)
    }

    pub fn preview_latency_ms(&self) -> u64 {
        self.preview_latency_ms.load(Ordering::Relaxed)
    }

    pub fn committed_spans(&self) -> u64 {
        self.committed_spans.load(Ordering::Relaxed)
    }

    pub fn commit_retries(&self) -> u64 {
        self.commit_retries.load(Ordering::Relaxed)
    }

    pub fn degraded_commits(&self) -> u64 {
        self.degraded_commits.load(Ordering::Relaxed)
    }

    pub fn commit_latency_ms(&self) -> u64 {
        self.commit_latency_ms.load(Ordering::Relaxed)
    }

    pub fn commit_rtf(&self) -> f32 {
        f32::from_bits(self.commit_rtf_bits.load(Ordering::Relaxed))
    }

    pub fn set_dropped_chunks(&self, value: u64) {
        self.dropped_chunks.store(value, Ordering::Relaxed);
    }

    pub fn set_gaps_detected(&self, value: u64) {
        self.gaps_detected.store(value, Ordering::Relaxed);
    }

    pub fn add_audio_ingested_ms(&self, ms: u64) {
        self.audio_ingested_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn record_preview(&self, latency_ms: u64) {
        self.preview_decodes.fetch_add(1, Ordering::Relaxed);
        self.preview_latency_ms.store(latency_ms, Ordering::Relaxed);
    }

    pub fn record_commit(&self, latency_ms: u64, span_ms: u64) {
        self.committed_spans.fetch_add(1, Ordering::Relaxed);
        self.commit_latency_ms.store(latency_ms, Ordering::Relaxed);
        if span_ms > 0 {
            let rtf = latency_ms as f32 / span_ms as f32;
            self.commit_rtf_bits.store(rtf.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn record_commit_retry(&self) {
        self.commit_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded_commit(&self) {
        self.degraded_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Create a snapshot for serialization/display.
    pub fn snapshot(&self) -> PipelineStatusSnapshot {
        PipelineStatusSnapshot {
            dropped_chunks: self.dropped_chunks(),
            gaps_detected: self.gaps_detected(),
            audio_ingested_ms: self.audio_ingested_ms(),
            preview_decodes: self.preview_decodes(),
            preview_latency_ms: self.preview_latency_ms(),
            committed_spans: self.committed_spans(),
            commit_retries: self.commit_retries(),
            degraded_commits: self.degraded_commits(),
            commit_latency_ms: self.commit_latency_ms(),
            commit_rtf: self.commit_rtf(),
        }
    }
}

/// Snapshot of pipeline status for serialization.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PipelineStatusSnapshot {
    pub dropped_chunks: u64,
    pub gaps_detected: u64,
    pub audio_ingested_ms: u64,
    pub preview_decodes: u64,
    pub preview_latency_ms: u64,
    pub committed_spans: u64,
    pub commit_retries: u64,
    pub degraded_commits: u64,
    pub commit_latency_ms: u64,
    pub commit_rtf: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration_and_end() {
        let samples: Vec<f32> = vec![0.0; 1600]; // 100ms at 16kHz
        let chunk = AudioChunk::new(0, 250, SAMPLE_RATE, samples);
        assert_eq!(chunk.duration_ms(), 100);
        assert_eq!(chunk.end_ms(), 350);
    }

    #[test]
    fn test_bus_config_capacity() {
        let config = AudioBusConfig {
            capacity_ms: 1000,
            chunk_size_ms: 50,
        };
        assert_eq!(config.channel_capacity(), 20);
    }

    #[tokio::test]
    async fn test_send_recv() {
        let mut bus = AudioBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        let samples: Vec<f32> = vec![0.1; CHUNK_SAMPLES];
        sender.send(1000, SAMPLE_RATE, samples);

        let chunk = receiver.recv().await.unwrap();
        assert_eq!(chunk.seq, 0);
        assert_eq!(chunk.start_ms, 1000);
        assert_eq!(chunk.sample_rate, SAMPLE_RATE);
        assert_eq!(chunk.samples.len(), CHUNK_SAMPLES);
    }

    #[tokio::test]
    async fn test_sequence_monotonicity() {
        let mut bus = AudioBus::new();
        let sender = bus.sender();
        let mut receiver = bus.take_receiver().unwrap();

        for i in 0..10u64 {
            let samples: Vec<f32> = vec![0.1; CHUNK_SAMPLES];
            sender.send(i * 50, SAMPLE_RATE, samples);
        }

        let mut last_seq = None;
        for _ in 0..10 {
            let chunk = receiver.recv().await.unwrap();
            if let Some(last) = last_seq {
                assert!(chunk.seq > last, "sequence must increase");
            }
            last_seq = Some(chunk.seq);
        }
        assert_eq!(receiver.gaps_detected(), 0);
    }

    #[test]
    fn test_dropped_chunks_counted_on_overflow() {
        let mut bus = AudioBus::with_config(AudioBusConfig {
            capacity_ms: 100, // ~2 chunks
            chunk_size_ms: 50,
        });
        let sender = bus.sender();
        let _receiver = bus.take_receiver().unwrap();

        for i in 0..20u64 {
            let samples: Vec<f32> = vec![0.1; CHUNK_SAMPLES];
            sender.send(i * 50, SAMPLE_RATE, samples);
        }

        assert!(sender.dropped_chunks() > 0);
    }

    #[test]
    fn test_status_commit_accounting() {
        let status = PipelineStatus::new();
        status.record_commit(600, 3000);
        status.record_commit_retry();
        status.record_degraded_commit();

        let snap = status.snapshot();
        assert_eq!(snap.committed_spans, 1);
        assert_eq!(snap.commit_retries, 1);
        assert_eq!(snap.degraded_commits, 1);
        assert!((snap.commit_rtf - 0.2).abs() < 0.001);
    }
}
