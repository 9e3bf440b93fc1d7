//! Span buffer between capture and the two inference paths.
//!
//! Uses a cursor-based approach with lazy compaction: `trim` updates the
//! logical start in O(1) and memory is only compacted once the pending
//! trim exceeds a threshold.

use std::sync::{Arc, Mutex};

/// Threshold for triggering actual memory compaction (16k samples = 1 second).
const COMPACT_THRESHOLD: usize = 16000;

/// A consistent copy of the uncommitted span (or a prefix of it).
///
/// Snapshots are immutable once taken; a later `trim` on the buffer does
/// not affect them.
#[derive(Debug, Clone)]
pub struct SpanAudio {
    pub samples: Arc<[f32]>,
    /// Stream-relative start of the copied audio, in milliseconds.
    pub start_ms: u64,
    /// Stream-relative end of the copied audio, in milliseconds.
    pub end_ms: u64,
}

impl SpanAudio {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Accumulates samples for the active span.
///
/// The logical start of the buffer is always the last commit cut point;
/// `trim` never discards audio at or after the cut it is given.
#[derive(Debug)]
pub struct ChunkBuffer {
    samples: Vec<f32>,
    /// Cursor pointing to the logical start of valid data.
    start_cursor: usize,
    /// Timestamp of the logical start (the last commit cut), in ms.
    offset_ms: u64,
    sample_rate: u32,
}

impl ChunkBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            start_cursor: 0,
            offset_ms: 0,
            sample_rate,
        }
    }

    pub fn append(&mut self, samples: &[f32]) {
        self.samples.extend_from_slice(samples);
    }

    #[inline]
    fn logical_len(&self) -> usize {
        self.samples.len() - self.start_cursor
    }

    fn ms_to_samples(&self, ms: u64) -> usize {
        (ms as usize * self.sample_rate as usize) / 1000
    }

    /// Stream-relative start of the active span (last commit cut).
    pub fn span_start_ms(&self) -> u64 {
        self.offset_ms
    }

    /// Stream-relative end of buffered audio.
    pub fn end_ms(&self) -> u64 {
        self.offset_ms + (self.logical_len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Duration of the uncommitted span in milliseconds.
    pub fn span_duration_ms(&self) -> u64 {
        self.end_ms() - self.span_start_ms()
    }

    /// Copy the whole uncommitted span.
    pub fn snapshot(&self) -> SpanAudio {
        SpanAudio {
            samples: self.samples[self.start_cursor..].into(),
            start_ms: self.offset_ms,
            end_ms: self.end_ms(),
        }
    }

    /// Copy the span up to `cut_ms` (clamped to buffered audio).
    pub fn snapshot_until(&self, cut_ms: u64) -> SpanAudio {
        let rel_ms = cut_ms.saturating_sub(self.offset_ms);
        let len = self.ms_to_samples(rel_ms).min(self.logical_len());
        let end = self.start_cursor + len;
        SpanAudio {
            samples: self.samples[self.start_cursor..end].into(),
            start_ms: self.offset_ms,
            end_ms: self.offset_ms + (len as u64 * 1000) / self.sample_rate as u64,
        }
    }

    /// Discard samples strictly before `cut_ms` and advance the span start.
    ///
    /// O(1) cursor update; memory is compacted once the cursor passes the
    /// compaction threshold. Returns the number of samples trimmed.
    pub fn trim(&mut self, cut_ms: u64) -> usize {
        let rel_ms = cut_ms.saturating_sub(self.offset_ms);
        let trim_samples = self.ms_to_samples(rel_ms).min(self.logical_len());
        if trim_samples == 0 {
            return 0;
        }

        self.start_cursor += trim_samples;
        // Re-derive the offset from the sample count so repeated trims
        // cannot accumulate rounding drift.
        self.offset_ms += (trim_samples as u64 * 1000) / self.sample_rate as u64;

        if self.start_cursor >= COMPACT_THRESHOLD {
            self.compact();
        }

        trim_samples
    }

    fn compact(&mut self) {
        if self.start_cursor > 0 {
            self.samples.drain(0..self.start_cursor);
            self.start_cursor = 0;
        }
    }

    /// Reset all state for a new stream.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.start_cursor = 0;
        self.offset_ms = 0;
    }
}

/// Shared handle over the span buffer.
///
/// The ingest task appends; the preview and commit workers snapshot and
/// trim. Critical sections are memcpy-scale, so `append` latency stays
/// independent of inference latency.
#[derive(Clone)]
pub struct SharedChunkBuffer {
    inner: Arc<Mutex<ChunkBuffer>>,
}

impl SharedChunkBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChunkBuffer::new(sample_rate))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChunkBuffer> {
        self.inner.lock().expect("chunk buffer mutex poisoned")
    }

    pub fn append(&self, samples: &[f32]) {
        self.lock().append(samples);
    }

    pub fn snapshot(&self) -> SpanAudio {
        self.lock().snapshot()
    }

    pub fn snapshot_until(&self, cut_ms: u64) -> SpanAudio {
        self.lock().snapshot_until(cut_ms)
    }

    pub fn trim(&self, cut_ms: u64) -> usize {
        self.lock().trim(cut_ms)
    }

    pub fn span_start_ms(&self) -> u64 {
        self.lock().span_start_ms()
    }

    pub fn span_duration_ms(&self) -> u64 {
        self.lock().span_duration_ms()
    }

    pub fn end_ms(&self) -> u64 {
        self.lock().end_ms()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    #[test]
    fn test_append_and_span_duration() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.0; 16000]); // 1 second
        assert_eq!(buffer.span_duration_ms(), 1000);
        assert_eq!(buffer.end_ms(), 1000);
    }

    #[test]
    fn test_snapshot_is_consistent_copy() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.25; 8000]);
        let snap = buffer.snapshot();

        buffer.append(&vec![0.5; 8000]);
        buffer.trim(500);

        // The earlier snapshot is unaffected by later mutation.
        assert_eq!(snap.samples.len(), 8000);
        assert_eq!(snap.start_ms, 0);
        assert_eq!(snap.end_ms, 500);
        assert!(snap.samples.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn test_trim_advances_span_start() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.0; 32000]); // 2 seconds

        let trimmed = buffer.trim(1000);
        assert_eq!(trimmed, 16000);
        assert_eq!(buffer.span_start_ms(), 1000);
        assert_eq!(buffer.span_duration_ms(), 1000);
        assert_eq!(buffer.end_ms(), 2000);
    }

    #[test]
    fn test_trim_never_discards_past_buffered_audio() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.0; 16000]);

        // A cut beyond the buffer end trims only what exists.
        buffer.trim(5000);
        assert_eq!(buffer.span_duration_ms(), 0);
        assert_eq!(buffer.span_start_ms(), 1000);
    }

    #[test]
    fn test_snapshot_until_clamps() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.0; 32000]); // 0..2000ms
        buffer.trim(1000);
        buffer.append(&vec![0.0; 16000]); // now 1000..3000ms

        let snap = buffer.snapshot_until(2500);
        assert_eq!(snap.start_ms, 1000);
        assert_eq!(snap.end_ms, 2500);
        assert_eq!(snap.samples.len(), 24000);

        let over = buffer.snapshot_until(10_000);
        assert_eq!(over.end_ms, 3000);
    }

    #[test]
    fn test_offset_survives_compaction() {
        let mut buffer = ChunkBuffer::new(RATE);
        buffer.append(&vec![0.0; 64000]); // 4 seconds
        buffer.trim(1500); // past COMPACT_THRESHOLD, triggers compaction
        assert_eq!(buffer.span_start_ms(), 1500);
        assert_eq!(buffer.end_ms(), 4000);

        buffer.trim(2000);
        assert_eq!(buffer.span_start_ms(), 2000);
        assert_eq!(buffer.span_duration_ms(), 2000);
    }

    #[test]
    fn test_shared_handle_concurrent_use() {
        let shared = SharedChunkBuffer::new(RATE);
        let writer = shared.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..100 {
                writer.append(&vec![0.0; 160]);
            }
        });
        for _ in 0..50 {
            let _ = shared.snapshot();
        }
        handle.join().unwrap();
        assert_eq!(shared.span_duration_ms(), 1000);
    }
}
