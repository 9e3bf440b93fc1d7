//! Frame-to-chunk pump feeding the audio bus.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use livecap_bus::{AudioBusSender, CHUNK_SAMPLES};
use std::time::Duration;

use crate::SAMPLE_RATE;

/// How long the pump waits on an idle frame channel before re-checking
/// the failure flag.
const IDLE_POLL: Duration = Duration::from_millis(200);

/// Accumulates capture frames into fixed-size chunks and pushes them onto
/// the audio bus with sample-derived start timestamps.
///
/// Runs on a dedicated thread (`run` blocks); the bus send itself never
/// blocks, so capture latency stays independent of the pipeline workers.
pub struct ChunkPump {
    frames: Receiver<Vec<f32>>,
    sender: AudioBusSender,
    pending: Vec<f32>,
    /// Samples already pushed onto the bus, for timestamp derivation.
    samples_sent: u64,
}

impl ChunkPump {
    pub fn new(frames: Receiver<Vec<f32>>, sender: AudioBusSender) -> Self {
        Self {
            frames,
            sender,
            pending: Vec::with_capacity(CHUNK_SAMPLES * 2),
            samples_sent: 0,
        }
    }

    /// Pump until the frame channel closes or `is_failed` reports true.
    ///
    /// Always returns `DeviceDisconnected`: a capture stream has no other
    /// way to end, and the caller uses the error to trigger the pipeline
    /// flush. Any partial trailing chunk is flushed first.
    pub fn run(mut self, is_failed: impl Fn() -> bool) -> crate::AudioError {
        loop {
            match self.frames.recv_timeout(IDLE_POLL) {
                Ok(frame) => {
                    self.pending.extend_from_slice(&frame);
                    self.drain_full_chunks();
                }
                Err(RecvTimeoutError::Timeout) => {
                    if is_failed() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.flush_partial();
        tracing::info!(
            samples_sent = self.samples_sent,
            dropped = self.sender.dropped_chunks(),
            "capture stream ended"
        );
        crate::AudioError::DeviceDisconnected
    }

    fn drain_full_chunks(&mut self) {
        while self.pending.len() >= CHUNK_SAMPLES {
            let chunk: Vec<f32> = self.pending.drain(..CHUNK_SAMPLES).collect();
            self.send_chunk(chunk);
        }
    }

    fn flush_partial(&mut self) {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            self.send_chunk(chunk);
        }
    }

    fn send_chunk(&mut self, chunk: Vec<f32>) {
        let start_ms = self.samples_sent * 1000 / SAMPLE_RATE as u64;
        let len = chunk.len() as u64;
        self.sender.send(start_ms, SAMPLE_RATE, chunk);
        self.samples_sent += len;
    }
}
