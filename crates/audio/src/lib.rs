//! Audio sources for the caption pipeline.
//!
//! Capture adapters that turn a device or file into the fixed-format
//! chunk stream the pipeline ingests: mono f32 PCM at 16kHz, pushed onto
//! the audio bus with sample-derived timestamps.

mod pump;
mod stream;
mod wav;

pub use pump::ChunkPump;
pub use stream::MicSource;
pub use wav::{pump_wav_file, read_wav_mono_f32_16k};

pub const SAMPLE_RATE: u32 = 16000;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device disconnected")]
    DeviceDisconnected,
    #[error("stream error: {0}")]
    StreamError(String),
    #[error("device error: {0}")]
    DeviceError(#[from] cpal::DevicesError),
    #[error("build stream error: {0}")]
    BuildStreamError(#[from] cpal::BuildStreamError),
}

pub type Result<T> = std::result::Result<T, AudioError>;
