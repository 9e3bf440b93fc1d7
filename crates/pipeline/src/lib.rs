//! Dual-model streaming transcription pipeline.
//!
//! Turns a continuous chunk stream into caption events with two inference
//! paths sharing one span buffer:
//! - the fast "preview" path decodes the uncommitted span on a cadence and
//!   publishes revisable Preview events;
//! - the slow "quality" path finalizes a span once the commit strategy
//!   engine decides its boundary, feeding committed text back into later
//!   calls as a continuity hint.
//!
//! All timing is derived from sample counts, so the pipeline behaves
//! identically on live and faster-than-real-time input.

mod chunk_buffer;
mod commit;
mod config;
mod context;
mod pipeline;
mod preview;
mod silence;
mod strategy;

pub use chunk_buffer::{ChunkBuffer, SharedChunkBuffer, SpanAudio};
pub use commit::CommitOutcome;
pub use config::PipelineConfig;
pub use context::ContextManager;
pub use pipeline::{PipelineHandle, TranscriptionPipeline};
pub use silence::SilenceTracker;
pub use strategy::{CommitDecision, CommitReason, CommitStrategyEngine, SpanPhase, SpanSignals};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Vad(#[from] livecap_vad::VadError),
    #[error(transparent)]
    Transcript(#[from] livecap_transcript::TranscriptError),
    #[error("config io: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("config parse: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
