//! Transcode worker: consumes handoff messages and produces playback
//! renditions, a thumbnail, and an adaptive-streaming master playlist.
//!
//! The external codec sits behind the [`Transcoder`] trait so the
//! orchestration logic is testable without ffmpeg installed. Codec
//! invocations are bounded by one semaphore shared across all jobs.

pub mod ffmpeg;
pub mod manifest;
pub mod orchestrator;

pub use ffmpeg::{FfmpegTranscoder, Transcoder};
pub use orchestrator::{OrchestratorConfig, SessionTracker, TranscodeOrchestrator};
