//! Overlay Telemetry Extractor
//!
//! This crate recovers latitude, longitude and altitude that a camera burned into its
//! video frames as on-screen digits.
//!
//! # Architecture
//!
//! Each frame flows strictly downward through five stages:
//!
//! 1. **Region extraction**: fixed ROIs are cut from the frame (`frame`).
//! 2. **Multi-scale sampling**: each ROI is rescaled several times and recognized once
//!    per scale (`sampler`, `recognize`).
//! 3. **Consensus**: samples are grouped by exact text tuple; a reading is accepted only
//!    when a quorum agrees (`consensus`).
//! 4. **Decoding**: digit fields become coordinates, confidence is gated, and altitude
//!    is carried forward across frames (`decode`).
//! 5. **Orchestration**: the session loop pulls frames, enforces the frame cap, and
//!    collects records (`session`), which are persisted as text lines (`output`).
//!
//! # Module Structure
//!
//! - `config`: layered settings (defaults, TOML file, `OVERLAY_*` env)
//! - `ingest`: frame sources (frame directories, video files via ffmpeg)
//! - `recognize`: recognition engines (tesseract CLI, scripted)
//! - `shift`: coordinate offsets for published tracks

pub mod config;
pub mod consensus;
pub mod decode;
pub mod frame;
pub mod ingest;
pub mod output;
pub mod recognize;
pub mod sampler;
pub mod session;
pub mod shift;

pub use config::{EngineSettings, ExtractorConfig};
pub use consensus::{ConsensusGroup, ConsensusResolver, Reading};
pub use decode::{decode_digits, Altitude, SkipReason, TelemetryDecoder, TelemetryRecord};
pub use frame::{Frame, Roi};
pub use ingest::{FileSource, FrameSource};
pub use recognize::{Detection, Recognizer, ScriptedRecognizer, TesseractRecognizer};
pub use sampler::{MultiScaleSampler, ScaleSample};
pub use session::{
    extract, FramePipeline, FrameOutcome, FrameRecord, RunSummary, Session, SessionState, Step,
    StopReason,
};
pub use shift::CoordinateShift;
