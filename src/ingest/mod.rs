//! Frame ingestion sources.
//!
//! This module provides sources of decoded frames for the extraction loop:
//! - Frame directories (`png`/`jpg`/`jpeg` files, ordered by name)
//! - Local video files (feature: ingest-file-ffmpeg)
//!
//! Sources are pulled strictly in order, one frame per call. `Ok(None)` means the
//! source is exhausted. Decode failures are reported as errors and end the run.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;
use image::RgbImage;

pub use file::{FileSource, FileStats};

/// Sequential frame source contract.
pub trait FrameSource {
    /// Decode the next frame, or `None` when no frames remain.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Total number of frames, when the container reports it.
    fn frame_count(&self) -> Option<u64>;
}
