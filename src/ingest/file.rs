//! Local file frame source.
//!
//! `FileSource` picks a backend from the path:
//! - a directory is read as an ordered sequence of still images
//! - anything else is decoded as a video (requires the ingest-file-ffmpeg feature)
//!
//! Only local paths are accepted.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Directory(DirectorySource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !is_local_file_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): {}",
                path.display()
            ));
        }
        if path.is_dir() {
            return Ok(Self {
                backend: FileBackend::Directory(DirectorySource::open(path)?),
            });
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "video decoding of {} requires the ingest-file-ffmpeg feature (or pass a frame directory)",
                path.display()
            ))
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Directory(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            FileBackend::Directory(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn frame_count(&self) -> Option<u64> {
        match &self.backend {
            FileBackend::Directory(source) => Some(source.frames.len() as u64),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.frame_count(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_decoded: u64,
    pub path: PathBuf,
}

// ----------------------------------------------------------------------------
// Frame directory backend
// ----------------------------------------------------------------------------

struct DirectorySource {
    root: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl DirectorySource {
    fn open(root: &Path) -> Result<Self> {
        let mut frames = Vec::new();
        for entry in std::fs::read_dir(root)
            .with_context(|| format!("failed to list frame directory {}", root.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                frames.push(path);
            }
        }
        frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        log::info!(
            "FileSource: {} frames in {} (directory)",
            frames.len(),
            root.display()
        );
        Ok(Self {
            root: root.to_path_buf(),
            frames,
            cursor: 0,
        })
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();
        self.cursor += 1;
        Ok(Some(image))
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_decoded: self.cursor as u64,
            path: self.root.clone(),
        }
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_local_file_path(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    !raw.trim().is_empty() && !raw.contains("://")
}
