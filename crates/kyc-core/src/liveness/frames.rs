//! Frame sources for video liveness.
//!
//! Container decoding is delegated to the external `ffmpeg` binary; the
//! frames it writes (or any directory of pre-extracted frames) are then
//! decoded with the `image` crate one at a time. A decoder never holds more
//! than the frame it is currently handing to its sink.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::domain::{KycError, Result};
use crate::imaging::load_image;

/// Receives decoded frames one by one. Returning an error stops decoding.
pub type FrameSink<'a> = dyn FnMut(DynamicImage) -> Result<()> + 'a;

/// Streams at most `max_frames` decoded frames, in playback order.
pub trait FrameDecoder: Send + Sync {
    /// Hand each frame to `sink` as soon as it is decoded. Returns the
    /// number of frames delivered.
    fn for_each_frame(
        &self,
        source: &Path,
        max_frames: usize,
        sink: &mut FrameSink<'_>,
    ) -> Result<usize>;
}

/// Reads every image file in a directory, sorted by file name. Files that
/// fail to decode are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDirDecoder;

impl FrameDecoder for FrameDirDecoder {
    fn for_each_frame(
        &self,
        source: &Path,
        max_frames: usize,
        sink: &mut FrameSink<'_>,
    ) -> Result<usize> {
        let entries = std::fs::read_dir(source)
            .map_err(|e| KycError::Decode(format!("{}: {e}", source.display())))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut delivered = 0;
        for path in paths {
            if delivered >= max_frames {
                break;
            }
            match load_image(&path) {
                Ok(frame) => {
                    sink(frame)?;
                    delivered += 1;
                }
                Err(err) => debug!(path = %path.display(), error = %err, "skipping undecodable frame"),
            }
        }
        Ok(delivered)
    }
}

/// Extracts frames from a video container with `ffmpeg` into a scratch
/// directory, then reads them back with [`FrameDirDecoder`].
#[derive(Debug, Clone)]
pub struct FfmpegFrameDecoder {
    program: PathBuf,
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegFrameDecoder {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn for_each_frame(
        &self,
        source: &Path,
        max_frames: usize,
        sink: &mut FrameSink<'_>,
    ) -> Result<usize> {
        if !source.is_file() {
            return Err(KycError::Decode(format!(
                "video source not found: {}",
                source.display()
            )));
        }
        let scratch = tempfile::tempdir()?;
        let pattern = scratch.path().join("frame_%06d.png");

        let output = Command::new(&self.program)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(source)
            .arg("-frames:v")
            .arg(max_frames.to_string())
            .arg(&pattern)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    KycError::EngineUnavailable(format!(
                        "{} not found: {e}",
                        self.program.display()
                    ))
                } else {
                    KycError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KycError::Decode(format!(
                "ffmpeg could not decode {}: {}",
                source.display(),
                stderr.trim()
            )));
        }

        FrameDirDecoder.for_each_frame(scratch.path(), max_frames, sink)
    }
}

/// Directories are read as frame sequences, files go through ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct AutoFrameDecoder {
    ffmpeg: FfmpegFrameDecoder,
}

impl AutoFrameDecoder {
    pub fn new(ffmpeg: FfmpegFrameDecoder) -> Self {
        Self { ffmpeg }
    }
}

impl FrameDecoder for AutoFrameDecoder {
    fn for_each_frame(
        &self,
        source: &Path,
        max_frames: usize,
        sink: &mut FrameSink<'_>,
    ) -> Result<usize> {
        if source.is_dir() {
            FrameDirDecoder.for_each_frame(source, max_frames, sink)
        } else if source.is_file() {
            self.ffmpeg.for_each_frame(source, max_frames, sink)
        } else {
            warn!(source = %source.display(), "liveness capture does not exist");
            Err(KycError::Decode(format!(
                "video source not found: {}",
                source.display()
            )))
        }
    }
}
