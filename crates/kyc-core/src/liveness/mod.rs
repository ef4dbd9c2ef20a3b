//! Liveness engine.
//!
//! [`EarLivenessStrategy`] inspects the eye geometry of a single still;
//! [`MotionLivenessStrategy`] measures inter-frame motion in a short video.
//! Both are pure functions of the capture. "No face" and "not enough motion"
//! are negative results; unreadable media is an error.

pub mod ear;
pub mod frames;
pub mod motion;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{LivenessResult, Result};

pub use ear::{eye_aspect_ratio, EarLivenessStrategy, FaceLandmarks, LandmarkDetector, Point};
pub use frames::{AutoFrameDecoder, FfmpegFrameDecoder, FrameDecoder, FrameDirDecoder, FrameSink};
pub use motion::{measure_motion, MotionAccumulator, MotionLivenessStrategy, MotionSummary};

pub const NO_FACE_DETECTED: &str = "no_face_detected";
pub const EYES_TOO_NARROW: &str = "eyes_too_narrow";
pub const INSUFFICIENT_FRAMES: &str = "insufficient_frames";
pub const INSUFFICIENT_MOTION: &str = "insufficient_motion";

/// Media submitted for a liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Capture {
    /// A single selfie image.
    Still(PathBuf),
    /// A video file, or a directory of extracted frames.
    Video(PathBuf),
}

impl Capture {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Still(p) | Self::Video(p) => p,
        }
    }
}

/// Capability interface shared by the liveness strategies.
pub trait LivenessStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, capture: &Capture) -> Result<LivenessResult>;
}
