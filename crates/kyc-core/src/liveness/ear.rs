//! Eye-aspect-ratio liveness for still images.
//!
//! A printed photo held up to the camera tends to show eyes that are
//! abnormally narrow relative to their width. The ratio is averaged over
//! both eyes and must exceed the threshold for the capture to count as live.

use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use super::{Capture, LivenessStrategy, EYES_TOO_NARROW, NO_FACE_DETECTED};
use crate::domain::{KycError, LivenessResult, Result};
use crate::imaging::load_image;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Mesh indices for each eye: outer corner, two lid points, inner corner.
const LEFT_EYE_MESH: [usize; 4] = [33, 160, 158, 133];
const RIGHT_EYE_MESH: [usize; 4] = [362, 385, 387, 263];

/// Eye landmarks in pixel coordinates. Each eye is
/// `[corner, lid, lid, corner]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: [Point; 4],
    pub right_eye: [Point; 4],
}

impl FaceLandmarks {
    /// Pick both eyes out of a 468-point face mesh.
    pub fn from_mesh(mesh: &[Point]) -> Option<Self> {
        let pick = |idx: [usize; 4]| -> Option<[Point; 4]> {
            Some([
                *mesh.get(idx[0])?,
                *mesh.get(idx[1])?,
                *mesh.get(idx[2])?,
                *mesh.get(idx[3])?,
            ])
        };
        Some(Self {
            left_eye: pick(LEFT_EYE_MESH)?,
            right_eye: pick(RIGHT_EYE_MESH)?,
        })
    }

    /// Mean of both eyes' aspect ratios. `None` when an eye has zero width.
    pub fn mean_ear(&self) -> Option<f64> {
        Some((eye_aspect_ratio(&self.left_eye)? + eye_aspect_ratio(&self.right_eye)?) / 2.0)
    }
}

/// Lid-to-lid distance over corner-to-corner distance.
pub fn eye_aspect_ratio(eye: &[Point; 4]) -> Option<f64> {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f64::EPSILON {
        return None;
    }
    Some(eye[1].distance(&eye[2]) / horizontal)
}

/// Locates facial landmarks in a still image. `Ok(None)` means no face.
pub trait LandmarkDetector: Send + Sync {
    fn locate(&self, image: &DynamicImage) -> Result<Option<FaceLandmarks>>;
}

pub struct EarLivenessStrategy {
    detector: Option<Arc<dyn LandmarkDetector>>,
    threshold: f64,
}

impl EarLivenessStrategy {
    pub fn new(detector: Option<Arc<dyn LandmarkDetector>>, threshold: f64) -> Self {
        Self {
            detector,
            threshold,
        }
    }

    /// Decide from already located landmarks.
    pub fn check_landmarks(&self, landmarks: Option<&FaceLandmarks>) -> LivenessResult {
        let Some(ear) = landmarks.and_then(FaceLandmarks::mean_ear) else {
            return LivenessResult {
                live: false,
                metric: 0.0,
                reason: Some(NO_FACE_DETECTED.to_string()),
            };
        };
        let live = ear > self.threshold;
        LivenessResult {
            live,
            metric: ear,
            reason: (!live).then(|| EYES_TOO_NARROW.to_string()),
        }
    }

    pub fn check_image(&self, image: &DynamicImage) -> Result<LivenessResult> {
        let detector = self.detector.as_deref().ok_or_else(|| {
            KycError::EngineUnavailable("eye-aspect-ratio strategy has no landmark detector".to_string())
        })?;
        let landmarks = detector.locate(image)?;
        Ok(self.check_landmarks(landmarks.as_ref()))
    }
}

impl LivenessStrategy for EarLivenessStrategy {
    fn name(&self) -> &'static str {
        "eye_aspect_ratio"
    }

    fn check(&self, capture: &Capture) -> Result<LivenessResult> {
        match capture {
            Capture::Still(path) => {
                if self.detector.is_none() {
                    return Err(KycError::EngineUnavailable(
                        "eye-aspect-ratio strategy has no landmark detector".to_string(),
                    ));
                }
                self.check_image(&load_image(path)?)
            }
            Capture::Video(_) => Err(KycError::Validation(
                "eye-aspect-ratio liveness needs a still image".to_string(),
            )),
        }
    }
}
