//! Frontal face detection with the SeetaFace funnel cascade (`rustface`).
//!
//! The cascade weights are not bundled. Point `face.detector_model` (or
//! `KYC_FACE_DETECTOR_MODEL`) at `seeta_fd_frontal_v1.0.bin`.

use std::io::Cursor;
use std::path::Path;

use image::DynamicImage;
use rustface::{Detector, ImageData};

use super::FaceDetector;
use crate::domain::{KycError, Result};
use crate::imaging::BoundingBox;

/// The cascade rejects smaller minimum sizes.
pub const MIN_FACE_SIZE: u32 = 20;

/// [`FaceDetector`] backed by a SeetaFace cascade file.
///
/// The model is read once at construction. A model that failed to load is
/// reported as `EngineUnavailable` on every call. `rustface` detectors are
/// stateful and not `Sync`, so each call builds its own from the cached
/// model bytes.
#[derive(Debug, Clone)]
pub struct SeetaFaceDetector {
    model: std::result::Result<Vec<u8>, String>,
    min_face_size: u32,
    score_threshold: f64,
}

impl SeetaFaceDetector {
    pub fn load(path: &Path, min_face_size: u32) -> Self {
        let model = std::fs::read(path)
            .map_err(KycError::from)
            .and_then(|bytes| {
                rustface::read_model(Cursor::new(&bytes)).map_err(malformed)?;
                Ok(bytes)
            })
            .map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "face detector unavailable");
                format!("cannot load face detector model {}: {e}", path.display())
            });
        Self {
            model,
            min_face_size: min_face_size.max(MIN_FACE_SIZE),
            score_threshold: 2.0,
        }
    }

    /// Cascade score a window needs to count as a face.
    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn model_bytes(&self) -> Result<&[u8]> {
        self.model
            .as_deref()
            .map_err(|reason| KycError::EngineUnavailable(reason.clone()))
    }
}

fn malformed(err: std::io::Error) -> KycError {
    KycError::EngineUnavailable(format!("malformed face detector model: {err}"))
}

/// Convert a detection (which may start off-frame) into image coordinates.
fn to_bounding_box(x: i32, y: i32, width: u32, height: u32) -> Option<BoundingBox> {
    let right = i64::from(x) + i64::from(width);
    let bottom = i64::from(y) + i64::from(height);
    let (left, top) = (i64::from(x).max(0), i64::from(y).max(0));
    if right <= left || bottom <= top {
        return None;
    }
    Some(BoundingBox::new(
        left as u32,
        top as u32,
        (right - left) as u32,
        (bottom - top) as u32,
    ))
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>> {
        let model = rustface::read_model(Cursor::new(self.model_bytes()?)).map_err(malformed)?;

        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        if width < self.min_face_size || height < self.min_face_size {
            return Ok(Vec::new());
        }

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let mut data = ImageData::new(gray.as_raw(), width, height);
        let faces: Vec<BoundingBox> = detector
            .detect(&mut data)
            .iter()
            .filter_map(|face| {
                let bbox = face.bbox();
                to_bounding_box(bbox.x(), bbox.y(), bbox.width(), bbox.height())
            })
            .collect();
        tracing::debug!(faces = faces.len(), width, height, "seeta detection");
        Ok(faces)
    }
}
