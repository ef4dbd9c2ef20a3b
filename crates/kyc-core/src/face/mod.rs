//! Face similarity engine.
//!
//! Two interchangeable strategies sit behind [`FaceSimilarityStrategy`]:
//! - [`EmbeddingDistanceStrategy`]: distance between learned embeddings
//!   (score is a distance, smaller means more similar).
//! - [`LocalPatternStrategy`]: LBPH texture classifier trained on the
//!   reference face (score is a similarity in 0..=100).
//!
//! Both locate faces through a [`FaceDetector`] and keep only the dominant
//! (largest-area) region of each image. [`SeetaFaceDetector`] is the
//! bundled detector; embedders are supplied by the embedding application. Not finding a face is a negative
//! result; a missing detector or embedder is `EngineUnavailable`.

pub mod embedding;
pub mod lbph;
pub mod local_pattern;
pub mod seeta;

use std::path::Path;

use image::DynamicImage;

use crate::domain::{FaceMatchResult, Result};
use crate::imaging::{load_image, BoundingBox};

pub use embedding::{distance, EmbeddingDistanceStrategy, FaceEmbedder};
pub use lbph::LbphRecognizer;
pub use local_pattern::LocalPatternStrategy;
pub use seeta::SeetaFaceDetector;

/// Reason attached when either image has no detectable face.
pub const FACE_NOT_DETECTED: &str = "face_not_detected";

/// Locates face regions in a decoded image.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>>;
}

/// Capability interface shared by the face similarity strategies.
pub trait FaceSimilarityStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// `EngineUnavailable` when a required backend is missing.
    fn available(&self) -> Result<()> {
        Ok(())
    }

    /// Compare two decoded images.
    fn compare_images(&self, reference: &DynamicImage, probe: &DynamicImage)
        -> Result<FaceMatchResult>;

    /// Decode both files, then compare.
    fn compare(&self, reference: &Path, probe: &Path) -> Result<FaceMatchResult> {
        self.available()?;
        let reference = load_image(reference)?;
        let probe = load_image(probe)?;
        self.compare_images(&reference, &probe)
    }
}

/// Pick the face with the greatest bounding-box area. Ties keep the first
/// detection, so the choice is deterministic for a given detector.
pub fn select_dominant_face(faces: &[BoundingBox]) -> Option<BoundingBox> {
    faces.iter().copied().fold(None, |best, face| match best {
        Some(b) if b.area() >= face.area() => Some(b),
        _ => Some(face),
    })
}

/// Run `detector` and keep the dominant face, clipped to the image.
pub(crate) fn dominant_face(
    detector: &dyn FaceDetector,
    image: &DynamicImage,
) -> Result<Option<BoundingBox>> {
    let faces: Vec<BoundingBox> = detector
        .detect(image)?
        .into_iter()
        .filter_map(|b| b.clamp_to(image.width(), image.height()))
        .collect();
    Ok(select_dominant_face(&faces))
}

pub(crate) fn not_detected() -> FaceMatchResult {
    FaceMatchResult {
        matched: false,
        score: 0.0,
        reason: Some(FACE_NOT_DETECTED.to_string()),
    }
}

/// Detector that reports one fixed region per image.
///
/// Suitable for pre-cropped selfies and for document templates whose photo
/// area is known in advance. With no region configured the full frame is
/// the face.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRegionDetector {
    region: Option<BoundingBox>,
}

impl FixedRegionDetector {
    pub fn full_frame() -> Self {
        Self { region: None }
    }

    pub fn region(region: BoundingBox) -> Self {
        Self {
            region: Some(region),
        }
    }
}

impl FaceDetector for FixedRegionDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>> {
        let region = self
            .region
            .unwrap_or_else(|| BoundingBox::full(image.width(), image.height()));
        Ok(region
            .clamp_to(image.width(), image.height())
            .into_iter()
            .collect())
    }
}
