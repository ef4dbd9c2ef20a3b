//! LBPH-based face similarity.

use std::sync::Arc;

use image::DynamicImage;

use super::lbph::LbphRecognizer;
use super::{dominant_face, not_detected, FaceDetector, FaceSimilarityStrategy};
use crate::config::FaceConfig;
use crate::domain::{FaceMatchResult, KycError, Result};
use crate::imaging::normalized_face;

const REFERENCE_LABEL: i32 = 0;

/// Trains a single-exemplar LBPH model on the reference face and classifies
/// the probe against it.
///
/// The raw chi-square distance is folded into a bounded similarity with
/// `score = max(0, 100 - distance)`; `matched = score >= match_score`.
pub struct LocalPatternStrategy {
    detector: Option<Arc<dyn FaceDetector>>,
    face_size: u32,
    grid: (u32, u32),
    match_score: f64,
}

impl LocalPatternStrategy {
    pub fn new(
        detector: Option<Arc<dyn FaceDetector>>,
        face_size: u32,
        grid: (u32, u32),
        match_score: f64,
    ) -> Self {
        Self {
            detector,
            face_size,
            grid,
            match_score,
        }
    }

    pub fn from_config(config: &FaceConfig, detector: Option<Arc<dyn FaceDetector>>) -> Self {
        Self::new(detector, config.face_size, config.grid, config.match_score)
    }

    fn detector(&self) -> Result<&dyn FaceDetector> {
        self.detector.as_deref().ok_or_else(|| {
            KycError::EngineUnavailable("local-pattern strategy has no face detector".to_string())
        })
    }
}

/// Map an unbounded LBPH distance onto 0..=100, higher meaning closer.
pub fn similarity_from_confidence(raw: f64) -> f64 {
    (100.0 - raw).max(0.0)
}

impl FaceSimilarityStrategy for LocalPatternStrategy {
    fn name(&self) -> &'static str {
        "local_pattern"
    }

    fn available(&self) -> Result<()> {
        self.detector().map(|_| ())
    }

    fn compare_images(
        &self,
        reference: &DynamicImage,
        probe: &DynamicImage,
    ) -> Result<FaceMatchResult> {
        let detector = self.detector()?;

        let (Some(ref_box), Some(probe_box)) = (
            dominant_face(detector, reference)?,
            dominant_face(detector, probe)?,
        ) else {
            return Ok(not_detected());
        };

        let ref_face = normalized_face(reference, ref_box, self.face_size)?;
        let probe_face = normalized_face(probe, probe_box, self.face_size)?;

        let model = LbphRecognizer::train(&[(REFERENCE_LABEL, &ref_face)], self.grid.0, self.grid.1)?;
        let (_, raw) = model.predict(&probe_face)?;
        let score = similarity_from_confidence(raw);

        tracing::debug!(raw_confidence = raw, score, "lbph prediction");
        Ok(FaceMatchResult {
            matched: score >= self.match_score,
            score,
            reason: None,
        })
    }
}
