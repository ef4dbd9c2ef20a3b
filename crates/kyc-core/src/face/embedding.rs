//! Embedding-distance face similarity.

use std::sync::Arc;

use image::DynamicImage;

use super::{dominant_face, not_detected, FaceDetector, FaceSimilarityStrategy};
use crate::config::{DistanceMetric, FaceConfig};
use crate::domain::{FaceMatchResult, KycError, Result};

/// Pretrained model that maps a cropped face to a fixed-length vector.
pub trait FaceEmbedder: Send + Sync {
    fn embed(&self, face: &DynamicImage) -> Result<Vec<f32>>;
}

/// Distance between two embeddings under `metric`. Smaller is more similar;
/// identical non-zero vectors give 0.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> Result<f64> {
    if a.is_empty() || a.len() != b.len() {
        return Err(KycError::Validation(format!(
            "embedding dimensions differ or are empty: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let d = match metric {
        DistanceMetric::Cosine => {
            let (dot, na, nb) = a.iter().zip(b).fold((0.0, 0.0, 0.0), |(dot, na, nb), (&x, &y)| {
                let (x, y) = (f64::from(x), f64::from(y));
                (dot + x * y, na + x * x, nb + y * y)
            });
            if na == 0.0 || nb == 0.0 {
                1.0
            } else {
                (1.0 - dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 2.0)
            }
        }
        DistanceMetric::Euclidean => euclidean(a.iter().map(|&x| f64::from(x)), b.iter().map(|&y| f64::from(y))),
        DistanceMetric::EuclideanL2 => {
            let (na, nb) = (l2_norm(a), l2_norm(b));
            if na == 0.0 || nb == 0.0 {
                return Ok(euclidean(
                    a.iter().map(|&x| f64::from(x)),
                    b.iter().map(|&y| f64::from(y)),
                ));
            }
            euclidean(
                a.iter().map(|&x| f64::from(x) / na),
                b.iter().map(|&y| f64::from(y) / nb),
            )
        }
    };
    Ok(d)
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

fn euclidean(a: impl Iterator<Item = f64>, b: impl Iterator<Item = f64>) -> f64 {
    a.zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Compares the dominant face of each image by embedding distance.
///
/// `matched = distance < threshold`; the reported score is the distance
/// itself.
pub struct EmbeddingDistanceStrategy {
    detector: Option<Arc<dyn FaceDetector>>,
    embedder: Option<Arc<dyn FaceEmbedder>>,
    metric: DistanceMetric,
    threshold: f64,
}

impl EmbeddingDistanceStrategy {
    pub fn new(
        detector: Option<Arc<dyn FaceDetector>>,
        embedder: Option<Arc<dyn FaceEmbedder>>,
        metric: DistanceMetric,
        threshold: f64,
    ) -> Self {
        Self {
            detector,
            embedder,
            metric,
            threshold,
        }
    }

    pub fn from_config(
        config: &FaceConfig,
        detector: Option<Arc<dyn FaceDetector>>,
        embedder: Option<Arc<dyn FaceEmbedder>>,
    ) -> Self {
        Self::new(detector, embedder, config.metric, config.effective_threshold())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn backends(&self) -> Result<(&dyn FaceDetector, &dyn FaceEmbedder)> {
        let detector = self.detector.as_deref().ok_or_else(|| {
            KycError::EngineUnavailable("embedding strategy has no face detector".to_string())
        })?;
        let embedder = self.embedder.as_deref().ok_or_else(|| {
            KycError::EngineUnavailable("embedding strategy has no face embedder".to_string())
        })?;
        Ok((detector, embedder))
    }
}

impl FaceSimilarityStrategy for EmbeddingDistanceStrategy {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn available(&self) -> Result<()> {
        self.backends().map(|_| ())
    }

    fn compare_images(
        &self,
        reference: &DynamicImage,
        probe: &DynamicImage,
    ) -> Result<FaceMatchResult> {
        let (detector, embedder) = self.backends()?;

        let (Some(ref_box), Some(probe_box)) = (
            dominant_face(detector, reference)?,
            dominant_face(detector, probe)?,
        ) else {
            return Ok(not_detected());
        };

        let ref_face = reference.crop_imm(ref_box.x, ref_box.y, ref_box.width, ref_box.height);
        let probe_face = probe.crop_imm(probe_box.x, probe_box.y, probe_box.width, probe_box.height);
        let d = distance(
            self.metric,
            &embedder.embed(&ref_face)?,
            &embedder.embed(&probe_face)?,
        )?;

        tracing::debug!(metric = ?self.metric, distance = d, threshold = self.threshold, "embedding distance");
        Ok(FaceMatchResult {
            matched: d < self.threshold,
            score: d,
            reason: None,
        })
    }
}
