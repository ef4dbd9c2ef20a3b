//! Strategy selection.
//!
//! Inference backends reach the strategies through [`Backends`]. Face
//! detection ships with the crate ([`SeetaFaceDetector`], enabled by
//! `face.detector_model`). Face embeddings and eye landmarks need learned
//! models this crate does not bundle; the embedding application supplies
//! them. A strategy whose backend is absent reports `EngineUnavailable`
//! when invoked.

use std::sync::Arc;

use crate::config::{FaceStrategyKind, LivenessStrategyKind, RiskStrategyKind, VerificationConfig};
use crate::face::{
    EmbeddingDistanceStrategy, FaceDetector, FaceEmbedder, FaceSimilarityStrategy,
    LocalPatternStrategy, SeetaFaceDetector,
};
use crate::liveness::{
    AutoFrameDecoder, EarLivenessStrategy, FrameDecoder, LandmarkDetector, LivenessStrategy,
    MotionLivenessStrategy,
};
use crate::risk::{ModelRiskStrategy, RiskStrategy, RuleRiskStrategy};

#[derive(Clone, Default)]
pub struct Backends {
    pub face_detector: Option<Arc<dyn FaceDetector>>,
    pub face_embedder: Option<Arc<dyn FaceEmbedder>>,
    pub landmarks: Option<Arc<dyn LandmarkDetector>>,
    /// Defaults to [`AutoFrameDecoder`].
    pub frames: Option<Arc<dyn FrameDecoder>>,
}

impl Backends {
    /// The backends this crate can build on its own: the SeetaFace detector
    /// when `face.detector_model` is set. Load failures surface as
    /// `EngineUnavailable` at detection time.
    pub fn from_config(config: &VerificationConfig) -> Self {
        let face_detector = config.face.detector_model.as_deref().map(|path| {
            Arc::new(SeetaFaceDetector::load(path, config.face.min_face_size))
                as Arc<dyn FaceDetector>
        });
        Self {
            face_detector,
            ..Self::default()
        }
    }
}

/// One configured strategy per engine.
#[derive(Clone)]
pub struct Engines {
    pub face: Arc<dyn FaceSimilarityStrategy>,
    pub liveness: Arc<dyn LivenessStrategy>,
    pub risk: Arc<dyn RiskStrategy>,
}

impl Engines {
    pub fn from_config(config: &VerificationConfig, backends: Backends) -> Self {
        let face: Arc<dyn FaceSimilarityStrategy> = match config.face.strategy {
            FaceStrategyKind::Embedding => Arc::new(EmbeddingDistanceStrategy::from_config(
                &config.face,
                backends.face_detector,
                backends.face_embedder,
            )),
            FaceStrategyKind::LocalPattern => Arc::new(LocalPatternStrategy::from_config(
                &config.face,
                backends.face_detector,
            )),
        };

        let liveness: Arc<dyn LivenessStrategy> = match config.liveness.strategy {
            LivenessStrategyKind::EyeAspectRatio => Arc::new(EarLivenessStrategy::new(
                backends.landmarks,
                config.liveness.ear_threshold,
            )),
            LivenessStrategyKind::Motion => {
                let frames = backends
                    .frames
                    .unwrap_or_else(|| Arc::new(AutoFrameDecoder::default()));
                Arc::new(MotionLivenessStrategy::new(frames, &config.liveness))
            }
        };

        let risk: Arc<dyn RiskStrategy> = match config.risk.strategy {
            RiskStrategyKind::Rules => Arc::new(RuleRiskStrategy),
            RiskStrategyKind::Model => Arc::new(ModelRiskStrategy::load(
                config.risk.model_path.as_deref(),
                config.risk.high_risk_probability,
            )),
        };

        tracing::debug!(
            face = face.name(),
            liveness = liveness.name(),
            risk = risk.name(),
            "engines configured"
        );
        Self {
            face,
            liveness,
            risk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KycError;
    use crate::risk::RiskInputs;

    #[test]
    fn defaults_select_embedding_ear_and_rules() {
        let engines = Engines::from_config(&VerificationConfig::default(), Backends::default());
        assert_eq!(engines.face.name(), "embedding");
        assert_eq!(engines.liveness.name(), "eye_aspect_ratio");
        assert_eq!(engines.risk.name(), "rules");
    }

    #[test]
    fn missing_backends_surface_as_unavailable() {
        let engines = Engines::from_config(&VerificationConfig::default(), Backends::default());
        assert!(matches!(
            engines.face.available(),
            Err(KycError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn configured_detector_model_is_wired_in() {
        assert!(Backends::from_config(&VerificationConfig::default())
            .face_detector
            .is_none());

        let mut config = VerificationConfig::default();
        config.face.strategy = FaceStrategyKind::LocalPattern;
        config.face.detector_model = Some("/no/such/seeta.bin".into());
        let backends = Backends::from_config(&config);
        assert!(backends.face_detector.is_some());

        // The strategy sees a detector; the unreadable model is reported
        // when it runs.
        let engines = Engines::from_config(&config, backends);
        engines.face.available().unwrap();
        let img = image::DynamicImage::ImageLuma8(image::GrayImage::new(64, 64));
        assert!(matches!(
            engines.face.compare_images(&img, &img),
            Err(KycError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn alternate_strategies_follow_config() {
        let mut config = VerificationConfig::default();
        config.face.strategy = FaceStrategyKind::LocalPattern;
        config.liveness.strategy = LivenessStrategyKind::Motion;
        config.risk.strategy = RiskStrategyKind::Model;

        let engines = Engines::from_config(&config, Backends::default());
        assert_eq!(engines.face.name(), "local_pattern");
        assert_eq!(engines.liveness.name(), "motion");
        assert_eq!(engines.risk.name(), "model");
        assert!(matches!(
            engines.risk.score(&RiskInputs::new(1.0, 1.0, 1.0)),
            Err(KycError::EngineUnavailable(_))
        ));
    }
}
