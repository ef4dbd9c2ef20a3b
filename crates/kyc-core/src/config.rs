//! Verification configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields
//! a working rule-based setup. Values are layered: defaults, then an
//! optional TOML file, then `KYC_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{KycError, Result};

/// Which face similarity strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaceStrategyKind {
    #[default]
    Embedding,
    LocalPattern,
}

/// Distance between two face embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    EuclideanL2,
}

impl DistanceMetric {
    /// Match threshold used when none is configured.
    pub fn default_threshold(self) -> f64 {
        match self {
            Self::Cosine => 0.35,
            Self::Euclidean => 23.56,
            Self::EuclideanL2 => 1.04,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub strategy: FaceStrategyKind,
    pub metric: DistanceMetric,
    /// Overrides `metric.default_threshold()`.
    pub distance_threshold: Option<f64>,
    /// Local-pattern similarity needed for a match (0..=100).
    pub match_score: f64,
    /// Side of the square each face crop is resized to.
    pub face_size: u32,
    /// Local-pattern histogram grid (columns, rows).
    pub grid: (u32, u32),
    /// SeetaFace cascade weights. Without it no detector is built.
    pub detector_model: Option<PathBuf>,
    /// Smallest face side, in pixels, the detector looks for.
    pub min_face_size: u32,
}

impl FaceConfig {
    pub fn effective_threshold(&self) -> f64 {
        self.distance_threshold
            .unwrap_or_else(|| self.metric.default_threshold())
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            strategy: FaceStrategyKind::default(),
            metric: DistanceMetric::default(),
            distance_threshold: None,
            match_score: 60.0,
            face_size: 200,
            grid: (8, 8),
            detector_model: None,
            min_face_size: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LivenessStrategyKind {
    #[default]
    EyeAspectRatio,
    Motion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub strategy: LivenessStrategyKind,
    /// Average eye aspect ratio must exceed this to count as live.
    pub ear_threshold: f64,
    pub min_frames: usize,
    /// Raw sum of absolute pixel differences; depends on frame resolution.
    pub motion_threshold: f64,
    pub blur_sigma: f32,
    /// Upper bound on frames decoded from one capture.
    pub max_frames: usize,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            strategy: LivenessStrategyKind::default(),
            ear_threshold: 0.18,
            min_frames: 8,
            motion_threshold: 50_000.0,
            blur_sigma: 3.5,
            max_frames: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskStrategyKind {
    #[default]
    Rules,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub strategy: RiskStrategyKind,
    /// JSON logistic model for the `model` strategy.
    pub model_path: Option<PathBuf>,
    pub high_risk_probability: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            strategy: RiskStrategyKind::default(),
            model_path: None,
            high_risk_probability: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".kyc"),
        }
    }
}

/// Top-level configuration for engines and the session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerificationConfig {
    pub face: FaceConfig,
    pub liveness: LivenessConfig,
    pub risk: RiskConfig,
    pub store: StoreConfig,
}

impl VerificationConfig {
    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| KycError::Config(format!("invalid toml: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    KycError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `KYC_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("KYC_STORE_DIR") {
            self.store.root = PathBuf::from(dir);
        }
        if let Some(value) = lookup("KYC_FACE_STRATEGY") {
            self.face.strategy = parse_enum("KYC_FACE_STRATEGY", &value)?;
        }
        if let Some(path) = lookup("KYC_FACE_DETECTOR_MODEL") {
            self.face.detector_model = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("KYC_LIVENESS_STRATEGY") {
            self.liveness.strategy = parse_enum("KYC_LIVENESS_STRATEGY", &value)?;
        }
        if let Some(value) = lookup("KYC_RISK_STRATEGY") {
            self.risk.strategy = parse_enum("KYC_RISK_STRATEGY", &value)?;
        }
        if let Some(path) = lookup("KYC_RISK_MODEL") {
            self.risk.model_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let face = &self.face;
        if !(face.effective_threshold() > 0.0) {
            return Err(KycError::Config(
                "face.distance_threshold must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&face.match_score) {
            return Err(KycError::Config(
                "face.match_score must be within 0..=100".to_string(),
            ));
        }
        if face.face_size < 16 {
            return Err(KycError::Config("face.face_size must be >= 16".to_string()));
        }
        // LBP codes lose a one pixel border on every side.
        let code_size = face.face_size - 2;
        if face.grid.0 == 0 || face.grid.1 == 0 || face.grid.0 > code_size || face.grid.1 > code_size {
            return Err(KycError::Config(format!(
                "face.grid {:?} does not fit the {code_size}px code image of a {}px face",
                face.grid, face.face_size
            )));
        }

        if face.min_face_size < crate::face::seeta::MIN_FACE_SIZE {
            return Err(KycError::Config(format!(
                "face.min_face_size must be >= {}",
                crate::face::seeta::MIN_FACE_SIZE
            )));
        }

        let liveness = &self.liveness;
        if !liveness.ear_threshold.is_finite() || liveness.ear_threshold < 0.0 {
            return Err(KycError::Config(
                "liveness.ear_threshold must be a non-negative number".to_string(),
            ));
        }
        if !liveness.motion_threshold.is_finite() || liveness.motion_threshold < 0.0 {
            return Err(KycError::Config(
                "liveness.motion_threshold must be a non-negative number".to_string(),
            ));
        }
        if liveness.max_frames < 2 {
            return Err(KycError::Config("liveness.max_frames must be >= 2".to_string()));
        }

        if !(0.0..=1.0).contains(&self.risk.high_risk_probability) {
            return Err(KycError::Config(
                "risk.high_risk_probability must be within 0..=1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a snake_case enum name the same way serde reads it from TOML.
fn parse_enum<T: for<'de> Deserialize<'de>>(key: &str, value: &str) -> Result<T> {
    T::deserialize(serde::de::value::StrDeserializer::<serde::de::value::Error>::new(value))
        .map_err(|e| KycError::Config(format!("{key}={value}: {e}")))
}
