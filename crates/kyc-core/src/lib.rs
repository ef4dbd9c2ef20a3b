//! KYC Verify Core Library
//!
//! Verification decisioning: face similarity, liveness, risk scoring, and
//! the session state machine that records their results.

pub mod config;
pub mod document;
pub mod domain;
pub mod engines;
pub mod face;
pub mod imaging;
pub mod liveness;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod risk;
pub mod service;
pub mod telemetry;

pub use config::{
    DistanceMetric, FaceConfig, FaceStrategyKind, LivenessConfig, LivenessStrategyKind,
    RiskConfig, RiskStrategyKind, StoreConfig, VerificationConfig,
};

pub use domain::{
    DocumentRecord, FaceMatchResult, KycError, LivenessResult, Result, RiskLevel, RiskResult,
    Session, SessionId, SessionStatus, VerificationOutcome, VerificationRecord, VerificationType,
};

pub use document::{FieldParser, LabelFieldParser, TesseractExtractor, TextExtractor};
pub use engines::{Backends, Engines};
pub use face::{
    EmbeddingDistanceStrategy, FaceDetector, FaceEmbedder, FaceSimilarityStrategy,
    FixedRegionDetector, LocalPatternStrategy, SeetaFaceDetector,
};
pub use imaging::BoundingBox;
pub use liveness::{
    Capture, EarLivenessStrategy, FaceLandmarks, LandmarkDetector, LivenessStrategy,
    MotionLivenessStrategy,
};
pub use orchestrator::SessionOrchestrator;
pub use risk::{LogisticRiskModel, ModelRiskStrategy, RiskInputs, RiskStrategy, RuleRiskStrategy};
pub use service::VerificationService;

pub use kyc_state::{JsonDirSessionStore, SessionStore};

pub use metrics::METRICS;
pub use obs::{
    emit_document_attached, emit_engine_failed, emit_result_recorded, emit_session_completed,
    emit_session_created, SessionSpan,
};
pub use telemetry::{init_tracing, LogFormat};

/// KYC Verify version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
