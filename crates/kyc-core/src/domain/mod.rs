//! Domain models for KYC Verify.
//!
//! The persisted entities (`Session`, `DocumentRecord`, the result types)
//! are defined in `kyc-state` and re-exported here next to the error
//! taxonomy so engine code has a single import point.

pub mod error;

pub use error::{KycError, Result};
pub use kyc_state::{
    DocumentRecord, FaceMatchResult, LivenessResult, RiskLevel, RiskResult, Session, SessionId,
    SessionStatus, VerificationOutcome, VerificationRecord, VerificationType,
};
