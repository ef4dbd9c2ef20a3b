//! kyc-state: Session persistence for KYC Verify
//!
//! This crate owns the persisted shape of a verification session and the
//! storage abstraction the decisioning layer writes through.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: snapshot integrity and atomic replacement of session records.
//!
//! ## Key Components
//!
//! - `Session`: one applicant's case (documents + verification results)
//! - `SessionStore`: async keyed store (create / get / update / list)
//! - `JsonDirSessionStore`: one JSON document per session in a directory
//! - `fakes::MemorySessionStore`: in-memory implementation for tests

mod error;
pub mod fakes;
pub mod json_store;
pub mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use json_store::JsonDirSessionStore;
pub use schema::{
    DocumentRecord, FaceMatchResult, LivenessResult, RiskLevel, RiskResult, Session, SessionId,
    SessionStatus, VerificationOutcome, VerificationRecord, VerificationType,
};
pub use storage_traits::{SessionMutation, SessionStore, StorageResult};
