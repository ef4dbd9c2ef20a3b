//! Persisted session layout.
//!
//! A [`Session`] is one applicant's verification case. It owns its
//! [`DocumentRecord`]s and at most one [`VerificationRecord`] per
//! [`VerificationType`]. Everything except the session itself is value-like
//! once written.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque unique identifier for a verification session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random SessionId
    pub fn new() -> Self {
        SessionId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Lifecycle state of a session. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// One uploaded artifact attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Where the artifact lives. The store owns the bytes; the session only
    /// holds this reference.
    pub path: PathBuf,
    /// Raw text recognized from the artifact.
    pub ocr_text: String,
    /// Structured fields parsed from `ocr_text`.
    pub fields: BTreeMap<String, String>,
    pub uploaded_at: DateTime<Utc>,
    /// Hex SHA-256 of the artifact bytes, when ingested from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl DocumentRecord {
    /// A record stamped with the current time and no digest.
    pub fn new(
        path: impl Into<PathBuf>,
        ocr_text: impl Into<String>,
        fields: BTreeMap<String, String>,
    ) -> Self {
        Self {
            path: path.into(),
            ocr_text: ocr_text.into(),
            fields,
            uploaded_at: Utc::now(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }
}

/// Identity verification case for a single applicant.
///
/// Invariants:
/// - `verification_results` holds at most one entry per [`VerificationType`];
///   a later result of the same type replaces the earlier one.
/// - `completed_at` is set iff `status == Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentRecord>,
    #[serde(default)]
    pub verification_results: BTreeMap<VerificationType, VerificationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh in-progress session with no documents or results.
    pub fn new() -> Self {
        Self {
            session_id: SessionId::new(),
            created_at: Utc::now(),
            status: SessionStatus::InProgress,
            documents: BTreeMap::new(),
            verification_results: BTreeMap::new(),
            completed_at: None,
        }
    }

    pub fn result(&self, kind: VerificationType) -> Option<&VerificationRecord> {
        self.verification_results.get(&kind)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Verification results
// ---------------------------------------------------------------------------

/// The three checks a session can carry a result for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationType {
    FaceMatch,
    Liveness,
    LoanRisk,
}

impl VerificationType {
    pub const ALL: [VerificationType; 3] = [Self::FaceMatch, Self::Liveness, Self::LoanRisk];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FaceMatch => "face_match",
            Self::Liveness => "liveness",
            Self::LoanRisk => "loan_risk",
        }
    }
}

impl std::fmt::Display for VerificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face similarity decision.
///
/// `score` is strategy dependent but monotonic in likelihood of a match
/// within a strategy: the embedding strategy reports a distance (smaller is
/// more similar), the local-pattern strategy a similarity in 0..=100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatchResult {
    pub matched: bool,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Liveness decision. `metric` is the eye aspect ratio or the average
/// inter-frame motion, depending on the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessResult {
    pub live: bool,
    pub metric: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Coarse lending risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

/// Tagged union over the three result kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerificationOutcome {
    FaceMatch(FaceMatchResult),
    Liveness(LivenessResult),
    LoanRisk(RiskResult),
}

impl VerificationOutcome {
    /// The result-map key this outcome is stored under.
    pub fn kind(&self) -> VerificationType {
        match self {
            Self::FaceMatch(_) => VerificationType::FaceMatch,
            Self::Liveness(_) => VerificationType::Liveness,
            Self::LoanRisk(_) => VerificationType::LoanRisk,
        }
    }

    /// The numeric measurement carried by the result, with its field name.
    pub fn measurement(&self) -> (&'static str, f64) {
        match self {
            Self::FaceMatch(r) => ("score", r.score),
            Self::Liveness(r) => ("metric", r.metric),
            Self::LoanRisk(r) => ("risk_score", r.risk_score),
        }
    }
}

impl From<FaceMatchResult> for VerificationOutcome {
    fn from(r: FaceMatchResult) -> Self {
        Self::FaceMatch(r)
    }
}

impl From<LivenessResult> for VerificationOutcome {
    fn from(r: LivenessResult) -> Self {
        Self::Liveness(r)
    }
}

impl From<RiskResult> for VerificationOutcome {
    fn from(r: RiskResult) -> Self {
        Self::LoanRisk(r)
    }
}

/// A stored result with the time it was recorded. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub result: VerificationOutcome,
    pub verified_at: DateTime<Utc>,
}
