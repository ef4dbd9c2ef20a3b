//! Structured observability hooks for the session lifecycle.
//!
//! Events are emitted at `info!` level, engine failures at `warn!`.
//! Filtering follows `KYC_LOG` (see [`crate::telemetry`]).

use tracing::{info, warn};

/// RAII guard that enters a session-scoped span.
///
/// ```ignore
/// let _span = SessionSpan::enter(&session_id);
/// // events below carry session_id
/// ```
///
/// The guard is not `Send`; async code instruments with [`session_span`]
/// instead.
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    /// Enter a `kyc.session` span for `session_id` until the guard drops.
    pub fn enter(session_id: &str) -> Self {
        Self {
            _span: session_span(session_id).entered(),
        }
    }
}

/// The `kyc.session` span, unentered. Attach it with
/// `tracing::Instrument::instrument`.
pub fn session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!("kyc.session", session_id = %session_id)
}

/// Emit event: a new session was persisted.
pub fn emit_session_created(session_id: &str) {
    info!(event = "session.created", session_id = %session_id);
}

/// Emit event: a document was stored under `doc_type`, replacing any
/// earlier one.
pub fn emit_document_attached(session_id: &str, doc_type: &str, field_count: usize) {
    info!(
        event = "session.document_attached",
        session_id = %session_id,
        doc_type = %doc_type,
        fields = field_count,
    );
}

/// Emit event: a verification result was stored.
///
/// `passed` is the engine's own verdict: matched, live, or not HIGH risk.
pub fn emit_result_recorded(session_id: &str, verification_type: &str, passed: bool) {
    info!(
        event = "session.result_recorded",
        session_id = %session_id,
        verification_type = %verification_type,
        passed = passed,
    );
}

/// Emit event: the session moved to `completed`.
pub fn emit_session_completed(session_id: &str, result_count: usize) {
    info!(
        event = "session.completed",
        session_id = %session_id,
        results = result_count,
    );
}

/// Emit event: an engine returned an error (warning level). The session
/// is left as it was.
pub fn emit_engine_failed(session_id: &str, engine: &str, error: &crate::domain::KycError) {
    warn!(
        event = "engine.failed",
        session_id = %session_id,
        engine = %engine,
        kind = error.kind(),
        error = %error,
    );
}
