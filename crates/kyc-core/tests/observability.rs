//! Lifecycle events and spans emit without a configured subscriber and
//! under `traced_test`.

use kyc_core::{
    emit_document_attached, emit_engine_failed, emit_result_recorded, emit_session_completed,
    emit_session_created, KycError, SessionOrchestrator, SessionSpan,
};
use kyc_state::fakes::MemorySessionStore;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn session_events_emit() {
    emit_session_created("s-1");
    emit_document_attached("s-1", "id_card", 5);
    emit_result_recorded("s-1", "face_match", true);
    emit_session_completed("s-1", 3);
}

#[traced_test]
#[test]
fn engine_failure_emits_at_warn() {
    let err = KycError::EngineUnavailable("no landmark detector".into());
    emit_engine_failed("s-2", "eye_aspect_ratio", &err);
}

#[traced_test]
#[test]
fn session_span_nests_events() {
    let span = SessionSpan::enter("s-3");
    emit_result_recorded("s-3", "loan_risk", false);
    drop(span);
}

#[traced_test]
#[tokio::test]
async fn orchestrator_lifecycle_runs_under_subscriber() {
    let orch = SessionOrchestrator::new(MemorySessionStore::new());
    let session = orch.create().await.unwrap();
    orch.complete(&session.session_id).await.unwrap();
    kyc_core::METRICS.flush();
}
