//! Session state machine.
//!
//! A session starts `in_progress`, collects documents and verification
//! results, and ends `completed`. Nothing leaves `completed`: every
//! mutation of a completed session, including a second `complete`, is
//! rejected with [`KycError::SessionCompleted`] and the stored record is
//! left untouched.
//!
//! Each mutation is handed to [`SessionStore::update_with`], which holds the
//! session's exclusive lock across the read, the edit and the write. The
//! orchestrator keeps no per-session state of its own, so any number of
//! orchestrators (or processes) may share one store.

use chrono::Utc;
use kyc_state::{SessionStore, StorageError};

use crate::domain::{
    DocumentRecord, KycError, Result, Session, SessionId, SessionStatus, VerificationOutcome,
    VerificationRecord,
};
use crate::metrics::METRICS;
use crate::obs;

/// Owns every write to a session.
pub struct SessionOrchestrator<S> {
    store: S,
}

impl<S> SessionOrchestrator<S>
where
    S: SessionStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load, apply `f`, persist, all under the store's session lock. When
    /// `f` fails nothing is written and its error is returned unchanged.
    async fn mutate<F>(&self, session_id: &SessionId, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session) -> Result<()> + Send + 'static,
    {
        let mutation = Box::new(move |session: &mut Session| {
            f(session).map_err(StorageError::rejected)
        });
        Ok(self.store.update_with(session_id, mutation).await?)
    }

    /// Start a new in-progress session with a fresh id.
    pub async fn create(&self) -> Result<Session> {
        let session = Session::new();
        self.store.create(&session).await?;
        METRICS.inc_sessions_created();
        obs::emit_session_created(session.session_id.as_str());
        Ok(session)
    }

    /// Upsert the document stored under `doc_type`. Last write wins.
    pub async fn attach_document(
        &self,
        session_id: &SessionId,
        doc_type: &str,
        document: DocumentRecord,
    ) -> Result<Session> {
        let field_count = document.fields.len();
        let key = doc_type.to_string();
        let session = self
            .mutate(session_id, move |session| {
                ensure_open(session)?;
                session.documents.insert(key, document);
                Ok(())
            })
            .await?;
        obs::emit_document_attached(session_id.as_str(), doc_type, field_count);
        Ok(session)
    }

    /// Store `result` under its verification type with a fresh timestamp,
    /// replacing any earlier result of the same type.
    ///
    /// A NaN or infinite measurement is a `Validation` error; JSON has no
    /// encoding for it and the stored session would become unreadable.
    pub async fn record_result(
        &self,
        session_id: &SessionId,
        result: impl Into<VerificationOutcome>,
    ) -> Result<Session> {
        let result = result.into();
        let kind = result.kind();
        let (field, value) = result.measurement();
        if !value.is_finite() {
            return Err(KycError::Validation(format!(
                "{} {field} must be finite, got {value}",
                kind.as_str()
            )));
        }
        let passed = outcome_passed(&result);
        let session = self
            .mutate(session_id, move |session| {
                ensure_open(session)?;
                session.verification_results.insert(
                    kind,
                    VerificationRecord {
                        result,
                        verified_at: Utc::now(),
                    },
                );
                Ok(())
            })
            .await?;
        METRICS.inc_results_recorded();
        obs::emit_result_recorded(session_id.as_str(), kind.as_str(), passed);
        Ok(session)
    }

    /// Move the session to `completed` and stamp the completion time.
    pub async fn complete(&self, session_id: &SessionId) -> Result<Session> {
        let session = self
            .mutate(session_id, |session| {
                ensure_open(session)?;
                session.status = SessionStatus::Completed;
                session.completed_at = Some(Utc::now());
                Ok(())
            })
            .await?;
        METRICS.inc_sessions_completed();
        obs::emit_session_completed(session_id.as_str(), session.verification_results.len());
        Ok(session)
    }

    pub async fn get(&self, session_id: &SessionId) -> Result<Session> {
        Ok(self.store.get(session_id).await?)
    }

    /// Sessions matching `status` (all when `None`), newest first.
    pub async fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>> {
        let mut sessions = self.store.list().await?;
        sessions.retain(|s| status.map_or(true, |wanted| s.status == wanted));
        sessions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        Ok(sessions)
    }
}

fn ensure_open(session: &Session) -> Result<()> {
    if session.status.is_terminal() {
        return Err(KycError::SessionCompleted(session.session_id.clone()));
    }
    Ok(())
}

fn outcome_passed(outcome: &VerificationOutcome) -> bool {
    match outcome {
        VerificationOutcome::FaceMatch(r) => r.matched,
        VerificationOutcome::Liveness(r) => r.live,
        VerificationOutcome::LoanRisk(r) => r.risk_level != crate::domain::RiskLevel::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FaceMatchResult, LivenessResult, VerificationType};
    use kyc_state::fakes::MemorySessionStore;
    use std::collections::BTreeMap;

    fn orchestrator() -> SessionOrchestrator<MemorySessionStore> {
        SessionOrchestrator::new(MemorySessionStore::new())
    }

    fn face(matched: bool) -> FaceMatchResult {
        FaceMatchResult {
            matched,
            score: if matched { 0.1 } else { 0.9 },
            reason: None,
        }
    }

    #[tokio::test]
    async fn create_starts_empty_and_in_progress() {
        let orch = orchestrator();
        let session = orch.create().await.unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(session.documents.is_empty());
        assert!(session.verification_results.is_empty());
        assert_eq!(orch.get(&session.session_id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn record_result_replaces_same_type() {
        let orch = orchestrator();
        let id = orch.create().await.unwrap().session_id;

        orch.record_result(&id, face(true)).await.unwrap();
        let session = orch.record_result(&id, face(false)).await.unwrap();

        assert_eq!(session.verification_results.len(), 1);
        let stored = session.result(VerificationType::FaceMatch).unwrap();
        assert_eq!(stored.result, VerificationOutcome::FaceMatch(face(false)));
    }

    #[tokio::test]
    async fn results_of_different_types_coexist() {
        let orch = orchestrator();
        let id = orch.create().await.unwrap().session_id;
        orch.record_result(&id, face(true)).await.unwrap();
        let session = orch
            .record_result(
                &id,
                LivenessResult {
                    live: false,
                    metric: 0.0,
                    reason: Some("insufficient_motion".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(session.verification_results.len(), 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let orch = orchestrator();
        let ghost = SessionId::from("ghost");
        let err = orch.record_result(&ghost, face(true)).await.unwrap_err();
        assert!(matches!(err, KycError::SessionNotFound(ref id) if *id == ghost));
        assert!(matches!(
            orch.complete(&ghost).await,
            Err(KycError::SessionNotFound(_))
        ));
        assert!(orch.store().is_empty());
    }

    #[tokio::test]
    async fn completed_session_rejects_mutation() {
        let orch = orchestrator();
        let id = orch.create().await.unwrap().session_id;
        let done = orch.complete(&id).await.unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(done.completed_at.is_some());

        assert!(matches!(
            orch.complete(&id).await,
            Err(KycError::SessionCompleted(_))
        ));
        assert!(matches!(
            orch.record_result(&id, face(true)).await,
            Err(KycError::SessionCompleted(_))
        ));
        assert!(matches!(
            orch.attach_document(&id, "id_card", DocumentRecord::new("/tmp/a.png", "", BTreeMap::new()))
                .await,
            Err(KycError::SessionCompleted(_))
        ));
        assert_eq!(orch.get(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn non_finite_measurements_are_rejected_before_writing() {
        let orch = orchestrator();
        let id = orch.create().await.unwrap().session_id;
        let before = orch.get(&id).await.unwrap();

        let liveness = LivenessResult {
            live: true,
            metric: f64::NAN,
            reason: None,
        };
        assert!(matches!(
            orch.record_result(&id, liveness).await,
            Err(KycError::Validation(_))
        ));
        let face = FaceMatchResult {
            matched: false,
            score: f64::INFINITY,
            reason: None,
        };
        assert!(matches!(
            orch.record_result(&id, face).await,
            Err(KycError::Validation(_))
        ));
        assert_eq!(orch.get(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let orch = orchestrator();
        let first = orch.create().await.unwrap().session_id;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = orch.create().await.unwrap().session_id;
        orch.complete(&first).await.unwrap();

        let all: Vec<_> = orch
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(all, vec![second.clone(), first.clone()]);

        let open = orch.list(Some(SessionStatus::InProgress)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].session_id, second);
    }
}
