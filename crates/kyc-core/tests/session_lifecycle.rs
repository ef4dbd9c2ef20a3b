//! Session state machine against both store implementations.

use std::collections::BTreeMap;
use std::sync::Arc;

use kyc_core::{
    DocumentRecord, FaceMatchResult, KycError, RiskLevel, RiskResult, SessionId,
    SessionOrchestrator, SessionStatus, SessionStore, VerificationOutcome, VerificationType,
};
use kyc_state::fakes::MemorySessionStore;
use kyc_state::JsonDirSessionStore;

fn doc(path: &str) -> DocumentRecord {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), "Asha Verma".to_string());
    DocumentRecord::new(path, "Name: Asha Verma", fields)
}

fn risk(score: f64, level: RiskLevel) -> RiskResult {
    RiskResult {
        risk_score: score,
        risk_level: level,
    }
}

#[tokio::test]
async fn record_on_unknown_session_leaves_store_unmodified() {
    let orch = SessionOrchestrator::new(MemorySessionStore::new());
    let existing = orch.create().await.unwrap();
    let before = orch.store().list().await.unwrap();

    let err = orch
        .record_result(&SessionId::from("missing"), risk(100.0, RiskLevel::Low))
        .await
        .unwrap_err();
    assert!(matches!(err, KycError::SessionNotFound(_)));
    assert_eq!(err.kind(), "not_found");

    let after = orch.store().list().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(orch.get(&existing.session_id).await.unwrap(), existing);
}

#[tokio::test]
async fn same_type_twice_keeps_one_entry() {
    let orch = SessionOrchestrator::new(MemorySessionStore::new());
    let id = orch.create().await.unwrap().session_id;

    orch.record_result(&id, risk(100.0, RiskLevel::Low))
        .await
        .unwrap();
    let first_at = orch.get(&id).await.unwrap().verification_results[&VerificationType::LoanRisk]
        .verified_at;
    orch.record_result(&id, risk(15.0, RiskLevel::High))
        .await
        .unwrap();

    let session = orch.get(&id).await.unwrap();
    assert_eq!(session.verification_results.len(), 1);
    let record = &session.verification_results[&VerificationType::LoanRisk];
    assert_eq!(
        record.result,
        VerificationOutcome::LoanRisk(risk(15.0, RiskLevel::High))
    );
    assert!(record.verified_at >= first_at);
}

#[tokio::test]
async fn attach_document_overwrites_same_type() {
    let orch = SessionOrchestrator::new(MemorySessionStore::new());
    let id = orch.create().await.unwrap().session_id;
    orch.attach_document(&id, "id_card", doc("/scans/front.png"))
        .await
        .unwrap();
    let session = orch
        .attach_document(&id, "id_card", doc("/scans/front-retake.png"))
        .await
        .unwrap();
    assert_eq!(session.documents.len(), 1);
    assert_eq!(
        session.documents["id_card"].path,
        std::path::PathBuf::from("/scans/front-retake.png")
    );
}

#[tokio::test]
async fn second_complete_is_rejected_and_record_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let orch = SessionOrchestrator::new(JsonDirSessionStore::new(dir.path()).unwrap());
    let id = orch.create().await.unwrap().session_id;
    orch.record_result(
        &id,
        FaceMatchResult {
            matched: true,
            score: 0.12,
            reason: None,
        },
    )
    .await
    .unwrap();

    let completed = orch.complete(&id).await.unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);

    let err = orch.complete(&id).await.unwrap_err();
    assert!(matches!(err, KycError::SessionCompleted(ref sid) if *sid == id));
    assert_eq!(orch.get(&id).await.unwrap(), completed);
}

#[tokio::test]
async fn sessions_survive_a_new_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let orch = SessionOrchestrator::new(JsonDirSessionStore::new(dir.path()).unwrap());
        let id = orch.create().await.unwrap().session_id;
        orch.attach_document(&id, "id_card", doc("/scans/a.png"))
            .await
            .unwrap();
        id
    };

    let reopened = SessionOrchestrator::new(JsonDirSessionStore::new(dir.path()).unwrap());
    let session = reopened.get(&id).await.unwrap();
    assert_eq!(session.documents["id_card"].fields["name"], "Asha Verma");
    assert_eq!(reopened.list(None).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_attachments_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let orch = Arc::new(SessionOrchestrator::new(
        JsonDirSessionStore::new(dir.path()).unwrap(),
    ));
    let id = orch.create().await.unwrap().session_id;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let orch = Arc::clone(&orch);
            let id = id.clone();
            tokio::spawn(async move {
                orch.attach_document(&id, &format!("doc_{i:02}"), doc(&format!("/scans/{i}.png")))
                    .await
            })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let session = orch.get(&id).await.unwrap();
    assert_eq!(session.documents.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_results_of_each_type_all_land() {
    let orch = Arc::new(SessionOrchestrator::new(MemorySessionStore::new()));
    let id = orch.create().await.unwrap().session_id;

    let outcomes: Vec<VerificationOutcome> = vec![
        FaceMatchResult {
            matched: true,
            score: 0.2,
            reason: None,
        }
        .into(),
        kyc_core::LivenessResult {
            live: true,
            metric: 0.3,
            reason: None,
        }
        .into(),
        risk(45.0, RiskLevel::Medium).into(),
    ];
    let handles: Vec<_> = outcomes
        .into_iter()
        .map(|outcome| {
            let orch = Arc::clone(&orch);
            let id = id.clone();
            tokio::spawn(async move { orch.record_result(&id, outcome).await })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let session = orch.get(&id).await.unwrap();
    let kinds: Vec<_> = session.verification_results.keys().copied().collect();
    assert_eq!(kinds, VerificationType::ALL.to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn independent_orchestrators_on_one_directory_keep_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let setup = SessionOrchestrator::new(JsonDirSessionStore::new(dir.path()).unwrap());

    for round in 0..20 {
        let id = setup.create().await.unwrap().session_id;

        // One orchestrator and one store handle per writer, like separate
        // `kyc` invocations against the same store root.
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = dir.path().to_path_buf();
                let id = id.clone();
                tokio::spawn(async move {
                    let orch = SessionOrchestrator::new(JsonDirSessionStore::new(&root).unwrap());
                    orch.attach_document(&id, &format!("doc_{i}"), doc(&format!("/scans/{i}.png")))
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let session = setup.get(&id).await.unwrap();
        assert_eq!(session.documents.len(), 8, "round {round} lost a document");
    }
}

#[tokio::test]
async fn nan_metric_is_rejected_and_session_stays_readable() {
    let dir = tempfile::tempdir().unwrap();
    let orch = SessionOrchestrator::new(JsonDirSessionStore::new(dir.path()).unwrap());
    let id = orch.create().await.unwrap().session_id;

    let err = orch
        .record_result(
            &id,
            kyc_core::LivenessResult {
                live: true,
                metric: f64::NAN,
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, KycError::Validation(_)));

    let session = orch.get(&id).await.unwrap();
    assert!(session.verification_results.is_empty());
    assert_eq!(orch.list(None).await.unwrap().len(), 1);
}
