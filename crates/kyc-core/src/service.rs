//! Verification pipeline: runs an engine, then records its result.
//!
//! Engines are synchronous and CPU bound, so each call runs on the blocking
//! pool. An engine error is returned to the caller and the session is left
//! exactly as it was; results recorded earlier stay in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kyc_state::SessionStore;
use tracing::Instrument;

use crate::document::{sha256_file, FieldParser, LabelFieldParser, TesseractExtractor, TextExtractor};
use crate::domain::{
    DocumentRecord, FaceMatchResult, KycError, LivenessResult, Result, RiskResult, Session,
    SessionId,
};
use crate::engines::Engines;
use crate::liveness::Capture;
use crate::metrics::METRICS;
use crate::obs;
use crate::orchestrator::SessionOrchestrator;
use crate::risk::RiskInputs;

pub struct VerificationService<S> {
    orchestrator: Arc<SessionOrchestrator<S>>,
    engines: Engines,
    extractor: Arc<dyn TextExtractor>,
    parser: Arc<dyn FieldParser>,
}

impl<S> VerificationService<S>
where
    S: SessionStore + 'static,
{
    /// Uses `tesseract` for OCR and the label parser for fields.
    pub fn new(orchestrator: Arc<SessionOrchestrator<S>>, engines: Engines) -> Self {
        Self {
            orchestrator,
            engines,
            extractor: Arc::new(TesseractExtractor::default()),
            parser: Arc::new(LabelFieldParser),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn FieldParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator<S> {
        &self.orchestrator
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    /// OCR the artifact, parse its fields, digest it, attach it under
    /// `doc_type`.
    pub async fn ingest_document(
        &self,
        session_id: &SessionId,
        doc_type: &str,
        path: &Path,
    ) -> Result<Session> {
        async move {
            self.orchestrator.get(session_id).await?;

            let extractor = Arc::clone(&self.extractor);
            let parser = Arc::clone(&self.parser);
            let source = path.to_path_buf();
            let document = self
                .run_engine(session_id, "ocr", move || {
                    let text = extractor.extract(&source)?;
                    let fields = parser.parse(&text);
                    let digest = sha256_file(&source)?;
                    Ok(DocumentRecord::new(source, text, fields).with_sha256(digest))
                })
                .await?;

            self.orchestrator
                .attach_document(session_id, doc_type, document)
                .await
        }
        .instrument(obs::session_span(session_id.as_str()))
        .await
    }

    pub async fn verify_face(
        &self,
        session_id: &SessionId,
        reference: &Path,
        probe: &Path,
    ) -> Result<FaceMatchResult> {
        async move {
            self.orchestrator.get(session_id).await?;

            let strategy = Arc::clone(&self.engines.face);
            let (reference, probe): (PathBuf, PathBuf) = (reference.into(), probe.into());
            let result = self
                .run_engine(session_id, strategy.name(), move || {
                    strategy.compare(&reference, &probe)
                })
                .await?;

            self.orchestrator
                .record_result(session_id, result.clone())
                .await?;
            Ok(result)
        }
        .instrument(obs::session_span(session_id.as_str()))
        .await
    }

    pub async fn check_liveness(
        &self,
        session_id: &SessionId,
        capture: Capture,
    ) -> Result<LivenessResult> {
        async move {
            self.orchestrator.get(session_id).await?;

            let strategy = Arc::clone(&self.engines.liveness);
            let result = self
                .run_engine(session_id, strategy.name(), move || strategy.check(&capture))
                .await?;

            self.orchestrator
                .record_result(session_id, result.clone())
                .await?;
            Ok(result)
        }
        .instrument(obs::session_span(session_id.as_str()))
        .await
    }

    pub async fn assess_risk(
        &self,
        session_id: &SessionId,
        inputs: RiskInputs,
    ) -> Result<RiskResult> {
        async move {
            self.orchestrator.get(session_id).await?;

            let strategy = Arc::clone(&self.engines.risk);
            let result = self
                .run_engine(session_id, strategy.name(), move || strategy.score(&inputs))
                .await?;

            self.orchestrator
                .record_result(session_id, result.clone())
                .await?;
            Ok(result)
        }
        .instrument(obs::session_span(session_id.as_str()))
        .await
    }

    async fn run_engine<T, F>(&self, session_id: &SessionId, engine: &str, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let outcome = match tokio::task::spawn_blocking(job).await {
            Ok(outcome) => outcome,
            Err(join) => Err(KycError::Io(std::io::Error::other(join))),
        };
        if let Err(err) = &outcome {
            METRICS.inc_engine_failures();
            obs::emit_engine_failed(session_id.as_str(), engine, err);
        }
        outcome
    }
}
