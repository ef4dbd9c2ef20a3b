//! KYC Verify CLI
//!
//! The `kyc` command drives verification sessions from the shell.
//!
//! ## Commands
//!
//! - `session`: create, show, list and complete sessions
//! - `document attach`: OCR an identity document into a session
//! - `face`: compare a reference face with a probe
//! - `liveness`: check a selfie or a short video
//! - `risk rules` / `risk model`: score an applicant
//!
//! Results are printed as pretty JSON on stdout. With `--session` they are
//! also recorded into that session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::Level;

use kyc_core::{
    Backends, Capture, Engines, FaceStrategyKind, FixedRegionDetector, LivenessStrategyKind,
    RiskInputs, RiskStrategyKind, SessionId, SessionOrchestrator, SessionStatus,
    VerificationConfig, VerificationService, METRICS,
};
use kyc_state::JsonDirSessionStore;

#[derive(Parser)]
#[command(name = "kyc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "KYC Verify: face, liveness and risk checks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "KYC_CONFIG")]
    config: Option<PathBuf>,

    /// Session store root (overrides config and KYC_STORE_DIR)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage verification sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Identity document operations
    Document {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Compare the face on a reference image with a probe image
    Face {
        /// Reference image (usually the identity document)
        reference: PathBuf,

        /// Probe image (usually the selfie)
        probe: PathBuf,

        /// Similarity strategy (default: from config; `local-pattern` when
        /// the config asks for `embedding`, which needs an embedder this
        /// binary does not ship)
        #[arg(long, value_enum)]
        strategy: Option<FaceStrategyArg>,

        /// SeetaFace cascade weights for face detection (overrides
        /// face.detector_model and KYC_FACE_DETECTOR_MODEL)
        #[arg(long)]
        detector_model: Option<PathBuf>,

        /// Treat each whole image as the face region instead of detecting
        #[arg(long)]
        assume_cropped: bool,

        #[command(flatten)]
        target: SessionTarget,
    },

    /// Check that a capture shows a live subject
    ///
    /// Still images use eye-aspect-ratio analysis, which needs a landmark
    /// detector supplied by a library caller; from the command line only
    /// `--video` (motion analysis) can run.
    Liveness {
        /// Still image, video file, or directory of frames
        capture: PathBuf,

        /// Treat the capture as video and use motion analysis
        #[arg(long)]
        video: bool,

        #[command(flatten)]
        target: SessionTarget,
    },

    /// Score lending risk
    Risk {
        #[command(subcommand)]
        action: RiskAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a new session
    Create,

    /// Print a session
    Show { session: String },

    /// List sessions, newest first
    List {
        /// Only sessions in this state
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Mark a session completed
    Complete { session: String },
}

#[derive(Subcommand)]
enum DocumentAction {
    /// OCR a document image and attach it to a session
    Attach {
        /// Document image
        path: PathBuf,

        #[arg(long)]
        session: String,

        /// Document type key
        #[arg(long = "type", default_value = "id_card")]
        doc_type: String,
    },
}

#[derive(Subcommand)]
enum RiskAction {
    /// Point-table scoring (LOW / MEDIUM / HIGH)
    Rules {
        #[arg(long)]
        income: f64,

        #[arg(long, default_value_t = 0.0)]
        liabilities: f64,

        #[arg(long, default_value_t = 600.0)]
        credit_score: f64,

        #[command(flatten)]
        target: SessionTarget,
    },

    /// Logistic model scoring (LOW / HIGH)
    Model {
        #[arg(long)]
        income: f64,

        #[arg(long)]
        age: f64,

        #[arg(long)]
        loan_amount: f64,

        /// Model JSON (default: risk.model_path from config)
        #[arg(long)]
        model: Option<PathBuf>,

        #[command(flatten)]
        target: SessionTarget,
    },
}

#[derive(Args)]
struct SessionTarget {
    /// Record the result into this session
    #[arg(long)]
    session: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaceStrategyArg {
    Embedding,
    LocalPattern,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    InProgress,
    Completed,
}

impl From<StatusArg> for SessionStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::InProgress => SessionStatus::InProgress,
            StatusArg::Completed => SessionStatus::Completed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        kyc_core::LogFormat::Json
    } else {
        kyc_core::LogFormat::Text
    };
    kyc_core::init_tracing(format, level);

    let output = execute(&cli).await;
    METRICS.flush();

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<VerificationConfig> {
    let mut config = VerificationConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = &cli.store_dir {
        config.store.root = dir.clone();
    }
    Ok(config)
}

fn open_orchestrator(config: &VerificationConfig) -> Result<Arc<SessionOrchestrator<JsonDirSessionStore>>> {
    let store = JsonDirSessionStore::new(&config.store.root).with_context(|| {
        format!(
            "Failed to open session store at {}",
            config.store.root.display()
        )
    })?;
    Ok(Arc::new(SessionOrchestrator::new(store)))
}

fn backends(config: &VerificationConfig, assume_cropped: bool) -> Backends {
    let mut backends = Backends::from_config(config);
    if assume_cropped {
        backends.face_detector = Some(Arc::new(FixedRegionDetector::full_frame()));
    }
    backends
}

/// Run the selected command and return what should be printed.
async fn execute(cli: &Cli) -> Result<Value> {
    let mut config = load_config(cli)?;

    match &cli.command {
        Commands::Session { action } => cmd_session(&config, action).await,
        Commands::Document {
            action:
                DocumentAction::Attach {
                    path,
                    session,
                    doc_type,
                },
        } => cmd_document_attach(&config, path, session, doc_type).await,
        Commands::Face {
            reference,
            probe,
            strategy,
            detector_model,
            assume_cropped,
            target,
        } => {
            config.face.strategy = match strategy {
                Some(FaceStrategyArg::Embedding) => FaceStrategyKind::Embedding,
                Some(FaceStrategyArg::LocalPattern) => FaceStrategyKind::LocalPattern,
                None if config.face.strategy == FaceStrategyKind::Embedding => {
                    tracing::info!("no face embedder available, using local_pattern");
                    FaceStrategyKind::LocalPattern
                }
                None => config.face.strategy,
            };
            if let Some(path) = detector_model {
                config.face.detector_model = Some(path.clone());
            }
            cmd_face(&config, reference, probe, *assume_cropped, target).await
        }
        Commands::Liveness {
            capture,
            video,
            target,
        } => {
            let capture = if *video {
                config.liveness.strategy = LivenessStrategyKind::Motion;
                Capture::Video(capture.clone())
            } else {
                config.liveness.strategy = LivenessStrategyKind::EyeAspectRatio;
                Capture::Still(capture.clone())
            };
            cmd_liveness(&config, capture, target).await
        }
        Commands::Risk { action } => match action {
            RiskAction::Rules {
                income,
                liabilities,
                credit_score,
                target,
            } => {
                config.risk.strategy = RiskStrategyKind::Rules;
                let inputs = RiskInputs::new(*income, *liabilities, *credit_score);
                cmd_risk(&config, inputs, target).await
            }
            RiskAction::Model {
                income,
                age,
                loan_amount,
                model,
                target,
            } => {
                config.risk.strategy = RiskStrategyKind::Model;
                if let Some(model) = model {
                    config.risk.model_path = Some(model.clone());
                }
                let inputs = RiskInputs::new(*income, *age, *loan_amount);
                cmd_risk(&config, inputs, target).await
            }
        },
    }
}

async fn cmd_session(config: &VerificationConfig, action: &SessionAction) -> Result<Value> {
    let orch = open_orchestrator(config)?;
    let value = match action {
        SessionAction::Create => serde_json::to_value(orch.create().await?)?,
        SessionAction::Show { session } => {
            serde_json::to_value(orch.get(&SessionId::from(session.as_str())).await?)?
        }
        SessionAction::List { status } => {
            serde_json::to_value(orch.list(status.map(SessionStatus::from)).await?)?
        }
        SessionAction::Complete { session } => {
            serde_json::to_value(orch.complete(&SessionId::from(session.as_str())).await?)?
        }
    };
    Ok(value)
}

async fn cmd_document_attach(
    config: &VerificationConfig,
    path: &Path,
    session: &str,
    doc_type: &str,
) -> Result<Value> {
    let service = VerificationService::new(
        open_orchestrator(config)?,
        Engines::from_config(config, Backends::default()),
    );
    let session = service
        .ingest_document(&SessionId::from(session), doc_type, path)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;
    Ok(serde_json::to_value(&session.documents[doc_type])?)
}

async fn cmd_face(
    config: &VerificationConfig,
    reference: &Path,
    probe: &Path,
    assume_cropped: bool,
    target: &SessionTarget,
) -> Result<Value> {
    let engines = Engines::from_config(config, backends(config, assume_cropped));
    let result = match &target.session {
        Some(session) => {
            let service = VerificationService::new(open_orchestrator(config)?, engines);
            service
                .verify_face(&SessionId::from(session.as_str()), reference, probe)
                .await?
        }
        None => engines.face.compare(reference, probe)?,
    };
    Ok(serde_json::to_value(result)?)
}

async fn cmd_liveness(
    config: &VerificationConfig,
    capture: Capture,
    target: &SessionTarget,
) -> Result<Value> {
    let engines = Engines::from_config(config, Backends::default());
    let result = match &target.session {
        Some(session) => {
            let service = VerificationService::new(open_orchestrator(config)?, engines);
            service
                .check_liveness(&SessionId::from(session.as_str()), capture)
                .await?
        }
        None => engines.liveness.check(&capture)?,
    };
    Ok(serde_json::to_value(result)?)
}

async fn cmd_risk(
    config: &VerificationConfig,
    inputs: RiskInputs,
    target: &SessionTarget,
) -> Result<Value> {
    let engines = Engines::from_config(config, Backends::default());
    let result = match &target.session {
        Some(session) => {
            let service = VerificationService::new(open_orchestrator(config)?, engines);
            service
                .assess_risk(&SessionId::from(session.as_str()), inputs)
                .await?
        }
        None => engines.risk.score(&inputs)?,
    };
    Ok(serde_json::to_value(result)?)
}
