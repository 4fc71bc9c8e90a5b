//! Per-model orchestration and the run summary.
//!
//! Each model walks `REQUESTED → DECODED → STRUCTURALLY_VALID → CONTENT_VALID
//! → [EXECUTED] → REPORTED`. A failure at any stage is recorded with the stage
//! that raised it and the run moves on to the next model.

use serde_json::{Map, Value};
use std::fmt;
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, warn};

use crate::error::{InferenceError, RunError};
use crate::executor::{CodeVerifier, ExecutionResult, ExecutionVerifier};
use crate::llm::InferenceClient;
use crate::usecase::{FileArtifact, UseCase};
use crate::util::preview;
use crate::validator::{ContentValidator, FieldOutcome, ValidationOutcome};

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Requested,
    Decoded,
    StructurallyValid,
    ContentValid,
    Executed,
    Reported,
}

impl Stage {
    /// Short name of the work done to reach this stage.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Requested => "request",
            Stage::Decoded => "decode",
            Stage::StructurallyValid => "schema",
            Stage::ContentValid => "content",
            Stage::Executed => "execution",
            Stage::Reported => "report",
        }
    }

    fn may_follow(self, previous: Option<Stage>) -> bool {
        matches!(
            (previous, self),
            (None, Stage::Requested)
                | (Some(Stage::Requested), Stage::Decoded)
                | (Some(Stage::Decoded), Stage::StructurallyValid)
                | (Some(Stage::StructurallyValid), Stage::ContentValid)
                | (Some(Stage::ContentValid), Stage::Executed)
                | (Some(Stage::ContentValid), Stage::Reported)
                | (Some(Stage::Executed), Stage::Reported)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Requested => "REQUESTED",
            Stage::Decoded => "DECODED",
            Stage::StructurallyValid => "STRUCTURALLY_VALID",
            Stage::ContentValid => "CONTENT_VALID",
            Stage::Executed => "EXECUTED",
            Stage::Reported => "REPORTED",
        };
        write!(f, "{}", name)
    }
}

/// Absorbing failure state: the stage that was being attempted and why it
/// did not complete.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: RunError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FAILED({}): {}", self.stage.label(), self.error)
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactExecution {
    pub filename: String,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub model: String,
    pub use_case: String,
    /// Stages reached, in order.
    pub trail: Vec<Stage>,
    pub failure: Option<StageFailure>,
    pub fields: Vec<FieldOutcome>,
    pub files: Vec<FileArtifact>,
    pub executions: Vec<ArtifactExecution>,
    pub latency: Duration,
}

impl ValidationReport {
    fn new(model: &str, use_case: &str) -> Self {
        Self {
            model: model.to_string(),
            use_case: use_case.to_string(),
            trail: Vec::new(),
            failure: None,
            fields: Vec::new(),
            files: Vec::new(),
            executions: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug_assert!(self.failure.is_none(), "no transitions out of FAILED");
        debug_assert!(
            stage.may_follow(self.last_stage()),
            "illegal transition {:?} -> {}",
            self.last_stage(),
            stage
        );
        self.trail.push(stage);
    }

    fn fail(&mut self, stage: Stage, error: RunError) {
        warn!("{} failed at {}: {}", self.model, stage.label(), error);
        self.failure = Some(StageFailure { stage, error });
    }

    pub fn last_stage(&self) -> Option<Stage> {
        self.trail.last().copied()
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.last_stage() == Some(Stage::Reported)
    }

    pub fn reached(&self, stage: Stage) -> bool {
        self.trail.contains(&stage)
    }

    /// Human-readable block for this model.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Model: {} ===", self.model);
        let status = match &self.failure {
            None => "✅ REPORTED".to_string(),
            Some(failure) => format!("❌ {}", failure),
        };
        let _ = writeln!(
            out,
            "Status: {} ({:.2}s)",
            status,
            self.latency.as_secs_f64()
        );
        let trail: Vec<String> = self.trail.iter().map(|s| s.to_string()).collect();
        let _ = writeln!(out, "Stages: {}", trail.join(" → "));

        if !self.fields.is_empty() {
            let _ = writeln!(out, "Fields:");
            for field in &self.fields {
                match &field.outcome {
                    ValidationOutcome::Valid => {
                        let _ = writeln!(out, "  ✓ {}", field.path);
                    }
                    ValidationOutcome::Invalid(msg) => {
                        let _ = writeln!(out, "  ✗ {}: {}", field.path, msg);
                    }
                }
            }
        }

        if !self.files.is_empty() {
            let _ = writeln!(out, "Files:");
            for file in &self.files {
                let _ = writeln!(
                    out,
                    "  - {}: {}",
                    file.filename,
                    preview(&file.contents, PREVIEW_CHARS).replace('\n', "\n    ")
                );
            }
        }

        if !self.executions.is_empty() {
            let _ = writeln!(out, "Execution:");
            for exec in &self.executions {
                let _ = writeln!(
                    out,
                    "  {}: {} ({:.2}s)",
                    exec.filename,
                    exec.result.classification,
                    exec.result.elapsed.as_secs_f64()
                );
                let evidence = exec.result.evidence().trim();
                if !evidence.is_empty() {
                    let _ = writeln!(out, "    {}", evidence.replace('\n', "\n    "));
                }
            }
        }

        out
    }
}

/// Every report of one run, in model order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub use_case: String,
    pub reports: Vec<ValidationReport>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            out.push_str(&report.render());
            out.push('\n');
        }
        let _ = writeln!(
            out,
            "=== Summary ({}): {}/{} models passed ===",
            self.use_case,
            self.passed(),
            self.reports.len()
        );
        for report in &self.reports {
            let outcome = match &report.failure {
                None => "passed".to_string(),
                Some(f) => format!("failed at {} ({})", f.stage.label(), f.error.class()),
            };
            let _ = writeln!(
                out,
                "  {:<40} {:>7.2}s  {}",
                report.model,
                report.latency.as_secs_f64(),
                outcome
            );
        }
        out
    }
}

pub struct ReportAssembler<'a> {
    client: &'a dyn InferenceClient,
    use_case: &'a UseCase,
    validator: ContentValidator,
    verifier: Option<Box<dyn CodeVerifier + 'a>>,
}

impl<'a> ReportAssembler<'a> {
    /// Uses the use case's own harness for executable artifacts.
    pub fn new(client: &'a dyn InferenceClient, use_case: &'a UseCase) -> Self {
        let verifier = use_case.execution.as_ref().map(|spec| {
            Box::new(ExecutionVerifier::new(spec.harness.clone())) as Box<dyn CodeVerifier + 'a>
        });
        Self {
            client,
            use_case,
            validator: ContentValidator::new(use_case.rules.clone()),
            verifier,
        }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn CodeVerifier + 'a>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Skip the behavioral stage entirely.
    pub fn without_execution(mut self) -> Self {
        self.verifier = None;
        self
    }

    /// Assess each model in turn. One model's failure never stops the run.
    pub async fn run(&self, models: &[String]) -> RunSummary {
        let mut reports = Vec::with_capacity(models.len());
        for model in models {
            info!("=== Testing model: {} ===", model);
            reports.push(self.assess(model).await);
        }
        RunSummary {
            use_case: self.use_case.name.clone(),
            reports,
        }
    }

    /// Request, decode, validate, and execute for a single model.
    pub async fn assess(&self, model: &str) -> ValidationReport {
        let start = Instant::now();
        let mut report = ValidationReport::new(model, &self.use_case.name);
        report.advance(Stage::Requested);

        let schema = self.use_case.contract.to_json_schema();
        match self
            .client
            .chat_structured(model, &self.use_case.prompt, &schema)
            .await
        {
            Ok(payload) => {
                info!("Response received in {:.2}s", start.elapsed().as_secs_f64());
                report.advance(Stage::Decoded);
                self.check_decoded(&mut report, Value::Object(payload));
            }
            Err(err) => {
                let stage = match err {
                    InferenceError::Transport(_) => Stage::Requested,
                    InferenceError::Decode(_) => Stage::Decoded,
                };
                report.fail(stage, err.into());
            }
        }

        report.latency = start.elapsed();
        report
    }

    /// Validate a payload obtained elsewhere (e.g. read from disk).
    pub fn assess_payload(&self, model: &str, payload: Value) -> ValidationReport {
        let start = Instant::now();
        let mut report = ValidationReport::new(model, &self.use_case.name);
        report.advance(Stage::Requested);
        report.advance(Stage::Decoded);
        self.check_decoded(&mut report, payload);
        report.latency = start.elapsed();
        report
    }

    fn check_decoded(&self, report: &mut ValidationReport, payload: Value) {
        let payload = match self.use_case.contract.validate(&payload) {
            Ok(map) => map,
            Err(violation) => {
                report.fail(
                    Stage::StructurallyValid,
                    RunError::SchemaValidation(violation),
                );
                return;
            }
        };
        report.advance(Stage::StructurallyValid);
        report.files = self.use_case.artifacts(&payload);

        let outcome = self
            .validator
            .validate_payload(&payload, &self.use_case.contract);
        report.fields = outcome.fields.clone();
        if !outcome.is_valid() {
            report.fail(
                Stage::ContentValid,
                RunError::ContentValidation(outcome.failures()),
            );
            return;
        }
        report.advance(Stage::ContentValid);

        if self.execute(report, &payload) {
            report.advance(Stage::Reported);
        }
    }

    /// Returns false when an executable artifact did not pass.
    fn execute(&self, report: &mut ValidationReport, payload: &Map<String, Value>) -> bool {
        let artifacts = self.use_case.executable_artifacts(payload);
        if artifacts.is_empty() {
            return true;
        }
        let Some(verifier) = &self.verifier else {
            info!(
                "Execution disabled, skipping {} executable file(s)",
                artifacts.len()
            );
            return true;
        };

        for artifact in &artifacts {
            info!("Testing {} ...", artifact.filename.trim());
            let result = run_blocking(|| verifier.verify(&artifact.contents));
            report.executions.push(ArtifactExecution {
                filename: artifact.filename.trim().to_string(),
                result,
            });
        }

        let first_failure = report
            .executions
            .iter()
            .find(|e| !e.result.success())
            .cloned();
        match first_failure {
            Some(exec) => {
                report.fail(
                    Stage::Executed,
                    RunError::Execution {
                        filename: exec.filename,
                        result: exec.result,
                    },
                );
                false
            }
            None => {
                report.advance(Stage::Executed);
                true
            }
        }
    }
}

/// Run a blocking subprocess wait without stalling other tasks on a
/// multi-threaded runtime. Elsewhere the call runs inline.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
