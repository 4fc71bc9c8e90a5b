//! Behavioral check for generated source files.
//!
//! The candidate is concatenated with a fixed harness, written to a temp
//! file, and run as `<interpreter> <file>` under a wall-clock bound.

use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::util::{preview, run_cmd_with_timeout, CmdOutcome};

/// Default wall-clock bound for one harness run (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Passed => write!(f, "passed"),
            Classification::Failed => write!(f, "failed"),
            Classification::Timeout => write!(f, "timeout"),
            Classification::Error => write!(f, "error"),
        }
    }
}

/// Result of code execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub classification: Classification,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.classification == Classification::Passed
    }

    /// The captured text that justifies the classification.
    pub fn evidence(&self) -> &str {
        match self.classification {
            Classification::Passed | Classification::Failed => &self.stdout,
            Classification::Timeout | Classification::Error => &self.stderr,
        }
    }

    /// One-line description for error messages.
    pub fn summary(&self) -> String {
        let evidence = self.evidence().trim();
        if evidence.is_empty() {
            format!("no output after {:.2}s", self.elapsed.as_secs_f64())
        } else {
            preview(evidence, 200)
        }
    }
}

/// Fixed, use-case-specific test program appended to every candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harness {
    pub interpreter: String,
    /// Temp file suffix, e.g. `.scm`.
    pub suffix: String,
    pub source: String,
    /// Text the harness prints when every test vector matches.
    pub success_marker: String,
}

/// Seam between the report assembler and the subprocess runner.
pub trait CodeVerifier: Send + Sync {
    fn verify(&self, candidate: &str) -> ExecutionResult;
}

pub struct ExecutionVerifier {
    harness: Harness,
    timeout: Duration,
}

impl ExecutionVerifier {
    pub fn new(harness: Harness) -> Self {
        Self {
            harness,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.harness.interpreter = interpreter.to_string();
        self
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn error(&self, message: String, start: Instant) -> ExecutionResult {
        ExecutionResult {
            classification: Classification::Error,
            stdout: String::new(),
            stderr: message,
            elapsed: start.elapsed(),
        }
    }
}

impl CodeVerifier for ExecutionVerifier {
    fn verify(&self, candidate: &str) -> ExecutionResult {
        let start = Instant::now();

        // The file is removed when `script` drops, on every return path.
        let mut script = match tempfile::Builder::new()
            .prefix("schemacheck-")
            .suffix(&self.harness.suffix)
            .tempfile()
        {
            Ok(file) => file,
            Err(e) => return self.error(format!("Failed to create temp file: {}", e), start),
        };

        let program = format!("{}\n{}", candidate, self.harness.source);
        if let Err(e) = script
            .write_all(program.as_bytes())
            .and_then(|_| script.flush())
        {
            return self.error(format!("Failed to write temp file: {}", e), start);
        }

        debug!(
            "Running {} {} ({} bytes)",
            self.harness.interpreter,
            script.path().display(),
            program.len()
        );

        let mut cmd = Command::new(&self.harness.interpreter);
        cmd.arg(script.path());

        match run_cmd_with_timeout(cmd, self.timeout) {
            Ok(CmdOutcome::Completed(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let classification = if !output.status.success() {
                    Classification::Error
                } else if stdout.contains(&self.harness.success_marker) {
                    Classification::Passed
                } else {
                    Classification::Failed
                };
                match classification {
                    Classification::Passed => info!("✓ Harness passed"),
                    _ => warn!("✗ Harness {} ({})", classification, output.status),
                }
                ExecutionResult {
                    classification,
                    stdout,
                    stderr,
                    elapsed: start.elapsed(),
                }
            }
            Ok(CmdOutcome::TimedOut) => {
                warn!("Harness timed out after {:?}", self.timeout);
                ExecutionResult {
                    classification: Classification::Timeout,
                    stdout: String::new(),
                    stderr: format!("Timeout after {}s", self.timeout.as_secs_f64()),
                    elapsed: start.elapsed(),
                }
            }
            Err(e) => self.error(
                format!("Failed to launch {}: {}", self.harness.interpreter, e),
                start,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_harness() -> Harness {
        Harness {
            interpreter: "sh".to_string(),
            suffix: ".sh".to_string(),
            source: r#"if [ "$(answer)" = "42" ]; then echo "All tests passed!"; else echo "Tests failed!"; fi"#
                .to_string(),
            success_marker: "All tests passed!".to_string(),
        }
    }

    #[test]
    fn test_classification_display() {
        assert_eq!(Classification::Passed.to_string(), "passed");
        assert_eq!(Classification::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_evidence_follows_classification() {
        let result = ExecutionResult {
            classification: Classification::Error,
            stdout: "out".to_string(),
            stderr: "boom".to_string(),
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(result.evidence(), "boom");
        assert!(!result.success());
    }

    #[test]
    fn test_summary_without_output_mentions_elapsed() {
        let result = ExecutionResult {
            classification: Classification::Failed,
            stdout: "  ".to_string(),
            stderr: String::new(),
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(result.summary(), "no output after 1.50s");
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_passes_correct_candidate() {
        let verifier = ExecutionVerifier::new(sh_harness());
        let result = verifier.verify("answer() { echo 42; }");
        assert_eq!(result.classification, Classification::Passed);
        assert!(result.evidence().contains("All tests passed!"));
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_wrong_result_is_failed() {
        let verifier = ExecutionVerifier::new(sh_harness());
        let result = verifier.verify("answer() { echo 41; }");
        assert_eq!(result.classification, Classification::Failed);
        assert!(result.stdout.contains("Tests failed!"));
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_nonzero_exit_is_error_with_stderr() {
        let verifier = ExecutionVerifier::new(sh_harness());
        let result = verifier.verify("echo broken >&2; exit 2");
        assert_eq!(result.classification, Classification::Error);
        assert!(result.stderr.contains("broken"));
    }

    #[test]
    fn test_verify_missing_interpreter_is_error() {
        let verifier =
            ExecutionVerifier::new(sh_harness()).with_interpreter("/nonexistent/guile-xyz");
        let result = verifier.verify("answer() { echo 42; }");
        assert_eq!(result.classification, Classification::Error);
        assert!(result.stderr.contains("Failed to launch"));
    }

    #[test]
    fn test_default_timeout_is_five_seconds() {
        let verifier = ExecutionVerifier::new(sh_harness());
        assert_eq!(verifier.timeout(), Duration::from_secs(5));
    }
}
