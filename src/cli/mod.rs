pub mod check;
pub mod run;
pub mod validate;

use crate::config::ExecutionConfig;
use crate::executor::ExecutionVerifier;
use crate::usecase::UseCase;

/// Build the verifier for a use case with config overrides applied.
/// `None` when the use case has nothing to run or execution is disabled.
pub(crate) fn verifier_for(use_case: &UseCase, exec: &ExecutionConfig) -> Option<ExecutionVerifier> {
    if !exec.enabled {
        return None;
    }
    let spec = use_case.execution.as_ref()?;
    let mut verifier = ExecutionVerifier::new(spec.harness.clone()).with_timeout(exec.timeout());
    if let Some(interpreter) = &exec.interpreter {
        verifier = verifier.with_interpreter(interpreter);
    }
    Some(verifier)
}
