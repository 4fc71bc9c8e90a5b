use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::cli::verifier_for;
use crate::config::Config;
use crate::llm::client_impl::decode_chat_response;
use crate::llm::MockInferenceClient;
use crate::report::{ReportAssembler, ValidationReport};
use crate::usecase;

/// Read a saved payload. A full `/api/chat` response body is unwrapped to its
/// `message.content`; anything else is taken as the payload itself.
pub fn read_payload(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Payload is not JSON: {}", path.display()))?;
    if value.get("message").and_then(|m| m.get("content")).is_some() {
        let map = decode_chat_response(&text)?;
        return Ok(Value::Object(map));
    }
    Ok(value)
}

pub fn run(
    payload_path: String,
    use_case: Option<String>,
    config_path: Option<String>,
    no_exec: bool,
) -> Result<()> {
    let config = Config::load_with_path(config_path)?;
    let name = use_case.unwrap_or_else(|| config.run.use_case.clone());
    let case = usecase::lookup(&name)?;
    info!("Validating {} against {}", payload_path, case.name);

    let report = assess_file(Path::new(&payload_path), &case, &config, no_exec)?;
    println!("{}", report.render());

    if !report.passed() {
        bail!("{} did not validate", payload_path);
    }
    Ok(())
}

fn assess_file(
    path: &Path,
    case: &usecase::UseCase,
    config: &Config,
    no_exec: bool,
) -> Result<ValidationReport> {
    let payload = read_payload(path)?;
    // Offline: the client is never called from assess_payload.
    let client = MockInferenceClient::new();
    let assembler = ReportAssembler::new(&client, case);
    let assembler = match verifier_for(case, &config.execution) {
        Some(verifier) if !no_exec => assembler.with_verifier(Box::new(verifier)),
        _ => assembler.without_execution(),
    };
    Ok(assembler.assess_payload(&path.display().to_string(), payload))
}
