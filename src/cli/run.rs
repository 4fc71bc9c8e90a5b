use anyhow::{bail, Result};
use tracing::info;

use crate::cli::verifier_for;
use crate::config::{Config, ProxyConfig};
use crate::llm::factory;
use crate::report::ReportAssembler;
use crate::usecase;

/// Command-line overrides for `run`, applied on top of the loaded config.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub use_case: Option<String>,
    pub models: Vec<String>,
    pub host: Option<String>,
    pub proxy: Option<String>,
    pub config_path: Option<String>,
    pub no_exec: bool,
    pub dry_run: bool,
}

pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(name) = &args.use_case {
        config.run.use_case = name.clone();
    }
    if !args.models.is_empty() {
        config.run.models = args.models.clone();
    }
    if let Some(host) = &args.host {
        config.endpoint.host = host.clone();
    }
    if let Some(proxy) = &args.proxy {
        config.endpoint.proxy = ProxyConfig::both(proxy);
    }
    if args.no_exec {
        config.execution.enabled = false;
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::load_with_path(args.config_path.clone())?;
    apply_overrides(&mut config, &args);

    let case = usecase::lookup(&config.run.use_case)?;
    info!("Use case: {} ({})", case.name, case.description);
    info!("Endpoint: {}", config.endpoint.host);
    info!("Models: {}", config.run.models.join(", "));
    info!("Dry run: {}", args.dry_run);

    if config.run.models.is_empty() {
        bail!("No models configured. Pass --model or set [run] models in config");
    }

    let client = factory::create_client(&config, args.dry_run)?;
    let mut assembler = ReportAssembler::new(client.as_ref(), &case);
    assembler = match verifier_for(&case, &config.execution) {
        Some(verifier) => assembler.with_verifier(Box::new(verifier)),
        None => assembler.without_execution(),
    };

    let summary = assembler.run(&config.run.models).await;
    println!("{}", summary.render());

    if !summary.all_passed() {
        bail!(
            "{} of {} model(s) failed",
            summary.failed(),
            summary.reports.len()
        );
    }
    Ok(())
}
