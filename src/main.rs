use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use schemacheck::cli;
use schemacheck::cli::run::RunArgs;

#[derive(Parser)]
#[command(name = "schemacheck", version)]
#[command(about = "Test local LLMs for schema-conformant structured output", long_about = None)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ./schemacheck.toml or ~/.config/schemacheck/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a use case against each model and report per-stage outcomes
    Run {
        /// Use case to run (scheme-fibonacci, country)
        #[arg(long)]
        use_case: Option<String>,

        /// Model to test; repeat for several (default: from config)
        #[arg(short, long = "model")]
        models: Vec<String>,

        /// Inference server base URL
        #[arg(long)]
        host: Option<String>,

        /// Proxy URL for both http and https
        #[arg(long)]
        proxy: Option<String>,

        /// Skip running generated code
        #[arg(long)]
        no_exec: bool,

        /// Use canned responses instead of a live server
        #[arg(long)]
        dry_run: bool,
    },
    /// Check DNS, proxy settings, and model availability for the endpoint
    Check {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        proxy: Option<String>,
    },
    /// Validate a saved payload or chat response without calling a model
    Validate {
        /// JSON file holding the payload
        payload: String,

        #[arg(long)]
        use_case: Option<String>,

        /// Skip running generated code
        #[arg(long)]
        no_exec: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            use_case,
            models,
            host,
            proxy,
            no_exec,
            dry_run,
        } => {
            cli::run::run(RunArgs {
                use_case,
                models,
                host,
                proxy,
                config_path: cli.config,
                no_exec,
                dry_run,
            })
            .await?;
        }
        Commands::Check { host, proxy } => {
            cli::check::run(cli.config, host, proxy).await?;
        }
        Commands::Validate {
            payload,
            use_case,
            no_exec,
        } => {
            cli::validate::run(payload, use_case, cli.config, no_exec)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["schemacheck", "run"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Run {
                use_case,
                models,
                dry_run,
                no_exec,
                ..
            } => {
                assert!(use_case.is_none());
                assert!(models.is_empty());
                assert!(!dry_run);
                assert!(!no_exec);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_run_with_all_args() {
        let cli = Cli::try_parse_from([
            "schemacheck",
            "-v",
            "run",
            "--use-case",
            "country",
            "-m",
            "phi3:latest",
            "--model",
            "llama3.1:latest",
            "--host",
            "http://gpu-box:11434",
            "--proxy",
            "http://host.docker.internal:8080",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                use_case,
                models,
                host,
                proxy,
                dry_run,
                ..
            } => {
                assert_eq!(use_case.unwrap(), "country");
                assert_eq!(models, vec!["phi3:latest", "llama3.1:latest"]);
                assert_eq!(host.unwrap(), "http://gpu-box:11434");
                assert_eq!(proxy.unwrap(), "http://host.docker.internal:8080");
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "schemacheck",
            "validate",
            "out.json",
            "--no-exec",
            "--config",
            "local.toml",
        ])
        .unwrap();
        assert_eq!(cli.config.as_deref(), Some("local.toml"));
        match cli.command {
            Commands::Validate {
                payload, no_exec, ..
            } => {
                assert_eq!(payload, "out.json");
                assert!(no_exec);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_check() {
        let cli = Cli::try_parse_from(["schemacheck", "check", "--host", "http://x:1"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { host: Some(_), .. }));
    }

    #[test]
    fn test_parse_missing_subcommand() {
        assert!(Cli::try_parse_from(["schemacheck"]).is_err());
    }

    #[test]
    fn test_parse_validate_requires_payload() {
        assert!(Cli::try_parse_from(["schemacheck", "validate"]).is_err());
    }
}
