use anyhow::{Context, Result};

use super::client::{InferenceClient, MockInferenceClient};
use super::client_impl::OllamaClient;
use crate::config::Config;

/// Create an inference client based on configuration
pub fn create_client(config: &Config, dry_run: bool) -> Result<Box<dyn InferenceClient>> {
    if dry_run {
        return Ok(Box::new(MockInferenceClient::new()));
    }

    let client = OllamaClient::from_config(&config.endpoint)
        .with_context(|| format!("Failed to create client for {}", config.endpoint.host))?;
    Ok(Box::new(client))
}
