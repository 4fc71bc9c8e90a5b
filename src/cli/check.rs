use anyhow::Result;
use reqwest::Url;
use std::env;

use crate::config::{Config, ProxyConfig};
use crate::llm::{InferenceClient, OllamaClient};

/// Environment variables that change where requests actually go.
const ENV_VARS: [&str; 4] = ["HTTP_PROXY", "HTTPS_PROXY", "no_proxy", "OLLAMA_HOST"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Fail,
}

/// Diagnostic lines in the order the checks ran.
#[derive(Debug, Default)]
struct Diagnostics {
    lines: Vec<(Level, String)>,
}

impl Diagnostics {
    fn pass(&mut self, msg: impl Into<String>) {
        self.lines.push((Level::Ok, msg.into()));
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.lines.push((Level::Warn, msg.into()));
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.lines.push((Level::Fail, msg.into()));
    }

    fn count(&self, level: Level) -> usize {
        self.lines.iter().filter(|(l, _)| *l == level).count()
    }

    #[cfg(test)]
    fn messages(&self, level: Level) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    fn render(&self) -> String {
        let mut out = String::from("\n");
        for (level, msg) in &self.lines {
            let mark = match level {
                Level::Ok => "\u{2713}",
                Level::Warn => "!",
                Level::Fail => "\u{2717}",
            };
            out.push_str(&format!("  {} {}\n", mark, msg));
        }
        out.push_str(&format!(
            "\nconnectivity: {} ok, {} warnings, {} failures\n",
            self.count(Level::Ok),
            self.count(Level::Warn),
            self.count(Level::Fail)
        ));
        out
    }
}

pub async fn run(
    config_path: Option<String>,
    host_override: Option<String>,
    proxy_override: Option<String>,
) -> Result<()> {
    let mut results = Diagnostics::default();

    let mut config = match Config::load_with_path(config_path.clone()) {
        Ok(config) => {
            let source = config_path.as_deref().unwrap_or("default search path");
            results.pass(format!("Config loaded from {}", source));
            config
        }
        Err(e) => {
            // Reported in the diagnostics rather than propagated.
            results.error(format!("Failed to load config: {}", e));
            print!("{}", results.render());
            return Ok(());
        }
    };
    if let Some(host) = host_override {
        config.endpoint.host = host;
    }
    if let Some(proxy) = proxy_override {
        config.endpoint.proxy = ProxyConfig::both(&proxy);
    }

    // 1. Host resolves
    check_dns(&config.endpoint.host, &mut results).await;

    // 2. Proxy settings in effect
    if config.endpoint.proxy.is_empty() {
        results.pass("Proxy: none configured (environment proxies apply)");
    } else {
        results.pass(format!(
            "Proxy: http={} https={}",
            config.endpoint.proxy.http.as_deref().unwrap_or("-"),
            config.endpoint.proxy.https.as_deref().unwrap_or("-")
        ));
    }

    // 3. Endpoint lists models
    match OllamaClient::from_config(&config.endpoint) {
        Ok(client) => match client.list_models().await {
            Ok(models) => {
                let first: Vec<&str> = models.iter().take(3).map(|m| m.name.as_str()).collect();
                results.pass(format!(
                    "Endpoint {} lists {} model(s): {}",
                    client.host(),
                    models.len(),
                    first.join(", ")
                ));
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                for wanted in &config.run.models {
                    if !available.contains(&wanted.as_str()) {
                        results.warn(format!("Configured model {} is not installed", wanted));
                    }
                }
            }
            Err(e) => results.error(format!("Endpoint {}: {}", client.host(), e)),
        },
        Err(e) => results.error(format!("HTTP client: {}", e)),
    }

    // 4. Environment
    for (name, value) in env_report() {
        match value {
            Some(v) => results.pass(format!("{}={}", name, v)),
            None => results.pass(format!("{} is not set", name)),
        }
    }

    print!("{}", results.render());

    let failures = results.count(Level::Fail);
    if failures > 0 {
        anyhow::bail!("{} connectivity error(s) found", failures);
    }
    Ok(())
}

async fn check_dns(host: &str, results: &mut Diagnostics) {
    let url = match Url::parse(host) {
        Ok(url) => url,
        Err(e) => {
            results.error(format!("Host {:?} is not a valid URL: {}", host, e));
            return;
        }
    };
    let Some(name) = url.host_str() else {
        results.error(format!("Host {:?} has no hostname", host));
        return;
    };
    let port = url.port_or_known_default().unwrap_or(11434);
    let lookup = tokio::net::lookup_host((name, port)).await;
    match lookup {
        Ok(addrs) => {
            let addrs: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
            results.pass(format!("DNS: {} resolves to {}", name, addrs.join(", ")));
        }
        Err(e) => results.error(format!("DNS: {} does not resolve: {}", name, e)),
    }
}

fn env_report() -> Vec<(&'static str, Option<String>)> {
    ENV_VARS
        .iter()
        .map(|name| (*name, env::var(name).ok().filter(|v| !v.is_empty())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    async fn test_dns_localhost_resolves() {
        let mut results = Diagnostics::default();
        check_dns("http://localhost:11434", &mut results).await;
        assert_eq!(results.count(Level::Fail), 0, "{:?}", results.lines);
        assert!(results.messages(Level::Ok)[0].starts_with("DNS: localhost"));
    }

    #[tokio::test]
    async fn test_dns_rejects_invalid_url() {
        let mut results = Diagnostics::default();
        check_dns("not a url", &mut results).await;
        let failures = results.messages(Level::Fail);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("not a valid URL"));
    }

    #[test]
    fn test_render_keeps_check_order() {
        let mut results = Diagnostics::default();
        results.pass("DNS: localhost resolves to 127.0.0.1");
        results.error("Endpoint http://localhost:1: connection refused");
        results.warn("Configured model phi3:latest is not installed");
        let text = results.render();
        let dns = text.find("DNS").unwrap();
        let endpoint = text.find("Endpoint").unwrap();
        let model = text.find("Configured model").unwrap();
        assert!(dns < endpoint && endpoint < model);
        assert!(text.contains("\u{2717} Endpoint"));
        assert!(text.contains("connectivity: 1 ok, 1 warnings, 1 failures"));
    }

    #[test]
    #[serial]
    fn test_env_report_reads_ollama_host() {
        let saved = env::var("OLLAMA_HOST").ok();
        env::set_var("OLLAMA_HOST", "http://gpu-box:11434");
        let report = env_report();
        match saved {
            Some(v) => env::set_var("OLLAMA_HOST", v),
            None => env::remove_var("OLLAMA_HOST"),
        }
        let entry = report.iter().find(|(k, _)| *k == "OLLAMA_HOST").unwrap();
        assert_eq!(entry.1.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(report.len(), 4);
    }

    #[tokio::test]
    async fn test_check_fails_on_unreachable_endpoint() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = run(None, Some(format!("http://127.0.0.1:{}", port)), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connectivity error"));
    }
}
