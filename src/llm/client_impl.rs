use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::debug;

use super::client::{InferenceClient, ModelTag};
use crate::config::{EndpointConfig, ProxyConfig};
use crate::error::{DecodeError, InferenceError, TransportError};

// ============================================================================
// Ollama Client
// ============================================================================

pub struct OllamaClient {
    host: String,
    chat_timeout: Duration,
    tags_timeout: Duration,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

impl OllamaClient {
    pub fn new(host: &str, proxy: &ProxyConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(url) = &proxy.http {
            builder = builder.proxy(
                Proxy::http(url).map_err(|e| TransportError::Other(format!("bad proxy: {}", e)))?,
            );
        }
        if let Some(url) = &proxy.https {
            builder = builder.proxy(
                Proxy::https(url)
                    .map_err(|e| TransportError::Other(format!("bad proxy: {}", e)))?,
            );
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            chat_timeout: Duration::from_secs(30),
            tags_timeout: Duration::from_secs(5),
            client,
        })
    }

    pub fn from_config(endpoint: &EndpointConfig) -> Result<Self, TransportError> {
        Ok(Self::new(&endpoint.host, &endpoint.proxy)?
            .with_timeouts(endpoint.chat_timeout(), endpoint.tags_timeout()))
    }

    pub fn with_timeouts(mut self, chat: Duration, tags: Duration) -> Self {
        self.chat_timeout = chat;
        self.tags_timeout = tags;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn chat_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Map<String, Value>, InferenceError> {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            format: schema,
        };

        let url = format!("{}/api/chat", self.host);
        debug!("POST {} with model: {}", url, model);

        let response = self
            .client
            .post(&url)
            .timeout(self.chat_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify(&e, self.chat_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify(&e, self.chat_timeout))?;

        if status != StatusCode::OK {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(decode_chat_response(&body)?)
    }

    async fn list_models(&self) -> Result<Vec<ModelTag>, InferenceError> {
        let url = format!("{}/api/tags", self.host);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.tags_timeout)
            .send()
            .await
            .map_err(|e| classify(&e, self.tags_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify(&e, self.tags_timeout))?;

        if status != StatusCode::OK {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let tags: TagsResponse =
            serde_json::from_str(&body).map_err(|e| DecodeError::Body(e.to_string()))?;
        Ok(tags.models)
    }
}

/// Pull the structured payload out of a `/api/chat` response body.
/// `message.content` may hold the object itself or a JSON string encoding it.
pub fn decode_chat_response(body: &str) -> Result<Map<String, Value>, DecodeError> {
    let response: Value =
        serde_json::from_str(body).map_err(|e| DecodeError::Body(e.to_string()))?;

    let content = response
        .get("message")
        .and_then(|m| m.get("content"))
        .ok_or(DecodeError::MissingContent)?;

    let content = match content {
        Value::String(text) => serde_json::from_str::<Value>(text)
            .map_err(|e| DecodeError::Content(format!("{} in {:?}", e, text)))?,
        other => other.clone(),
    };

    match content {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::Content(other.to_string())),
    }
}

/// Map a reqwest failure onto the transport taxonomy.
fn classify(err: &reqwest::Error, timeout: Duration) -> TransportError {
    let chain = error_chain(err);
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        let lower = chain.to_lowercase();
        if lower.contains("dns")
            || lower.contains("failed to lookup")
            || lower.contains("name or service not known")
            || lower.contains("nodename nor servname")
        {
            TransportError::Dns(chain)
        } else {
            TransportError::ConnectionRefused(chain)
        }
    } else {
        TransportError::Other(chain)
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

// ============================================================================
// Tests
// ============================================================================
