use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::{DecodeError, InferenceError};

/// One entry of the endpoint's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTag {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Schema-constrained chat against an inference endpoint.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's decision.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Ask `model` for output shaped by `schema` and return the decoded object.
    async fn chat_structured(
        &self,
        model: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Map<String, Value>, InferenceError>;

    /// List the models the endpoint can serve.
    async fn list_models(&self) -> Result<Vec<ModelTag>, InferenceError>;
}

/// Canned responses for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MockInferenceClient {
    responses: HashMap<String, Result<Value, InferenceError>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `model` with `payload` regardless of the prompt.
    pub fn with_payload(mut self, model: &str, payload: Value) -> Self {
        self.responses.insert(model.to_string(), Ok(payload));
        self
    }

    pub fn with_error(mut self, model: &str, error: InferenceError) -> Self {
        self.responses.insert(model.to_string(), Err(error));
        self
    }

    /// Pick a plausible payload from the prompt text.
    fn default_payload(prompt: &str) -> Value {
        if prompt.contains("Fibonacci") {
            json!({
                "overview": "Implements fibonacci using tail recursion in scheme",
                "files": [
                    {
                        "filename": "fib.scm",
                        "contents": MOCK_FIB_SCM,
                    },
                    {
                        "filename": "README.md",
                        "contents": "# fib-tail\n\nTail recursion keeps the stack flat.\n",
                    }
                ]
            })
        } else if prompt.contains("Canada") {
            json!({
                "name": "Canada",
                "capital": "Ottawa",
                "languages": ["English", "French"],
            })
        } else {
            json!({"status": "mock"})
        }
    }
}

const MOCK_FIB_SCM: &str = ";; fib-tail: iterative fibonacci with an accumulator
(define (fib-tail n)
  (define (loop i accumulator next)
    (if (= i 0)
        accumulator
        (loop (- i 1) next (+ accumulator next))))
  (loop n 0 1))
";

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn chat_structured(
        &self,
        model: &str,
        prompt: &str,
        _schema: &Value,
    ) -> Result<Map<String, Value>, InferenceError> {
        let value = match self.responses.get(model) {
            Some(response) => response.clone()?,
            None => Self::default_payload(prompt),
        };
        match value {
            Value::Object(map) => Ok(map),
            other => Err(DecodeError::Content(other.to_string()).into()),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelTag>, InferenceError> {
        let mut names: Vec<&String> = self.responses.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ModelTag {
                name: name.clone(),
                size: None,
                modified_at: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[tokio::test]
    async fn test_mock_default_fib_payload() {
        let client = MockInferenceClient::new();
        let payload = client
            .chat_structured("any", "Create a Scheme implementation of the Fibonacci sequence", &json!({}))
            .await
            .unwrap();
        assert!(payload["overview"].as_str().unwrap().contains("fibonacci"));
        assert_eq!(payload["files"][0]["filename"], "fib.scm");
    }

    #[tokio::test]
    async fn test_mock_per_model_error() {
        let client = MockInferenceClient::new().with_error(
            "broken",
            TransportError::Status {
                status: 500,
                body: String::new(),
            }
            .into(),
        );
        let err = client
            .chat_structured("broken", "p", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Transport(_)));
    }

    #[tokio::test]
    async fn test_mock_non_object_payload_is_decode_error() {
        let client = MockInferenceClient::new().with_payload("m", json!([1, 2]));
        let err = client.chat_structured("m", "p", &json!({})).await.unwrap_err();
        assert!(matches!(err, InferenceError::Decode(DecodeError::Content(_))));
    }

    #[tokio::test]
    async fn test_mock_lists_configured_models() {
        let client = MockInferenceClient::new()
            .with_payload("b", json!({}))
            .with_payload("a", json!({}));
        let names: Vec<String> = client
            .list_models()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
