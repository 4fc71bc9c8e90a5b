//! OllamaClient against a mock HTTP endpoint

use mockito::Matcher;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

use schemacheck::config::ProxyConfig;
use schemacheck::error::{DecodeError, InferenceError, TransportError};
use schemacheck::llm::{InferenceClient, OllamaClient};

fn client_for(url: &str) -> OllamaClient {
    OllamaClient::new(url, &ProxyConfig::default()).unwrap()
}

#[tokio::test]
async fn test_chat_sends_schema_and_decodes_object() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "phi3:latest",
            "stream": false,
            "messages": [{"role": "user", "content": "Tell me about Canada."}],
            "format": {"type": "object"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message": {"role": "assistant", "content": {"name": "Canada"}}, "done": true}"#)
        .create_async()
        .await;

    let client = client_for(&server.url());
    let payload = client
        .chat_structured("phi3:latest", "Tell me about Canada.", &json!({"type": "object"}))
        .await
        .unwrap();
    assert_eq!(payload["name"], "Canada");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_chat_decodes_string_encoded_content() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(r#"{"message": {"content": "{\"capital\": \"Ottawa\"}"}}"#)
        .create_async()
        .await;

    let payload = client_for(&server.url())
        .chat_structured("m", "p", &json!({}))
        .await
        .unwrap();
    assert_eq!(payload["capital"], "Ottawa");
}

#[tokio::test]
async fn test_non_200_preserves_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(503)
        .with_body("model is loading")
        .create_async()
        .await;

    let err = client_for(&server.url())
        .chat_structured("m", "p", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        InferenceError::Transport(TransportError::Status {
            status: 503,
            body: "model is loading".to_string(),
        })
    );
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body("{not json")
        .create_async()
        .await;

    let err = client_for(&server.url())
        .chat_structured("m", "p", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Decode(DecodeError::Body(_))));
}

#[tokio::test]
async fn test_prose_content_is_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(r#"{"message": {"content": "Here is the JSON you asked for"}}"#)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .chat_structured("m", "p", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::Decode(DecodeError::Content(_))));
}

#[tokio::test]
async fn test_list_models() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(
            r#"{"models": [
                {"name": "phi3:latest", "size": 2176178913, "modified_at": "2024-05-01T10:00:00Z"},
                {"name": "llama3.1:latest"}
            ]}"#,
        )
        .create_async()
        .await;

    let models = client_for(&server.url()).list_models().await.unwrap();
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["phi3:latest", "llama3.1:latest"]);
    assert_eq!(models[0].size, Some(2176178913));
    assert_eq!(models[1].size, None);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_secs(2));
            w.write_all(br#"{"models": []}"#)
        })
        .create_async()
        .await;

    let client = client_for(&server.url())
        .with_timeouts(Duration::from_secs(30), Duration::from_millis(300));
    let err = client.list_models().await.unwrap_err();
    assert_eq!(
        err,
        InferenceError::Transport(TransportError::Timeout(Duration::from_millis(300)))
    );
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = client_for(&format!("http://127.0.0.1:{}", port));
    let err = client.chat_structured("m", "p", &json!({})).await.unwrap_err();
    match err {
        InferenceError::Transport(TransportError::ConnectionRefused(_)) => {}
        other => panic!("expected connection refused, got {:?}", other),
    }
}
