//! Error taxonomy shared by every stage of a validation run.
//!
//! Each stage owns one variant of [`RunError`]. The report assembler wraps
//! the variant in a stage failure instead of propagating it, so a bad model
//! never aborts the rest of the run.

use std::time::Duration;
use thiserror::Error;

use crate::executor::ExecutionResult;
use crate::validator::FieldFailure;

/// Network-level failure talking to the inference endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Short classification label used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::ConnectionRefused(_) => "connection-refused",
            TransportError::Dns(_) => "dns",
            TransportError::Timeout(_) => "timeout",
            TransportError::Status { .. } => "status",
            TransportError::Other(_) => "other",
        }
    }
}

/// The endpoint answered, but the body was not the expected shape.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("response body is not valid JSON: {0}")]
    Body(String),

    #[error("response has no message.content")]
    MissingContent,

    #[error("message.content is not a JSON object: {0}")]
    Content(String),
}

/// Anything the inference client can return instead of a payload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Structural mismatch between a payload and its schema contract.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaViolation {
    #[error("`{path}` must be an object, got {actual}")]
    NotAnObject { path: String, actual: &'static str },

    #[error("missing required field `{path}`")]
    MissingField { path: String },

    #[error("field `{path}` should be {expected}, got {actual}")]
    WrongType {
        path: String,
        expected: String,
        actual: &'static str,
    },
}

impl SchemaViolation {
    pub fn path(&self) -> &str {
        match self {
            SchemaViolation::NotAnObject { path, .. }
            | SchemaViolation::MissingField { path }
            | SchemaViolation::WrongType { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunError {
    #[error("TransportError ({}): {}", .0.kind(), .0)]
    Transport(TransportError),

    #[error("DecodeError: {0}")]
    Decode(DecodeError),

    #[error("SchemaValidationError: {0}")]
    SchemaValidation(SchemaViolation),

    #[error("ContentValidationError: {}", join_failures(.0))]
    ContentValidation(Vec<FieldFailure>),

    #[error("ExecutionError ({}) in {}: {}", .result.classification, .filename, .result.summary())]
    Execution {
        filename: String,
        result: ExecutionResult,
    },

    #[error("unknown use case: {0}")]
    UnknownUseCase(String),

    #[error("invalid rule in use case {use_case}: {reason}")]
    InvalidRule { use_case: String, reason: String },
}

impl RunError {
    /// Name of the error class, as shown in reports.
    pub fn class(&self) -> &'static str {
        match self {
            RunError::Transport(_) => "TransportError",
            RunError::Decode(_) => "DecodeError",
            RunError::SchemaValidation(_) => "SchemaValidationError",
            RunError::ContentValidation(_) => "ContentValidationError",
            RunError::Execution { .. } => "ExecutionError",
            RunError::UnknownUseCase(_) => "UnknownUseCase",
            RunError::InvalidRule { .. } => "InvalidRule",
        }
    }
}

impl From<InferenceError> for RunError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Transport(e) => RunError::Transport(e),
            InferenceError::Decode(e) => RunError::Decode(e),
        }
    }
}

fn join_failures(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
