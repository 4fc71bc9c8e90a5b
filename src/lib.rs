//! schemacheck - Check whether local LLMs honor a structured-output contract
//!
//! Sends a schema-constrained chat request to each configured model, then
//! walks the reply through structural validation, per-field content rules,
//! and (for code-producing use cases) execution under a real interpreter.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod report;
pub mod schema;
pub mod usecase;
pub mod util;
pub mod validator;
