//! Inference endpoint clients.

pub mod client;
pub mod client_impl;
pub mod factory;

pub use client::{InferenceClient, MockInferenceClient, ModelTag};
pub use client_impl::OllamaClient;
