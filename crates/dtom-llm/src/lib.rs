//! DtoM LLM: chat-completion collaborator
//!
//! Implements `dtom_core::MatrixCollaborator` against any OpenAI-compatible
//! `/chat/completions` endpoint. Transport and reply-shape failures surface
//! as `ServiceError`, which the core recovers from locally.

pub mod client;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod prompts;
pub mod reply;

pub use client::ChatClient;
pub use collaborator::OpenAiCollaborator;
pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LlmError, Result};
pub use reply::{parse_audit_report, parse_schema_reply};
