//! LLM client abstraction for Docent.
//!
//! This crate provides the language-model collaborator used by the research
//! pipeline: a provider-agnostic request/response model, the [`LlmBackend`]
//! trait, an OpenAI-compatible HTTP backend, and a scripted [`MockBackend`]
//! for tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  LlmBackend trait                            │
//! │  - complete(CompletionRequest) -> Response   │
//! │  - response_format: Text | JsonSchema        │
//! │  - include_thoughts toggle                   │
//! └──────────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌───────────────┐   ┌─────────────┐
//!   │ OpenAiBackend │   │ MockBackend │
//!   │ (OpenAI,      │   │ (tests)     │
//!   │  Gemini,      │   └─────────────┘
//!   │  Groq, Ollama)│
//!   └───────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{LlmBackend, MockBackend, SharedBackend, with_retry};
pub use error::{LlmError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, ResponseFormat, Role,
    StopReason, Usage,
};

pub use openai::{OpenAiBackend, OpenAiConfig, create_shared_backend};
