//! PaLM 2 adapter for the LLM plugin host.
//!
//! [`adapter::Palm2Adapter`] implements [`plugin::LanguageModel`] on top of
//! the Vertex AI chat and embedding services from `palm2-llm`.

pub mod adapter;
pub mod config;
pub mod distance;
pub mod error;
pub mod plugin;
pub mod services;
pub mod telemetry;
pub mod types;
