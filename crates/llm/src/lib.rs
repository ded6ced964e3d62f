//! Vendor boundary for the PaLM 2 adapter: service traits, Vertex AI
//! HTTP clients and Google service-account authentication.

pub mod auth;
pub mod http;
pub mod provider;
