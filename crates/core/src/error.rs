use palm2_llm::provider::LlmError;

use crate::config::ConfigError;

/// Error type for adapter operations. Vendor failures pass through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("unmapped conversation role: {0:?}")]
    UnmappedRole(String),
    #[error("embedding service returned {got} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, got: usize },
    #[error("embedding dimension {got} does not match {expected}")]
    EmbeddingDimensionMismatch { expected: usize, got: usize },
}
