use async_trait::async_trait;
use common::helper::error_chain_fmt;

use crate::domain::entities::record_point::Embeddings;

/// Turns a text into a fixed-length vector
///
/// Identical texts produce identical embeddings for a given model.
#[async_trait]
pub trait EmbeddingsService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingError>;

    /// Releases the model. Later calls to `embed` fail.
    async fn shutdown(&self) {}
}

#[derive(thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embeddings model error: {0}")]
    ModelError(String),
    #[error("Embeddings model is not running anymore")]
    ModelUnavailable,
    #[error("Embeddings have {actual} dimensions, the collections expect {expected}")]
    DimensionMismatch { expected: u64, actual: usize },
}

impl std::fmt::Debug for EmbeddingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
