use async_trait::async_trait;
use common::helper::error_chain_fmt;

use crate::domain::entities::record_point::{Embeddings, RecordMatch, RecordPoint};

/// A vector collection store: the persistence and the nearest-neighbors search happen there
#[async_trait]
pub trait RecordPointRepository: Send + Sync {
    /// Creates the collection if it does not exist yet
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        distance: &str,
    ) -> Result<(), StorageError>;

    /// Inserts the point, or fully replaces the point having the same id
    async fn upsert(&self, collection_name: &str, point: RecordPoint) -> Result<(), StorageError>;

    /// Returns at most `limit` points, closest first
    async fn search(
        &self,
        collection_name: &str,
        vector: Embeddings,
        limit: u64,
    ) -> Result<Vec<RecordMatch>, StorageError>;
}

#[derive(thiserror::Error)]
pub enum StorageError {
    #[error("Error from the vector store: {0}")]
    BackendError(String),
    #[error("Invalid vector store configuration: {0}")]
    ConfigurationError(String),
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("Invalid point returned by the vector store: {0}")]
    InvalidPoint(String),
}

impl std::fmt::Debug for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
