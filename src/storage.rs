//! Block store and DAG storage contracts.

use async_trait::async_trait;
use datasize::DataSize;
use thiserror::Error;

use crate::types::{Block, BlockHash, TransformEntry};

/// Errors produced by the storage collaborators.
#[derive(Clone, Debug, Error)]
pub enum StorageError {
    /// The underlying store failed.
    #[error("block store error: {0}")]
    BlockStore(String),

    /// The DAG storage failed.
    #[error("dag storage error: {0}")]
    DagStorage(String),
}

/// The persistent block store.
///
/// Implementations are assumed internally thread-safe.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Persists a block and the transforms its execution produced under its hash.
    async fn put(
        &self,
        hash: BlockHash,
        block: Block,
        transforms: Vec<TransformEntry>,
    ) -> Result<(), StorageError>;

    /// Looks up a block by hash.
    async fn get_block_message(&self, hash: &BlockHash) -> Result<Option<Block>, StorageError>;
}

/// A snapshot of the block DAG, as needed to compute the effects of a block.
#[derive(Clone, DataSize, Debug, Default, PartialEq, Eq)]
pub struct DagRepresentation {
    /// The hashes of the current DAG tips.
    pub latest_block_hashes: Vec<BlockHash>,
}

/// The block DAG storage.
#[async_trait]
pub trait DagStorage: Send + Sync {
    /// Returns the current DAG representation.
    async fn get_representation(&self) -> Result<DagRepresentation, StorageError>;
}
