//! The consensus (Casper) instance contract.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    crypto::asymmetric_key::{PublicKey, ValidatorIdentity},
    types::Block,
};

/// Errors produced by the consensus instance.
#[derive(Clone, Debug, Error)]
pub enum CasperError {
    /// Adding a block to the DAG failed.
    #[error("could not add block: {0}")]
    AddBlock(String),

    /// The fork-choice rule could not produce a tip.
    #[error("could not compute fork choice tip: {0}")]
    ForkChoice(String),

    /// Constructing the instance failed.
    #[error("could not construct casper instance: {0}")]
    Construction(String),
}

/// Callback invoked for every block added to the DAG, with the incoming block and this node's own
/// validator key. Used to warn when another node proposes under the same key.
pub type DoppelgangerCallback = Box<dyn Fn(&Block, &PublicKey) + Send + Sync>;

/// The multi-parent consensus object, available once the node holds an approved genesis.
#[async_trait]
pub trait MultiParentCasper: Send + Sync {
    /// Whether the given block is already part of the DAG.
    async fn contains(&self, block: &Block) -> bool;

    /// Adds a block to the DAG, invoking the doppelgänger callback with the block and this node's
    /// validator key.
    async fn add_block(
        &self,
        block: Block,
        doppelganger: DoppelgangerCallback,
    ) -> Result<(), CasperError>;

    /// The current head block chosen by the fork-choice rule.
    async fn fork_choice_tip(&self) -> Result<Block, CasperError>;
}

/// Constructs [`MultiParentCasper`] instances.
///
/// A factory seam rather than a static constructor, so the consensus implementation stays outside
/// this crate and tests can inject a recording instance.
#[async_trait]
pub trait CasperFactory: Send + Sync {
    /// Creates a consensus instance rooted at the given genesis block.
    async fn hash_set_casper(
        &self,
        validator: Option<Arc<ValidatorIdentity>>,
        genesis: Block,
        shard_id: &str,
    ) -> Result<Arc<dyn MultiParentCasper>, CasperError>;
}
