//! The execution engine contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    storage::DagRepresentation,
    types::{Block, Bond, TransformEntry},
};

/// Errors produced by the execution engine.
#[derive(Clone, Debug, Error)]
pub enum ExecutionEngineError {
    /// The engine rejected the request.
    #[error("execution engine error: {0}")]
    Engine(String),
}

/// The execution engine as seen by this crate.
///
/// The engine executes deploys elsewhere; the packet handler only sets the initial bonds and asks
/// for the state transforms a block produces.
#[async_trait]
pub trait ExecutionEngineService: Send + Sync {
    /// Installs the given bonds as the validator set of the genesis state.
    async fn set_bonds(&self, bonds: Vec<Bond>) -> Result<(), ExecutionEngineError>;

    /// Computes the state transforms produced by executing the given block against the given DAG.
    async fn effects_for_block(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<Vec<TransformEntry>, ExecutionEngineError>;
}
