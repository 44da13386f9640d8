use thiserror::Error;

use crate::{
    consensus::CasperError, contract_runtime::ExecutionEngineError, genesis::GenesisError,
    storage::StorageError,
};

use super::Role;

/// Errors the packet handler can produce.
///
/// Handler errors propagate to the dispatch entry point, which logs them with the originating
/// peer and keeps serving other packets; they never shut the node down.
#[derive(Debug, Error)]
pub enum Error {
    /// A storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The execution engine failed.
    #[error(transparent)]
    ExecutionEngine(#[from] ExecutionEngineError),

    /// The consensus instance failed.
    #[error(transparent)]
    Consensus(#[from] CasperError),

    /// Assembling the genesis inputs failed.
    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// Registering the metrics failed.
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] prometheus::Error),

    /// The configured role requires a validator identity, but none was given.
    #[error("the {role:?} role requires a validator identity")]
    MissingValidatorIdentity {
        /// The configured role.
        role: Role,
    },
}
