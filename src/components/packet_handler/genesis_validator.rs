use std::sync::Arc;

use crate::{
    components::block_approver::BlockApproverProtocol,
    consensus::MultiParentCasper,
    crypto::asymmetric_key::ValidatorIdentity,
    types::ApprovedBlock,
};

use super::{self_validator_set, transition, Error, HandlerEnv};

/// The genesis-validator state: a committee member waiting for the ceremony to conclude.
///
/// Circulated candidates are delegated to the approver; an incoming approved block is accepted
/// only on the strength of this validator's own signature.
pub(super) struct GenesisValidatorHandler {
    pub(super) identity: Arc<ValidatorIdentity>,
    pub(super) shard_id: String,
    pub(super) approver: BlockApproverProtocol,
}

impl GenesisValidatorHandler {
    pub(super) async fn handle_approved_block(
        &self,
        env: &HandlerEnv,
        approved_block: ApprovedBlock,
    ) -> Result<Option<Arc<dyn MultiParentCasper>>, Error> {
        let trusted = self_validator_set(&self.identity);
        transition::on_approved_block(
            env,
            approved_block,
            &trusted,
            Some(Arc::clone(&self.identity)),
            &self.shard_id,
        )
        .await
    }
}
