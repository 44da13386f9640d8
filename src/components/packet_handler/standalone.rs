use std::sync::Arc;

use tracing::error;

use crate::{
    components::approve_block::ApproveBlockProtocol,
    crypto::asymmetric_key::ValidatorIdentity,
    types::TimeDiff,
};

use super::{install_approved_block_received, HandlerCell, HandlerEnv, PacketHandlerMetrics};

/// The standalone state: the genesis constructor, collecting approvals for its own candidate.
///
/// Incoming block approvals are fed into the ceremony; everything else block-related is a no-op.
/// The state is exited by [`run_approval_loop`], never by the dispatcher.
pub(super) struct StandaloneHandler {
    pub(super) protocol: Arc<ApproveBlockProtocol>,
}

/// Polls the last-approved-block slot and promotes the node once the ceremony has published
/// into it.
///
/// This loop is the only publisher of the standalone-to-participating transition: it persists
/// the approved genesis block, constructs the consensus instance and installs the terminal
/// handler state, in that order, so any dispatcher task observing the new state also observes
/// the persisted block.
pub(super) async fn run_approval_loop(
    cell: Arc<HandlerCell>,
    env: HandlerEnv,
    metrics: Arc<PacketHandlerMetrics>,
    identity: Option<Arc<ValidatorIdentity>>,
    shard_id: String,
    interval: TimeDiff,
) {
    loop {
        tokio::time::sleep(interval.into()).await;
        let stored = match env.last_approved_block.get() {
            None => continue,
            Some(stored) => stored,
        };

        let approved_block = stored.approved_block.clone();
        let block = approved_block.candidate.block.clone();
        if let Err(error) = env
            .block_store
            .put(*block.hash(), block.clone(), stored.transforms.clone())
            .await
        {
            error!(%error, "failed to persist the approved genesis block, retrying");
            continue;
        }
        let casper = match env
            .casper_factory
            .hash_set_casper(identity.clone(), block, &shard_id)
            .await
        {
            Ok(casper) => casper,
            Err(error) => {
                error!(%error, "failed to construct the consensus instance, retrying");
                continue;
            }
        };

        install_approved_block_received(&cell, &env, metrics, casper, approved_block).await;
        return;
    }
}
