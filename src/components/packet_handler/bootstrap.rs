use std::{collections::HashSet, sync::Arc};

use tracing::info;

use crate::{
    consensus::MultiParentCasper,
    crypto::asymmetric_key::{PublicKey, ValidatorIdentity},
    network,
    protocol::{ApprovedBlockRequest, Message},
    types::{ApprovedBlock, TimeDiff},
};

use super::{transition, Error, HandlerCell, HandlerEnv, HandlerState};

/// Identifier carried by our approved-block requests and echoed in replies.
const REQUEST_IDENTIFIER: &str = "latest";

/// The bootstrap state: a node joining an existing network and waiting for its approved block.
pub(super) struct BootstrapHandler {
    pub(super) shard_id: String,
    pub(super) identity: Option<Arc<ValidatorIdentity>>,
    pub(super) known_validators: HashSet<PublicKey>,
}

impl BootstrapHandler {
    pub(super) async fn handle_approved_block(
        &self,
        env: &HandlerEnv,
        approved_block: ApprovedBlock,
    ) -> Result<Option<Arc<dyn MultiParentCasper>>, Error> {
        transition::on_approved_block(
            env,
            approved_block,
            &self.known_validators,
            self.identity.clone(),
            &self.shard_id,
        )
        .await
    }
}

/// Periodically asks all connected peers for the approved block, until the node has one.
///
/// Runs as a background task for the lifetime of the bootstrap state; peers without the block
/// answer with `NoApprovedBlockAvailable` and the request is simply repeated.
pub(super) async fn run_approved_block_requester(
    cell: Arc<HandlerCell>,
    env: HandlerEnv,
    delay: TimeDiff,
) {
    let request = Message::ApprovedBlockRequest(ApprovedBlockRequest {
        identifier: REQUEST_IDENTIFIER.to_string(),
    });
    loop {
        tokio::time::sleep(delay.into()).await;
        if matches!(&*cell.load(), HandlerState::ApprovedBlockReceived(_)) {
            return;
        }
        info!("requesting the approved block from peers");
        network::broadcast(&env.transport, env.local_node, &request).await;
    }
}
