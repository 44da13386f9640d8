use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    consensus::{DoppelgangerCallback, MultiParentCasper},
    network,
    protocol::{ApprovedBlockRequest, BlockRequest, Message},
    types::{ApprovedBlock, Block, NodeId},
};

use super::{Error, HandlerEnv, PacketHandlerMetrics};

/// The terminal, fully participating state.
///
/// Feeds received blocks into the consensus instance, answers block and fork-choice-tip
/// requests, and serves the stored approved block to bootstrapping peers.
pub(super) struct ApprovedBlockReceivedHandler {
    casper: Arc<dyn MultiParentCasper>,
    approved_block: ApprovedBlock,
    metrics: Arc<PacketHandlerMetrics>,
}

impl ApprovedBlockReceivedHandler {
    pub(super) fn new(
        casper: Arc<dyn MultiParentCasper>,
        approved_block: ApprovedBlock,
        metrics: Arc<PacketHandlerMetrics>,
    ) -> Self {
        ApprovedBlockReceivedHandler {
            casper,
            approved_block,
            metrics,
        }
    }

    pub(super) async fn handle_block_message(
        &self,
        _env: &HandlerEnv,
        peer: NodeId,
        block: Block,
    ) -> Result<(), Error> {
        self.metrics.blocks_received.inc();
        if self.casper.contains(&block).await {
            debug!(%block, "received block again");
            self.metrics.blocks_received_again.inc();
            return Ok(());
        }
        info!(%block, %peer, "received block");
        self.casper
            .add_block(block, doppelganger_callback(peer))
            .await?;
        Ok(())
    }

    pub(super) async fn handle_block_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
        request: BlockRequest,
    ) -> Result<(), Error> {
        match env.block_store.get_block_message(&request.hash).await? {
            Some(block) => {
                network::send_to_peer(
                    &env.transport,
                    env.local_node,
                    peer,
                    &Message::BlockMessage(Box::new(block)),
                )
                .await;
                info!(hash = %request.hash, %peer, "received block request, response sent");
            }
            None => {
                info!(
                    hash = %request.hash,
                    %peer,
                    "received block request, no response given since the block was not found"
                );
            }
        }
        Ok(())
    }

    pub(super) async fn handle_fork_choice_tip_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
    ) -> Result<(), Error> {
        debug!(%peer, "received fork choice tip request");
        let tip = self.casper.fork_choice_tip().await?;
        network::send_to_peer(
            &env.transport,
            env.local_node,
            peer,
            &Message::BlockMessage(Box::new(tip)),
        )
        .await;
        Ok(())
    }

    pub(super) async fn handle_approved_block_request(
        &self,
        env: &HandlerEnv,
        peer: NodeId,
        _request: ApprovedBlockRequest,
    ) -> Result<(), Error> {
        network::send_to_peer(
            &env.transport,
            env.local_node,
            peer,
            &Message::ApprovedBlock(Box::new(self.approved_block.clone())),
        )
        .await;
        info!(%peer, "received approved block request, response sent");
        Ok(())
    }
}

/// The per-block doppelgänger check: warns when a block arriving from the network carries this
/// node's own validator key as its sender.
fn doppelganger_callback(peer: NodeId) -> DoppelgangerCallback {
    Box::new(move |block, own_key| {
        if block.sender() == Some(own_key) {
            warn!(
                %peer,
                %block,
                "received a block signed with our own validator key; another node may be using \
                 the same key, or this node was restarted"
            );
        }
    })
}
