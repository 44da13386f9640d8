//! The block-approver protocol: a genesis validator's side of the ceremony.
//!
//! A node started in the approve-genesis role knows the genesis parameters the committee agreed
//! on out of band. Whenever the genesis constructor circulates an `UnapprovedBlock`, this
//! protocol rebuilds the expected candidate from those parameters, and signs the candidate hash
//! if and only if the circulated candidate matches, sending a `BlockApproval` back to the
//! originating peer.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    crypto::{asymmetric_key::ValidatorIdentity, hash::Digest},
    genesis::{self, GenesisParams},
    network::{self, Transport},
    protocol::Message,
    types::{ApprovalSignature, ApprovedBlockCandidate, BlockApproval, NodeId, UnapprovedBlock},
};

/// Signs genesis candidates that match the expected parameters.
pub struct BlockApproverProtocol {
    identity: Arc<ValidatorIdentity>,
    expected_candidate: ApprovedBlockCandidate,
    expected_candidate_hash: Digest,
    transport: Arc<dyn Transport>,
    local_node: NodeId,
}

impl BlockApproverProtocol {
    /// Creates an approver expecting the candidate derived from the given genesis parameters.
    pub(crate) fn new(
        identity: Arc<ValidatorIdentity>,
        params: &GenesisParams,
        required_sigs: u32,
        transport: Arc<dyn Transport>,
        local_node: NodeId,
    ) -> Self {
        let expected_candidate = ApprovedBlockCandidate {
            block: genesis::build_genesis(params),
            required_sigs,
        };
        let expected_candidate_hash = expected_candidate.hash();
        BlockApproverProtocol {
            identity,
            expected_candidate,
            expected_candidate_hash,
            transport,
            local_node,
        }
    }

    /// Handles a circulated genesis candidate, replying with an approval if it matches the
    /// expected genesis parameters.
    pub(crate) async fn unapproved_block_received(
        &self,
        peer: NodeId,
        unapproved: UnapprovedBlock,
    ) {
        let candidate = unapproved.candidate;
        if candidate.required_sigs != self.expected_candidate.required_sigs {
            warn!(
                %peer,
                got = candidate.required_sigs,
                expected = self.expected_candidate.required_sigs,
                "refusing to approve candidate with unexpected signature threshold"
            );
            return;
        }
        if candidate.hash() != self.expected_candidate_hash {
            warn!(
                %peer,
                candidate = %candidate,
                "refusing to approve candidate that does not match the expected genesis parameters"
            );
            return;
        }

        let signature = self.identity.sign(&self.expected_candidate_hash);
        let approval = BlockApproval {
            candidate_hash: self.expected_candidate_hash,
            signature: ApprovalSignature {
                public_key: self.identity.public_key,
                signature,
            },
        };
        network::send_to_peer(
            &self.transport,
            self.local_node,
            peer,
            &Message::BlockApproval(approval),
        )
        .await;
        info!(%peer, candidate = %self.expected_candidate, "approval sent in response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::asymmetric_key::{self, SecretKey},
        testing::{self, RecordingTransport},
        types::{TimeDiff, Timestamp},
    };

    fn approver(
        params: &GenesisParams,
        transport: Arc<RecordingTransport>,
    ) -> (BlockApproverProtocol, Arc<ValidatorIdentity>) {
        let identity = Arc::new(ValidatorIdentity::new(SecretKey::new_ed25519([42; 32])));
        let approver = BlockApproverProtocol::new(
            Arc::clone(&identity),
            params,
            2,
            transport,
            testing::local_node_id(),
        );
        (approver, identity)
    }

    fn unapproved(candidate: ApprovedBlockCandidate) -> UnapprovedBlock {
        UnapprovedBlock {
            candidate,
            timestamp: Timestamp::from(1_000),
            duration: TimeDiff::from_seconds(5),
        }
    }

    #[tokio::test]
    async fn approves_matching_candidate() {
        let params = testing::genesis_params("casper-test");
        let peer = testing::node_id(3);
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (approver, identity) = approver(&params, Arc::clone(&transport));

        let candidate = approver.expected_candidate.clone();
        let candidate_hash = candidate.hash();
        approver
            .unapproved_block_received(peer, unapproved(candidate))
            .await;

        let sent = transport.sent_messages();
        assert_eq!(1, sent.len());
        let (peers, message) = &sent[0];
        assert_eq!(&[peer], peers.as_slice());
        match message {
            Message::BlockApproval(approval) => {
                assert_eq!(candidate_hash, approval.candidate_hash);
                assert_eq!(identity.public_key, approval.signature.public_key);
                assert!(asymmetric_key::verify(
                    candidate_hash,
                    &approval.signature.signature,
                    &identity.public_key,
                )
                .is_ok());
            }
            other => panic!("expected a block approval, got {}", other),
        }
    }

    #[tokio::test]
    async fn ignores_mismatched_candidate() {
        let params = testing::genesis_params("casper-test");
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (approver, _) = approver(&params, Arc::clone(&transport));

        // Same parameters but a different shard produce a different candidate.
        let other_params = testing::genesis_params("some-other-shard");
        let candidate = ApprovedBlockCandidate {
            block: genesis::build_genesis(&other_params),
            required_sigs: 2,
        };
        approver
            .unapproved_block_received(testing::node_id(3), unapproved(candidate))
            .await;
        assert!(transport.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn ignores_unexpected_threshold() {
        let params = testing::genesis_params("casper-test");
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (approver, _) = approver(&params, Arc::clone(&transport));

        let mut candidate = approver.expected_candidate.clone();
        candidate.required_sigs = 1;
        approver
            .unapproved_block_received(testing::node_id(3), unapproved(candidate))
            .await;
        assert!(transport.sent_messages().is_empty());
    }
}
