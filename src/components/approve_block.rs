//! The approve-block protocol: the genesis constructor's side of the ceremony.
//!
//! A standalone node primes this protocol with its genesis candidate and the transforms the
//! candidate's execution produced, then runs it in a background task. The task rebroadcasts the
//! candidate as an `UnapprovedBlock` every interval while approvals arrive via
//! [`ApproveBlockProtocol::add_approval`]. Once the ceremony deadline has passed and the required
//! number of distinct approvals verified, the assembled approved block is published into the
//! last-approved-block slot, which the packet handler's approval timing loop picks up.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use tracing::{debug, info, warn};

use crate::{
    crypto::{
        asymmetric_key::{self, PublicKey},
        hash::Digest,
    },
    network::{self, Transport},
    protocol::Message,
    types::{
        ApprovalSignature, ApprovedBlock, ApprovedBlockCandidate, ApprovedBlockWithTransforms,
        BlockApproval, NodeId, TimeDiff, Timestamp, TransformEntry, UnapprovedBlock,
    },
    utils::SingleSlot,
};

/// The genesis-approval ceremony run by the genesis constructor.
pub struct ApproveBlockProtocol {
    candidate: ApprovedBlockCandidate,
    candidate_hash: Digest,
    transforms: Vec<TransformEntry>,
    start: Timestamp,
    duration: TimeDiff,
    interval: TimeDiff,
    approvals: Mutex<BTreeMap<PublicKey, ApprovalSignature>>,
    transport: Arc<dyn Transport>,
    local_node: NodeId,
    last_approved_block: Arc<SingleSlot<Arc<ApprovedBlockWithTransforms>>>,
}

impl ApproveBlockProtocol {
    /// Creates a new ceremony for the given candidate, starting now.
    pub(crate) fn new(
        candidate: ApprovedBlockCandidate,
        transforms: Vec<TransformEntry>,
        duration: TimeDiff,
        interval: TimeDiff,
        transport: Arc<dyn Transport>,
        local_node: NodeId,
        last_approved_block: Arc<SingleSlot<Arc<ApprovedBlockWithTransforms>>>,
    ) -> Self {
        let candidate_hash = candidate.hash();
        ApproveBlockProtocol {
            candidate,
            candidate_hash,
            transforms,
            start: Timestamp::now(),
            duration,
            interval,
            approvals: Mutex::new(BTreeMap::new()),
            transport,
            local_node,
            last_approved_block,
        }
    }

    /// Registers a single validator's approval of the candidate.
    ///
    /// Approvals for a different candidate and approvals whose signature does not verify are
    /// logged and dropped. Duplicate approvals from the same key are kept once.
    pub(crate) fn add_approval(&self, approval: BlockApproval) {
        if approval.candidate_hash != self.candidate_hash {
            warn!(
                signer = %approval.signature.public_key,
                "dropping approval for a different candidate"
            );
            return;
        }
        if asymmetric_key::verify(
            self.candidate_hash,
            &approval.signature.signature,
            &approval.signature.public_key,
        )
        .is_err()
        {
            warn!(
                signer = %approval.signature.public_key,
                "dropping approval with invalid signature"
            );
            return;
        }

        let mut approvals = self.approvals.lock().expect("approvals lock poisoned");
        if approvals
            .insert(approval.signature.public_key, approval.signature)
            .is_none()
        {
            info!(
                signer = %approval.signature.public_key,
                collected = approvals.len(),
                required = self.candidate.required_sigs,
                "new block approval received"
            );
        } else {
            debug!(signer = %approval.signature.public_key, "duplicate block approval");
        }
    }

    /// Runs the ceremony until completion.
    ///
    /// Rebroadcasts the candidate every interval. Completes once the ceremony deadline has
    /// elapsed and the required number of distinct approvals has been collected, publishing the
    /// assembled approved block into the last-approved-block slot.
    pub(crate) async fn run(&self) {
        info!(candidate = %self.candidate, "starting the approve block protocol");
        let unapproved = Message::UnapprovedBlock(Box::new(UnapprovedBlock {
            candidate: self.candidate.clone(),
            timestamp: self.start,
            duration: self.duration,
        }));
        loop {
            network::broadcast(&self.transport, self.local_node, &unapproved).await;
            tokio::time::sleep(self.interval.into()).await;

            if self.start.elapsed() < self.duration {
                continue;
            }
            let sigs: Vec<ApprovalSignature> = {
                let approvals = self.approvals.lock().expect("approvals lock poisoned");
                if (approvals.len() as u32) < self.candidate.required_sigs {
                    continue;
                }
                approvals.values().copied().collect()
            };

            let approved_block = ApprovedBlock {
                candidate: self.candidate.clone(),
                sigs,
            };
            info!(%approved_block, "genesis ceremony complete");
            self.last_approved_block
                .set(Arc::new(ApprovedBlockWithTransforms {
                    approved_block,
                    transforms: self.transforms.clone(),
                }));
            return;
        }
    }

    #[cfg(test)]
    pub(crate) fn approval_count(&self) -> usize {
        self.approvals.lock().expect("approvals lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        crypto::asymmetric_key::sign,
        testing::{self, RecordingTransport},
    };

    fn protocol(
        required_sigs: u32,
        duration: TimeDiff,
        transport: Arc<RecordingTransport>,
    ) -> (ApproveBlockProtocol, Arc<SingleSlot<Arc<ApprovedBlockWithTransforms>>>) {
        let candidate = ApprovedBlockCandidate {
            block: testing::genesis_block("casper-test"),
            required_sigs,
        };
        let slot = Arc::new(SingleSlot::empty());
        let protocol = ApproveBlockProtocol::new(
            candidate,
            vec![],
            duration,
            TimeDiff::from_millis(10),
            transport,
            testing::local_node_id(),
            Arc::clone(&slot),
        );
        (protocol, slot)
    }

    fn approval_for(protocol: &ApproveBlockProtocol, seed: u8) -> BlockApproval {
        let (secret_key, public_key) = testing::keypair(seed);
        let signature = sign(protocol.candidate_hash, &secret_key, &public_key);
        BlockApproval {
            candidate_hash: protocol.candidate_hash,
            signature: ApprovalSignature {
                public_key,
                signature,
            },
        }
    }

    #[test]
    fn rejects_approval_for_other_candidate() {
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (protocol, _) = protocol(1, TimeDiff::from_millis(0), transport);
        let mut approval = approval_for(&protocol, 1);
        approval.candidate_hash = crate::crypto::hash::hash("some other candidate");
        protocol.add_approval(approval);
        assert_eq!(0, protocol.approval_count());
    }

    #[test]
    fn rejects_approval_with_bad_signature() {
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (protocol, _) = protocol(1, TimeDiff::from_millis(0), transport);
        let mut approval = approval_for(&protocol, 1);
        let (secret_key, public_key) = testing::keypair(1);
        approval.signature.signature = sign(b"unrelated payload", &secret_key, &public_key);
        protocol.add_approval(approval);
        assert_eq!(0, protocol.approval_count());
    }

    #[test]
    fn duplicate_approvals_are_kept_once() {
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (protocol, _) = protocol(2, TimeDiff::from_millis(0), transport);
        let approval = approval_for(&protocol, 1);
        protocol.add_approval(approval);
        protocol.add_approval(approval);
        assert_eq!(1, protocol.approval_count());
    }

    #[tokio::test]
    async fn publishes_once_threshold_met() {
        let peer = testing::node_id(1);
        let transport = Arc::new(RecordingTransport::new(vec![peer]));
        let (protocol, slot) = protocol(1, TimeDiff::from_millis(0), Arc::clone(&transport));
        protocol.add_approval(approval_for(&protocol, 1));

        let protocol = Arc::new(protocol);
        let run = {
            let protocol = Arc::clone(&protocol);
            tokio::spawn(async move { protocol.run().await })
        };
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("ceremony should complete")
            .unwrap();

        let stored = slot.get().expect("approved block should be published");
        assert_eq!(1, stored.approved_block.sigs.len());
        // The candidate was rebroadcast to the connected peer at least once.
        assert!(transport
            .sent_messages()
            .iter()
            .any(|(_, message)| matches!(message, Message::UnapprovedBlock(_))));
    }

    #[tokio::test]
    async fn does_not_publish_below_threshold() {
        let transport = Arc::new(RecordingTransport::new(vec![]));
        let (protocol, slot) = protocol(1, TimeDiff::from_millis(0), transport);
        let protocol = Arc::new(protocol);
        let run = {
            let protocol = Arc::clone(&protocol);
            tokio::spawn(async move { protocol.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(slot.get().is_none());
        run.abort();
    }
}
