//! Validation of approved blocks.

use std::collections::HashSet;

use tracing::debug;

use crate::{
    crypto::asymmetric_key::{self, PublicKey},
    types::ApprovedBlock,
};

/// Checks that the approved block's candidate is signed by at least the candidate's required
/// threshold of members of `trusted`, with distinct public keys and verifying signature bytes.
pub(crate) fn approved_block(approved: &ApprovedBlock, trusted: &HashSet<PublicKey>) -> bool {
    let candidate_hash = approved.candidate.hash();

    let mut verified: HashSet<PublicKey> = HashSet::new();
    for approval in &approved.sigs {
        if !trusted.contains(&approval.public_key) {
            debug!(
                signer = %approval.public_key,
                "ignoring approval from key outside the trusted validator set"
            );
            continue;
        }
        match asymmetric_key::verify(candidate_hash, &approval.signature, &approval.public_key) {
            Ok(()) => {
                verified.insert(approval.public_key);
            }
            Err(_) => {
                debug!(signer = %approval.public_key, "ignoring approval with invalid signature");
            }
        }
    }

    verified.len() as u32 >= approved.candidate.required_sigs
}
