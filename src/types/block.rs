//! Block, genesis-ceremony and state-transform types.

use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{
        asymmetric_key::{PublicKey, Signature},
        hash::{self, Digest},
    },
    types::{TimeDiff, Timestamp},
};

/// The cryptographic hash of a [`Block`].
#[derive(
    Copy,
    Clone,
    DataSize,
    Default,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Debug,
)]
pub struct BlockHash(Digest);

impl BlockHash {
    /// Constructs a new `BlockHash`.
    pub fn new(hash: Digest) -> Self {
        BlockHash(hash)
    }

    /// Returns the wrapped inner hash.
    pub fn inner(&self) -> &Digest {
        &self.0
    }
}

impl Display for BlockHash {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "block hash {}", self.0)
    }
}

impl From<Digest> for BlockHash {
    fn from(digest: Digest) -> Self {
        BlockHash(digest)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// A validator's bond: the key it validates under and the stake backing it.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bond {
    /// The validator's public key.
    pub validator: PublicKey,
    /// The stake bonded to the validator.
    pub stake: u64,
}

/// The header of a [`Block`].
///
/// All fields that contribute to the block's identity live here; the block hash is the digest of
/// the bincode-encoded header.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// The hashes of the parent blocks. Empty for a genesis block.
    pub parent_hashes: Vec<BlockHash>,
    /// When the block was proposed.
    pub timestamp: Timestamp,
    /// The shard this block belongs to.
    pub shard_id: String,
    /// The digest of the global state after executing this block's deploys.
    pub state_hash: Digest,
    /// The key of the validator that proposed the block. `None` for a genesis block.
    pub sender: Option<PublicKey>,
    /// The bonds active at this block.
    pub bonds: Vec<Bond>,
}

impl BlockHeader {
    /// Computes the hash of this header.
    pub fn hash(&self) -> BlockHash {
        // Serializing a header is infallible: it contains no maps with non-string keys and no
        // untagged enums.
        let serialized = bincode::serialize(self).expect("should serialize block header");
        BlockHash::new(hash::hash(serialized))
    }
}

/// A block as it travels on the wire and sits in the block store.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    hash: BlockHash,
    header: BlockHeader,
}

impl Block {
    /// Constructs a block from a header, computing its hash.
    pub fn new(header: BlockHeader) -> Self {
        let hash = header.hash();
        Block { hash, header }
    }

    /// The hash of this block.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// The block's header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// The key of the proposing validator, if any.
    pub fn sender(&self) -> Option<&PublicKey> {
        self.header.sender.as_ref()
    }

    /// Whether this is a genesis block (no parents, no sender).
    pub fn is_genesis(&self) -> bool {
        self.header.parent_hashes.is_empty() && self.header.sender.is_none()
    }
}

impl Display for Block {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "block {} (timestamp {})",
            self.hash.inner(),
            self.header.timestamp
        )
    }
}

/// A candidate genesis block together with the number of signatures required to approve it.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedBlockCandidate {
    /// The candidate block.
    pub block: Block,
    /// How many distinct validator signatures make the candidate an approved block.
    pub required_sigs: u32,
}

impl ApprovedBlockCandidate {
    /// The digest validators sign to approve this candidate.
    pub fn hash(&self) -> Digest {
        let serialized = bincode::serialize(self).expect("should serialize candidate");
        hash::hash(serialized)
    }
}

impl Display for ApprovedBlockCandidate {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "candidate {} requiring {} signatures",
            self.block.hash().inner(),
            self.required_sigs
        )
    }
}

/// A single validator's signature over a candidate hash.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSignature {
    /// The signing validator's public key.
    pub public_key: PublicKey,
    /// The signature over the candidate hash.
    pub signature: Signature,
}

/// A candidate genesis block accompanied by validator signatures meeting a threshold.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedBlock {
    /// The approved candidate.
    pub candidate: ApprovedBlockCandidate,
    /// The signatures collected over the candidate hash.
    pub sigs: Vec<ApprovalSignature>,
}

impl Display for ApprovedBlock {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "approved block {} with {} signatures",
            self.candidate.block.hash().inner(),
            self.sigs.len()
        )
    }
}

/// A candidate genesis block circulated for validators to sign.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnapprovedBlock {
    /// The candidate to approve.
    pub candidate: ApprovedBlockCandidate,
    /// When the ceremony started.
    pub timestamp: Timestamp,
    /// The minimum length of the ceremony.
    pub duration: TimeDiff,
}

/// A single validator's approval of a candidate.
#[derive(Clone, Copy, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockApproval {
    /// The hash of the candidate being approved.
    pub candidate_hash: Digest,
    /// The approving signature.
    pub signature: ApprovalSignature,
}

/// A delta applied to a piece of global state by executing a block.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// No change.
    Identity,
    /// Overwrite with the serialized value.
    Write(Vec<u8>),
    /// Add to a numeric value.
    AddInt32(i32),
}

/// A [`Transform`] bound to the global-state key it applies to.
#[derive(Clone, DataSize, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformEntry {
    /// The hash of the global-state key the transform applies to.
    pub key: Digest,
    /// The transform itself.
    pub transform: Transform,
}

/// A validated approved block paired with the precomputed state transforms its contained block
/// produced. Stored once in the last-approved-block slot.
#[derive(Clone, DataSize, Debug, PartialEq, Eq)]
pub struct ApprovedBlockWithTransforms {
    /// The validated approved block.
    pub approved_block: ApprovedBlock,
    /// The transforms produced by executing the contained block.
    pub transforms: Vec<TransformEntry>,
}
