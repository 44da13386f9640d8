//! Common types used across the packet handler.

mod block;
mod node_id;
mod timestamp;

pub use block::{
    ApprovalSignature, ApprovedBlock, ApprovedBlockCandidate, ApprovedBlockWithTransforms, Block,
    BlockApproval, BlockHash, BlockHeader, Bond, Transform, TransformEntry, UnapprovedBlock,
};
pub use node_id::NodeId;
pub use timestamp::{TimeDiff, Timestamp};
