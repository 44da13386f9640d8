//! Wire packets and the protocol messages decoded from them.
//!
//! A [`Packet`] is the transport layer's routing unit: a registered type identifier plus the
//! canonical binary encoding of the corresponding message. The eight type identifiers recognized
//! here are part of the wire contract and must match the transport's registered identifiers
//! exactly. Packets carrying an unknown identifier are not for this handler and fall through;
//! packets carrying a known identifier with malformed content are silently dropped.

use std::fmt::{self, Debug, Display, Formatter};

use derive_more::From;
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ApprovedBlock, Block, BlockApproval, BlockHash, UnapprovedBlock};

/// Type identifier for [`Message::BlockMessage`].
pub const BLOCK_MESSAGE: &str = "BlockMessage";
/// Type identifier for [`Message::BlockRequest`].
pub const BLOCK_REQUEST: &str = "BlockRequest";
/// Type identifier for [`Message::ForkChoiceTipRequest`].
pub const FORK_CHOICE_TIP_REQUEST: &str = "ForkChoiceTipRequest";
/// Type identifier for [`Message::ApprovedBlock`].
pub const APPROVED_BLOCK: &str = "ApprovedBlock";
/// Type identifier for [`Message::ApprovedBlockRequest`].
pub const APPROVED_BLOCK_REQUEST: &str = "ApprovedBlockRequest";
/// Type identifier for [`Message::UnapprovedBlock`].
pub const UNAPPROVED_BLOCK: &str = "UnapprovedBlock";
/// Type identifier for [`Message::BlockApproval`].
pub const BLOCK_APPROVAL: &str = "BlockApproval";
/// Type identifier for [`Message::NoApprovedBlockAvailable`].
pub const NO_APPROVED_BLOCK_AVAILABLE: &str = "NoApprovedBlockAvailable";

/// A typed wire packet as delivered by the transport's routing layer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// The registered type identifier of the content.
    pub type_id: String,
    /// The canonical binary encoding of the message.
    pub content: Vec<u8>,
}

impl Debug for Packet {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        formatter
            .debug_struct("Packet")
            .field("type_id", &self.type_id)
            .field("content", &HexFmt(&self.content))
            .finish()
    }
}

impl Display for Packet {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "packet {} ({} bytes)",
            self.type_id,
            self.content.len()
        )
    }
}

/// A request for a block by hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    /// The hash of the requested block.
    pub hash: BlockHash,
}

/// A request for the latest approved block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovedBlockRequest {
    /// Free-form identifier echoed back in the reply.
    pub identifier: String,
}

/// Reply sent when a node is asked for an approved block it does not have yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoApprovedBlockAvailable {
    /// The identifier of the request being answered.
    pub identifier: String,
    /// The display form of the replying node's ID.
    pub node_id: String,
}

/// A protocol message decoded from a [`Packet`].
#[derive(Clone, Debug, PartialEq, Eq, From, Serialize, Deserialize)]
pub enum Message {
    /// A block proposed on the network.
    #[from]
    BlockMessage(Box<Block>),
    /// A request for a block by hash.
    #[from]
    BlockRequest(BlockRequest),
    /// A request for the current fork-choice tip.
    ForkChoiceTipRequest,
    /// A fully approved (genesis) block.
    #[from]
    ApprovedBlock(Box<ApprovedBlock>),
    /// A request for the latest approved block.
    #[from]
    ApprovedBlockRequest(ApprovedBlockRequest),
    /// A genesis candidate circulated for signing.
    #[from]
    UnapprovedBlock(Box<UnapprovedBlock>),
    /// A single validator's approval of a genesis candidate.
    #[from]
    BlockApproval(BlockApproval),
    /// Reply indicating no approved block is available yet.
    #[from]
    NoApprovedBlockAvailable(NoApprovedBlockAvailable),
}

impl Message {
    /// Decodes a packet into a protocol message.
    ///
    /// Returns `None` both for unknown type identifiers (the packet is not for this handler) and
    /// for known identifiers whose content fails to parse (the packet is dropped).
    pub fn decode(packet: &Packet) -> Option<Message> {
        let result = match packet.type_id.as_str() {
            BLOCK_MESSAGE => bincode::deserialize(&packet.content).map(Message::BlockMessage),
            BLOCK_REQUEST => bincode::deserialize(&packet.content).map(Message::BlockRequest),
            FORK_CHOICE_TIP_REQUEST => Ok(Message::ForkChoiceTipRequest),
            APPROVED_BLOCK => bincode::deserialize(&packet.content).map(Message::ApprovedBlock),
            APPROVED_BLOCK_REQUEST => {
                bincode::deserialize(&packet.content).map(Message::ApprovedBlockRequest)
            }
            UNAPPROVED_BLOCK => bincode::deserialize(&packet.content).map(Message::UnapprovedBlock),
            BLOCK_APPROVAL => bincode::deserialize(&packet.content).map(Message::BlockApproval),
            NO_APPROVED_BLOCK_AVAILABLE => {
                bincode::deserialize(&packet.content).map(Message::NoApprovedBlockAvailable)
            }
            _ => return None,
        };
        match result {
            Ok(message) => Some(message),
            Err(error) => {
                debug!(type_id = %packet.type_id, %error, "dropping malformed packet");
                None
            }
        }
    }

    /// The registered type identifier for this message.
    pub fn type_id(&self) -> &'static str {
        match self {
            Message::BlockMessage(_) => BLOCK_MESSAGE,
            Message::BlockRequest(_) => BLOCK_REQUEST,
            Message::ForkChoiceTipRequest => FORK_CHOICE_TIP_REQUEST,
            Message::ApprovedBlock(_) => APPROVED_BLOCK,
            Message::ApprovedBlockRequest(_) => APPROVED_BLOCK_REQUEST,
            Message::UnapprovedBlock(_) => UNAPPROVED_BLOCK,
            Message::BlockApproval(_) => BLOCK_APPROVAL,
            Message::NoApprovedBlockAvailable(_) => NO_APPROVED_BLOCK_AVAILABLE,
        }
    }

    /// Encodes this message as a packet with its registered type identifier.
    pub fn to_packet(&self) -> Result<Packet, bincode::Error> {
        let content = match self {
            Message::BlockMessage(block) => bincode::serialize(block)?,
            Message::BlockRequest(request) => bincode::serialize(request)?,
            Message::ForkChoiceTipRequest => Vec::new(),
            Message::ApprovedBlock(approved) => bincode::serialize(approved)?,
            Message::ApprovedBlockRequest(request) => bincode::serialize(request)?,
            Message::UnapprovedBlock(unapproved) => bincode::serialize(unapproved)?,
            Message::BlockApproval(approval) => bincode::serialize(approval)?,
            Message::NoApprovedBlockAvailable(reply) => bincode::serialize(reply)?,
        };
        Ok(Packet {
            type_id: self.type_id().to_string(),
            content,
        })
    }
}

impl Display for Message {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match self {
            Message::BlockMessage(block) => write!(formatter, "BlockMessage::({})", block),
            Message::BlockRequest(request) => {
                write!(formatter, "BlockRequest::({})", request.hash)
            }
            Message::ForkChoiceTipRequest => write!(formatter, "ForkChoiceTipRequest"),
            Message::ApprovedBlock(approved) => write!(formatter, "ApprovedBlock::({})", approved),
            Message::ApprovedBlockRequest(request) => {
                write!(formatter, "ApprovedBlockRequest::({})", request.identifier)
            }
            Message::UnapprovedBlock(unapproved) => {
                write!(formatter, "UnapprovedBlock::({})", unapproved.candidate)
            }
            Message::BlockApproval(approval) => write!(
                formatter,
                "BlockApproval::({} by {})",
                approval.candidate_hash, approval.signature.public_key
            ),
            Message::NoApprovedBlockAvailable(reply) => {
                write!(formatter, "NoApprovedBlockAvailable::({})", reply.node_id)
            }
        }
    }
}
