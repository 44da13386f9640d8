use std::fmt::{self, Debug, Display, Formatter};

use datasize::DataSize;
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use crate::crypto::hash::Digest;

/// The network identifier for a node.
///
/// A node's ID is derived by the transport layer from its connection credentials; this crate
/// treats it as an opaque value.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, DataSize, Serialize, Deserialize,
)]
pub struct NodeId(Digest);

impl NodeId {
    /// Creates a node ID from a raw digest.
    pub fn new(digest: Digest) -> Self {
        NodeId(digest)
    }

    /// Returns the raw bytes of the underlying hash of the ID.
    #[inline]
    pub fn hash_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Display for NodeId {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "NodeId({:10})", HexFmt(self.hash_bytes()))
    }
}

impl Debug for NodeId {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "NodeId({})", HexFmt(self.hash_bytes()))
    }
}
