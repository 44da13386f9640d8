//! The transport contract consumed by the packet handler, and reply helpers.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    protocol::{Message, Packet},
    types::NodeId,
};

/// How long to wait before retrying a send rejected because the stream buffer was full.
const BUFFER_FULL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A packet stamped with the sending node, as handed to the transport for streaming.
#[derive(Clone, Debug)]
pub struct Blob {
    /// The local node the packet originates from.
    pub sender: NodeId,
    /// The packet to deliver.
    pub packet: Packet,
}

/// Errors a transport send can produce.
#[derive(Clone, Debug, Error)]
pub enum TransportError {
    /// The stream buffer was full; the send may be retried.
    #[error("stream buffer full")]
    BufferFull,

    /// The send failed; the transport has already exhausted its own retries.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// The transport layer as seen by this crate.
///
/// Implementations are expected to be internally thread-safe; sends carry their own timeouts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Streams a blob to the given peers.
    async fn stream(&self, peers: &[NodeId], blob: Blob) -> Result<(), TransportError>;

    /// The peers currently connected to this node.
    async fn connected_peers(&self) -> Vec<NodeId>;
}

/// Streams a message to the given peers, retrying indefinitely while the stream buffer is full.
///
/// Send failures are logged and swallowed: replies are best-effort and the transport performs its
/// own per-message retries below this layer.
pub(crate) async fn stream_to_peers(
    transport: &Arc<dyn Transport>,
    local_node: NodeId,
    peers: &[NodeId],
    message: &Message,
) {
    let packet = match message.to_packet() {
        Ok(packet) => packet,
        Err(error) => {
            warn!(%message, %error, "failed to encode outgoing message");
            return;
        }
    };
    let blob = Blob {
        sender: local_node,
        packet,
    };
    loop {
        match transport.stream(peers, blob.clone()).await {
            Ok(()) => return,
            Err(TransportError::BufferFull) => {
                debug!(%message, "stream buffer full, retrying");
                tokio::time::sleep(BUFFER_FULL_RETRY_DELAY).await;
            }
            Err(error @ TransportError::SendFailed(_)) => {
                warn!(%message, %error, "failed to stream message to peers");
                return;
            }
        }
    }
}

/// Streams a message to a single peer.
pub(crate) async fn send_to_peer(
    transport: &Arc<dyn Transport>,
    local_node: NodeId,
    peer: NodeId,
    message: &Message,
) {
    stream_to_peers(transport, local_node, &[peer], message).await
}

/// Streams a message to all currently connected peers.
pub(crate) async fn broadcast(
    transport: &Arc<dyn Transport>,
    local_node: NodeId,
    message: &Message,
) {
    let peers = transport.connected_peers().await;
    if peers.is_empty() {
        debug!(%message, "no connected peers to stream to");
        return;
    }
    stream_to_peers(transport, local_node, &peers, message).await
}
