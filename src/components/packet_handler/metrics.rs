use prometheus::{IntCounter, Registry};
use tracing::debug;

/// Metrics of the packet handler.
pub(crate) struct PacketHandlerMetrics {
    /// Blocks received while fully participating.
    pub(super) blocks_received: IntCounter,
    /// Blocks received that were already part of the DAG.
    pub(super) blocks_received_again: IntCounter,
    /// The registry the metrics are registered on, kept for deregistration on drop.
    registry: Registry,
}

impl PacketHandlerMetrics {
    /// Creates the counters, at zero, and registers them on the given registry.
    pub(super) fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_received = IntCounter::new(
            "packet_handler_blocks_received",
            "count of blocks received while fully participating",
        )?;
        registry.register(Box::new(blocks_received.clone()))?;
        let blocks_received_again = IntCounter::new(
            "packet_handler_blocks_received_again",
            "count of received blocks that were already part of the DAG",
        )?;
        registry.register(Box::new(blocks_received_again.clone()))?;
        Ok(PacketHandlerMetrics {
            blocks_received,
            blocks_received_again,
            registry: registry.clone(),
        })
    }
}

impl Drop for PacketHandlerMetrics {
    fn drop(&mut self) {
        if let Err(error) = self
            .registry
            .unregister(Box::new(self.blocks_received.clone()))
        {
            debug!(%error, "could not unregister blocks_received");
        }
        if let Err(error) = self
            .registry
            .unregister(Box::new(self.blocks_received_again.clone()))
        {
            debug!(%error, "could not unregister blocks_received_again");
        }
    }
}
