//! Components of the node core.
//!
//! The central component is the [`packet_handler`], which owns the lifecycle state machine. The
//! [`approve_block`] and [`block_approver`] protocols implement the two sides of the genesis
//! ceremony and are driven by the packet handler's `Standalone` and `GenesisValidator` states.

pub mod approve_block;
pub mod block_approver;
pub mod packet_handler;
