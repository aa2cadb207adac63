use a2a_core::AgentId;
use async_trait::async_trait;

use crate::frame::JsonRpcRequest;
use crate::TransportError;

/// Outcome of handing a frame to the transport. Mirrors `send(target, frame) → (queued |
/// failed)`: the transport only promises local enqueue, never end-to-end delivery — retries and
/// timeout handling live in the consensus layer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Queued,
    Failed,
}

/// The narrow interface every consensus/SMR/voting component sends frames through. A frame is
/// fire-and-forget once queued; a node receives inbound frames via [`Transport::deliver`] rather
/// than polling, so the kernel's event loop can `select!` over it alongside its own timers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &a2a_core::AgentId, frame: JsonRpcRequest) -> DeliveryOutcome;

    async fn broadcast(&self, frame: JsonRpcRequest) -> DeliveryOutcome;

    /// Blocks until the next frame addressed to `agent` arrives.
    async fn deliver(&self, agent: &AgentId) -> Result<JsonRpcRequest, TransportError>;

    /// Register `agent` as a delivery target, creating its inbound queue.
    fn register(&self, agent: AgentId);

    fn unregister(&self, agent: &AgentId);
}
