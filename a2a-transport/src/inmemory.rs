use std::sync::Arc;

use a2a_core::AgentId;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::frame::{JsonRpcRequest, Target};
use crate::transport::{DeliveryOutcome, Transport};
use crate::TransportError;

type Inbox = Mutex<mpsc::UnboundedReceiver<JsonRpcRequest>>;

/// Reference `Transport` for single-process clusters and tests: every registered agent gets an
/// unbounded `tokio::mpsc` channel, and `send`/`broadcast` push directly into the recipients'
/// queues. No network I/O, no framing over bytes — a stand-in role a production deployment's
/// `NetworkManager` stub plays until a real P2P stack is wired in.
#[derive(Clone)]
pub struct InMemoryTransport {
    outboxes: Arc<DashMap<AgentId, mpsc::UnboundedSender<JsonRpcRequest>>>,
    inboxes: Arc<DashMap<AgentId, Arc<Inbox>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            outboxes: Arc::new(DashMap::new()),
            inboxes: Arc::new(DashMap::new()),
        }
    }

    fn send_to_one(&self, to: &AgentId, frame: &JsonRpcRequest) -> DeliveryOutcome {
        match self.outboxes.get(to) {
            Some(sender) => match sender.send(frame.clone()) {
                Ok(()) => DeliveryOutcome::Queued,
                Err(_) => {
                    warn!(agent = %to, "inbox closed, dropping frame");
                    DeliveryOutcome::Failed
                }
            },
            None => {
                warn!(agent = %to, "no registered inbox, dropping frame");
                DeliveryOutcome::Failed
            }
        }
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, to: &AgentId, frame: JsonRpcRequest) -> DeliveryOutcome {
        self.send_to_one(to, &frame)
    }

    async fn broadcast(&self, frame: JsonRpcRequest) -> DeliveryOutcome {
        let targets: Vec<AgentId> = match &frame.to {
            Target::Broadcast => self.outboxes.iter().map(|e| *e.key()).collect(),
            Target::Single(id) => vec![*id],
            Target::Multiple(ids) => ids.clone(),
        };
        if targets.is_empty() {
            return DeliveryOutcome::Failed;
        }
        let mut any_failed = false;
        for target in targets {
            if self.send_to_one(&target, &frame) == DeliveryOutcome::Failed {
                any_failed = true;
            }
        }
        if any_failed {
            DeliveryOutcome::Failed
        } else {
            DeliveryOutcome::Queued
        }
    }

    async fn deliver(&self, agent: &AgentId) -> Result<JsonRpcRequest, TransportError> {
        let inbox = self
            .inboxes
            .get(agent)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownTarget(agent.to_string()))?;
        let mut guard = inbox.lock().await;
        guard
            .recv()
            .await
            .ok_or_else(|| TransportError::ChannelClosed(agent.to_string()))
    }

    fn register(&self, agent: AgentId) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.insert(agent, tx);
        self.inboxes.insert(agent, Arc::new(Mutex::new(rx)));
    }

    fn unregister(&self, agent: &AgentId) {
        self.outboxes.remove(agent);
        self.inboxes.remove(agent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(to: Target) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: crate::frame::JsonRpcVersion,
            method: "consensus.prepare".to_string(),
            params: serde_json::json!({"view": 0, "sequence": 1}),
            id: None,
            from: AgentId::new(),
            to,
            timestamp: chrono::Utc::now(),
            message_type: "consensus".to_string(),
            priority: None,
            signature: None,
            nonce: None,
            context: None,
        }
    }

    #[tokio::test]
    async fn send_then_deliver_round_trips() {
        let transport = InMemoryTransport::new();
        let agent = AgentId::new();
        transport.register(agent);
        let frame = sample_frame(Target::Single(agent));
        assert_eq!(transport.send(&agent, frame.clone()).await, DeliveryOutcome::Queued);
        let received = transport.deliver(&agent).await.unwrap();
        assert_eq!(received.method, frame.method);
    }

    #[tokio::test]
    async fn send_to_unregistered_agent_fails() {
        let transport = InMemoryTransport::new();
        let agent = AgentId::new();
        let frame = sample_frame(Target::Single(agent));
        assert_eq!(transport.send(&agent, frame).await, DeliveryOutcome::Failed);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_registered_agents() {
        let transport = InMemoryTransport::new();
        let a = AgentId::new();
        let b = AgentId::new();
        transport.register(a);
        transport.register(b);
        let frame = sample_frame(Target::Broadcast);
        assert_eq!(transport.broadcast(frame).await, DeliveryOutcome::Queued);
        assert!(transport.deliver(&a).await.is_ok());
        assert!(transport.deliver(&b).await.is_ok());
    }

    #[tokio::test]
    async fn unregister_removes_inbox() {
        let transport = InMemoryTransport::new();
        let agent = AgentId::new();
        transport.register(agent);
        transport.unregister(&agent);
        assert!(matches!(
            transport.deliver(&agent).await,
            Err(TransportError::UnknownTarget(_))
        ));
    }
}
