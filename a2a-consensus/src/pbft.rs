use std::sync::Arc;

use a2a_core::{AgentId, AgentRegistry};
use a2a_crypto::{CryptoProvider, Digest, KeyPair};
use a2a_security::{Action, SecurityIntegrator};
use a2a_smr::StateMachine;
use a2a_transport::{JsonRpcRequest, JsonRpcVersion, Target, Transport};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::byzantine::{ByzantineEvidence, ByzantineTracker};
use crate::election::Candidate;
use crate::error::{ConsensusError, ConsensusOutcome};
use crate::message_log::MessageLog;
use crate::types::{
    ConsensusConfig, ConsensusMessage, ConsensusProposal, ConsensusState, MessageKind, Phase, ProposalId, Sequence, View,
};
use crate::view_change::{NewViewCertificate, PreparedInstance, ViewChangeCoordinator, ViewChangeVote};

/// How many views beyond the current one a message is still worth buffering rather than
/// discarding outright — bounds how far an elected-but-not-yet-adopted leader can get ahead of a
/// slow replica before its messages are simply dropped.
const VIEW_WINDOW: View = 10;

/// Cap on how many messages get buffered for any single future view, so a faulty sender flooding
/// pre-prepares for a view nobody has adopted yet can't grow the buffer without bound.
const MAX_BUFFERED_PER_VIEW: usize = 64;

/// A proposal that has achieved commit quorum, appended to the in-memory replicated log.
#[derive(Debug, Clone)]
pub struct CommittedEntry {
    pub proposal: ConsensusProposal,
    pub view: View,
    pub sequence: Sequence,
    pub committed_at: chrono::DateTime<Utc>,
}

/// The three-phase PBFT engine. Owns the per-node protocol state and the collaborators
/// (message log, view-change coordinator, Byzantine tracker) that implement it; talks to the rest
/// of the world only through [`Transport`], [`CryptoProvider`], and the shared [`AgentRegistry`]
/// (DashMap-backed proposal tracking, an `Arc`-cloneable handle usable from spawned background
/// tasks).
pub struct PbftEngine {
    node_id: AgentId,
    keys: KeyPair,
    config: ConsensusConfig,
    crypto: Arc<dyn CryptoProvider>,
    transport: Arc<dyn Transport>,
    registry: AgentRegistry,
    state_machine: Arc<StateMachine>,
    state: RwLock<ConsensusState>,
    log: Arc<MessageLog>,
    view_change: Arc<ViewChangeCoordinator>,
    byzantine: Arc<ByzantineTracker>,
    committed_log: RwLock<Vec<CommittedEntry>>,
    /// Proposal bodies awaiting commit, keyed by digest — the only identifier every phase of a
    /// round carries on the wire after `pre-prepare`.
    pending_proposals: DashMap<Digest, ConsensusProposal>,
    /// Messages for a view ahead of `state.view`, bounded by [`VIEW_WINDOW`]/[`MAX_BUFFERED_PER_VIEW`]
    /// and replayed once [`Self::adopt_view`] catches this node up to them.
    future_messages: DashMap<View, Vec<ConsensusMessage>>,
    /// Gates inbound messages behind identity binding and trust, when attached. Left unset in
    /// tests and in deployments that trust every registered agent by virtue of registration
    /// itself.
    security: Option<Arc<SecurityIntegrator>>,
}

impl PbftEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: AgentId,
        keys: KeyPair,
        config: ConsensusConfig,
        crypto: Arc<dyn CryptoProvider>,
        transport: Arc<dyn Transport>,
        registry: AgentRegistry,
        state_machine: Arc<StateMachine>,
        view_change: Arc<ViewChangeCoordinator>,
        byzantine: Arc<ByzantineTracker>,
    ) -> Self {
        let active_set: Vec<AgentId> = registry.active_agents().iter().map(|a| a.id).collect();
        let leader = if active_set.is_empty() {
            node_id
        } else {
            ConsensusState::leader_for(0, &active_set)
        };
        Self {
            node_id,
            keys,
            config,
            crypto,
            transport,
            registry,
            state_machine,
            state: RwLock::new(ConsensusState { view: 0, sequence: 0, leader, active_set }),
            log: Arc::new(MessageLog::new()),
            view_change,
            byzantine,
            committed_log: RwLock::new(Vec::new()),
            pending_proposals: DashMap::new(),
            future_messages: DashMap::new(),
            security: None,
        }
    }

    /// Attaches an identity/trust gate. Every inbound message's sender is checked against
    /// [`Action::ConsensusVoting`] before it reaches protocol handling.
    pub fn with_security(mut self, security: Arc<SecurityIntegrator>) -> Self {
        self.security = Some(security);
        self
    }

    pub async fn current_view(&self) -> View {
        self.state.read().await.view
    }

    pub async fn is_leader(&self) -> bool {
        self.state.read().await.leader == self.node_id
    }

    /// Leader-only: start a consensus round for `content`. Assigns the next sequence number,
    /// broadcasts `pre-prepare`, and registers the instance in the message log. Callers observe
    /// eventual commit via [`Self::committed_entries`] or the side effect applied to the state
    /// machine.
    pub async fn start_consensus(&self, content: serde_json::Value) -> Result<ProposalId, ConsensusError> {
        if !self.is_leader().await {
            return Err(ConsensusError::Protocol("only the leader may start a consensus round".into()));
        }
        let proposal = ConsensusProposal::new(content, self.node_id, self.crypto.as_ref());
        let sequence = {
            let mut state = self.state.write().await;
            state.sequence += 1;
            state.sequence
        };
        let view = self.current_view().await;
        let key = (view, sequence, proposal.digest);

        self.log.record_pre_prepare(key, self.node_id, proposal.clone());
        self.pending_proposals.insert(proposal.digest, proposal.clone());

        let message = self.sign_message(MessageKind::PrePrepare, view, sequence, proposal.digest, Some(proposal.clone()));
        self.broadcast(&message).await;

        info!(view, sequence, proposal_id = %proposal.id, "started consensus round");
        Ok(proposal.id)
    }

    /// Dispatch an inbound [`ConsensusMessage`] to the right handler, returning the protocol
    /// outcome rather than a caller-facing error for expected branches (not-yet-quorum, stale
    /// view).
    pub async fn process_message(&self, message: ConsensusMessage) -> ConsensusOutcome {
        if !self.verify_message(&message) {
            self.byzantine.report(ByzantineEvidence::InvalidSignature { agent: message.sender });
            return ConsensusOutcome::ByzantineEvidence("invalid signature".into());
        }

        if let Some(security) = &self.security {
            if let Err(e) = security.authorize_participation(message.sender, Action::ConsensusVoting) {
                warn!(sender = %message.sender, error = %e, "rejecting consensus message: not authorized");
                return ConsensusOutcome::ProtocolError(format!("sender not authorized: {e}"));
            }
        }

        let current_view = self.current_view().await;
        if message.view < current_view {
            debug!(sender = %message.sender, "dropping message from stale view");
            return ConsensusOutcome::ProtocolError("stale view".into());
        }

        match message.kind {
            MessageKind::PrePrepare | MessageKind::Prepare | MessageKind::Commit if message.view > current_view => {
                self.buffer_future_message(message, current_view)
            }
            MessageKind::PrePrepare => self.handle_pre_prepare(message).await,
            MessageKind::Prepare => self.handle_prepare(message).await,
            MessageKind::Commit => self.handle_commit(message).await,
            MessageKind::ViewChange => self.handle_view_change(message).await,
            MessageKind::NewView => self.handle_new_view(message).await,
        }
    }

    /// Buffer a pre-prepare/prepare/commit for a view this node hasn't adopted yet, rather than
    /// rejecting it outright: a node slightly behind a just-elected leader replays these once it
    /// catches up in [`Self::adopt_view`].
    fn buffer_future_message(&self, message: ConsensusMessage, current_view: View) -> ConsensusOutcome {
        if message.view > current_view + VIEW_WINDOW {
            debug!(view = message.view, current_view, "dropping message beyond the view buffering window");
            return ConsensusOutcome::ProtocolError("view beyond buffering window".into());
        }
        let mut bucket = self.future_messages.entry(message.view).or_default();
        if bucket.len() >= MAX_BUFFERED_PER_VIEW {
            return ConsensusOutcome::ProtocolError("future view buffer full".into());
        }
        bucket.push(message);
        ConsensusOutcome::Pending
    }

    async fn handle_pre_prepare(&self, message: ConsensusMessage) -> ConsensusOutcome {
        let state = self.state.read().await;
        if message.sender != state.leader || message.view != state.view {
            return ConsensusOutcome::ProtocolError("pre-prepare from non-leader or wrong view".into());
        }
        drop(state);

        let Some(proposal) = message.proposal.clone() else {
            return ConsensusOutcome::ProtocolError("pre-prepare missing proposal body".into());
        };
        if proposal.digest != message.digest {
            self.byzantine.report(ByzantineEvidence::ConflictingDigest {
                agent: message.sender,
                view: message.view,
                sequence: message.sequence,
            });
            return ConsensusOutcome::ByzantineEvidence("pre-prepare digest mismatch".into());
        }

        let key = message.instance_key();
        if !self.log.record_pre_prepare(key, message.sender, proposal.clone()) {
            self.byzantine.report(ByzantineEvidence::LeaderEquivocation {
                agent: message.sender,
                view: message.view,
            });
            return ConsensusOutcome::ByzantineEvidence("leader equivocation".into());
        }
        self.pending_proposals.insert(proposal.digest, proposal);

        let reply = self.sign_message(MessageKind::Prepare, message.view, message.sequence, message.digest, None);
        self.broadcast(&reply).await;
        ConsensusOutcome::Pending
    }

    async fn handle_prepare(&self, message: ConsensusMessage) -> ConsensusOutcome {
        let key = message.instance_key();
        let count = self.log.record_prepare(key, message.sender);
        // Q−1 prepares, excluding the leader's own pre-prepare.
        let threshold = self.config.quorum().saturating_sub(1);
        if count < threshold {
            return ConsensusOutcome::Pending;
        }
        self.log.set_phase(key, Phase::Prepare);

        let reply = self.sign_message(MessageKind::Commit, message.view, message.sequence, message.digest, None);
        self.broadcast(&reply).await;
        ConsensusOutcome::Pending
    }

    async fn handle_commit(&self, message: ConsensusMessage) -> ConsensusOutcome {
        let key = message.instance_key();
        let count = self.log.record_commit(key, message.sender);
        if count < self.config.quorum() {
            return ConsensusOutcome::Pending;
        }
        if self.log.phase(key) == Some(Phase::Committed) {
            return ConsensusOutcome::Committed;
        }
        self.log.set_phase(key, Phase::Committed);

        let Some((_, proposal)) = self.pending_proposals.remove(&message.digest) else {
            return ConsensusOutcome::ProtocolError("committed proposal not found locally".into());
        };

        if let Err(e) = self.apply_to_state_machine(&proposal).await {
            warn!(error = %e, "committed proposal failed to apply");
            return ConsensusOutcome::Conflict(e.to_string());
        }

        self.committed_log.write().await.push(CommittedEntry {
            proposal: proposal.clone(),
            view: message.view,
            sequence: message.sequence,
            committed_at: Utc::now(),
        });
        info!(view = message.view, sequence = message.sequence, proposal_id = %proposal.id, "consensus reached");
        self.checkpoint_if_due(message.sequence).await;
        ConsensusOutcome::Committed
    }

    /// Every `checkpoint_interval` committed sequences, votes for everything up to and including
    /// this point are moot — truncate them out of the message log so it doesn't grow without
    /// bound across a long-running node. Uses consensus's own sequence numbering rather than the
    /// state machine's applied-operation count, since the two only line up when every committed
    /// proposal applies exactly one operation with no cascaded replay from the pending queue.
    async fn checkpoint_if_due(&self, committed_sequence: Sequence) {
        if self.config.checkpoint_interval == 0 || committed_sequence % self.config.checkpoint_interval != 0 {
            return;
        }
        self.log.truncate_before(committed_sequence);
        debug!(sequence = committed_sequence, "message log truncated at stable checkpoint");
    }

    async fn apply_to_state_machine(&self, proposal: &ConsensusProposal) -> Result<(), ConsensusError> {
        let op = serde_json::from_value(proposal.content.clone())
            .map_err(|e| ConsensusError::Operator(format!("proposal content is not a valid state operation: {e}")))?;
        self.state_machine.apply(op).map_err(|e| ConsensusError::State(e.to_string()))
    }

    /// Timeout fired on a pending quorum: start a view change to `current_view + 1`, carrying
    /// forward every instance this node has prepared but not yet seen committed so the new leader
    /// can reconstruct them instead of the round being silently lost.
    pub async fn initiate_view_change(&self, reason: &str) {
        let next_view = self.current_view().await + 1;
        self.view_change.begin(next_view, self.node_id, reason);

        let prepared = self.prepared_set(next_view);
        let vote = self.sign_view_change_vote(next_view, prepared.clone());

        let candidates = self.candidates().await;
        if let Some(certificate) = self.view_change.record_vote(vote.clone(), self.config.quorum(), &candidates) {
            self.finalize_new_view(certificate).await;
        }

        let digest = self.crypto.hash(&Self::prepared_set_bytes(&prepared));
        let mut message = self.sign_message(MessageKind::ViewChange, next_view, 0, digest, None);
        message.view_change_vote = Some(vote);
        self.broadcast(&message).await;
    }

    /// Every instance this node's own log has prepared (or later) in a view strictly before
    /// `next_view`, short of `Phase::Committed` — the prepared set this node's vote carries.
    fn prepared_set(&self, next_view: View) -> Vec<PreparedInstance> {
        self.log
            .prepared_before(next_view)
            .into_iter()
            .filter_map(|((view, sequence, digest), instance)| {
                instance.proposal.map(|proposal| PreparedInstance { view, sequence, digest, proposal })
            })
            .collect()
    }

    fn prepared_set_bytes(prepared: &[PreparedInstance]) -> Vec<u8> {
        serde_json::to_vec(prepared).unwrap_or_default()
    }

    fn view_change_vote_payload(voter: AgentId, target_view: View, last_stable_checkpoint: u64, prepared: &[PreparedInstance]) -> Vec<u8> {
        let mut payload = format!("ViewChange:{voter}:{target_view}:{last_stable_checkpoint}:").into_bytes();
        for instance in prepared {
            payload.extend_from_slice(instance.digest.as_bytes());
        }
        payload
    }

    fn sign_view_change_vote(&self, target_view: View, prepared: Vec<PreparedInstance>) -> ViewChangeVote {
        let payload = Self::view_change_vote_payload(self.node_id, target_view, 0, &prepared);
        let signature = self.keys.sign(&payload);
        ViewChangeVote { voter: self.node_id, target_view, last_stable_checkpoint: 0, prepared, signature }
    }

    fn verify_view_change_vote(&self, vote: &ViewChangeVote) -> bool {
        let Ok(voter) = self.registry.get(&vote.voter) else {
            return false;
        };
        let payload = Self::view_change_vote_payload(vote.voter, vote.target_view, vote.last_stable_checkpoint, &vote.prepared);
        self.crypto.verify(&voter.public_key, &payload, &vote.signature)
    }

    /// A peer's `view-change` vote arrived directly (not yet part of a certificate). Verify it,
    /// record it, and finalize the transition once it completes a quorum.
    async fn handle_view_change(&self, message: ConsensusMessage) -> ConsensusOutcome {
        let Some(vote) = message.view_change_vote.clone() else {
            return ConsensusOutcome::ProtocolError("view-change missing vote payload".into());
        };
        if vote.voter != message.sender || vote.target_view != message.view {
            return ConsensusOutcome::ProtocolError("view-change vote does not match its envelope".into());
        }
        if !self.verify_view_change_vote(&vote) {
            self.byzantine.report(ByzantineEvidence::InvalidSignature { agent: message.sender });
            return ConsensusOutcome::ByzantineEvidence("view-change vote has an invalid signature".into());
        }
        let expected_digest = self.crypto.hash(&Self::prepared_set_bytes(&vote.prepared));
        if expected_digest != message.digest {
            self.byzantine.report(ByzantineEvidence::ConflictingDigest {
                agent: message.sender,
                view: message.view,
                sequence: message.sequence,
            });
            return ConsensusOutcome::ByzantineEvidence("view-change prepared set digest mismatch".into());
        }

        let candidates = self.candidates().await;
        match self.view_change.record_vote(vote, self.config.quorum(), &candidates) {
            Some(certificate) => self.finalize_new_view(certificate).await,
            None => ConsensusOutcome::Pending,
        }
    }

    /// The elected leader's `new-view(v, VCset, PP)` broadcast arrived. Independently re-verify
    /// every vote in `VCset` (≥ quorum, distinct voters, valid signatures) before adopting — a
    /// node must never take a view change on the leader's word alone.
    async fn handle_new_view(&self, message: ConsensusMessage) -> ConsensusOutcome {
        let Some(certificate) = message.new_view.clone() else {
            return ConsensusOutcome::ProtocolError("new-view missing certificate".into());
        };
        if certificate.target_view != message.view || certificate.leader != message.sender {
            return ConsensusOutcome::ProtocolError("new-view certificate does not match its envelope".into());
        }
        let expected_digest = self.crypto.hash(&Self::prepared_set_bytes(&certificate.prepared));
        if expected_digest != message.digest {
            self.byzantine.report(ByzantineEvidence::ConflictingDigest {
                agent: message.sender,
                view: message.view,
                sequence: message.sequence,
            });
            return ConsensusOutcome::ByzantineEvidence("new-view prepared set digest mismatch".into());
        }

        let quorum = self.config.quorum();
        let distinct_voters: std::collections::HashSet<AgentId> = certificate.votes.iter().map(|v| v.voter).collect();
        if distinct_voters.len() < quorum || certificate.votes.len() != distinct_voters.len() {
            return ConsensusOutcome::ProtocolError("new-view certificate lacks a valid view-change quorum".into());
        }
        for vote in &certificate.votes {
            if vote.target_view != certificate.target_view {
                return ConsensusOutcome::ProtocolError("view-change vote targets the wrong view".into());
            }
            if !self.verify_view_change_vote(vote) {
                self.byzantine.report(ByzantineEvidence::InvalidSignature { agent: vote.voter });
                return ConsensusOutcome::ByzantineEvidence("view-change vote has an invalid signature".into());
            }
        }

        self.finalize_new_view(certificate).await
    }

    /// Common path for both self-collected and peer-broadcast quorums: seed the reconstructed
    /// prepared set into the log at the new view, adopt it, and — if this node is the newly
    /// elected leader — broadcast the certificate as the `new-view` frame.
    async fn finalize_new_view(&self, certificate: NewViewCertificate) -> ConsensusOutcome {
        for instance in &certificate.prepared {
            let key = (certificate.target_view, instance.sequence, instance.digest);
            self.log.record_pre_prepare(key, certificate.leader, instance.proposal.clone());
            self.log.set_phase(key, Phase::Prepare);
            self.pending_proposals.insert(instance.digest, instance.proposal.clone());
        }
        if let Some(max_sequence) = certificate.prepared.iter().map(|p| p.sequence).max() {
            let mut state = self.state.write().await;
            if max_sequence > state.sequence {
                state.sequence = max_sequence;
            }
        }

        self.adopt_view(certificate.target_view, certificate.leader).await;

        if self.node_id == certificate.leader {
            let bytes = Self::prepared_set_bytes(&certificate.prepared);
            let digest = self.crypto.hash(&bytes);
            let mut frame = self.sign_message(MessageKind::NewView, certificate.target_view, 0, digest, None);
            frame.new_view = Some(certificate.clone());
            self.broadcast(&frame).await;
        }
        info!(view = certificate.target_view, prepared = certificate.prepared.len(), "new-view transition complete");
        ConsensusOutcome::ViewAdopted(certificate.target_view)
    }

    async fn adopt_view(&self, view: View, leader: AgentId) {
        {
            let mut state = self.state.write().await;
            state.view = view;
            state.leader = leader;
        }
        self.view_change.adopt(view);
        info!(view, leader = %leader, "adopted new view");

        let buffered = self.future_messages.remove(&view).map(|(_, messages)| messages).unwrap_or_default();
        for buffered_message in buffered {
            debug!(view, sender = %buffered_message.sender, "replaying buffered message after view adoption");
            // process_message can itself reach a quorum and recurse back into adopt_view (via
            // handle_view_change/handle_new_view), so this call must be boxed to keep the
            // resulting future's type finite.
            let _ = Box::pin(self.process_message(buffered_message)).await;
        }
    }

    async fn candidates(&self) -> Vec<Candidate> {
        self.registry
            .active_agents()
            .into_iter()
            .filter(|agent| !self.byzantine.is_suspected(&agent.id))
            .map(|agent| Candidate {
                id: agent.id,
                reputation: agent.reputation(),
                stake: 0.5,
                performance: 0.5,
                availability: 1.0,
                consecutive_terms: 0,
            })
            .collect()
    }

    fn verify_message(&self, message: &ConsensusMessage) -> bool {
        let Ok(sender) = self.registry.get(&message.sender) else {
            return false;
        };
        let payload = Self::signing_payload(message.kind, message.view, message.sequence, &message.digest);
        self.crypto.verify(&sender.public_key, &payload, &message.signature)
    }

    fn signing_payload(kind: MessageKind, view: View, sequence: Sequence, digest: &Digest) -> Vec<u8> {
        format!("{kind:?}:{view}:{sequence}:{digest}").into_bytes()
    }

    fn sign_message(
        &self,
        kind: MessageKind,
        view: View,
        sequence: Sequence,
        digest: Digest,
        proposal: Option<ConsensusProposal>,
    ) -> ConsensusMessage {
        let payload = Self::signing_payload(kind, view, sequence, &digest);
        let signature = self.keys.sign(&payload);
        ConsensusMessage {
            kind,
            view,
            sequence,
            digest,
            sender: self.node_id,
            signature,
            proposal,
            view_change_vote: None,
            new_view: None,
        }
    }

    async fn broadcast(&self, message: &ConsensusMessage) {
        let frame = self.to_frame(message);
        self.transport.broadcast(frame).await;
    }

    fn to_frame(&self, message: &ConsensusMessage) -> JsonRpcRequest {
        let method = match message.kind {
            MessageKind::PrePrepare => "consensus.pre-prepare",
            MessageKind::Prepare => "consensus.prepare",
            MessageKind::Commit => "consensus.commit",
            MessageKind::ViewChange => "consensus.view-change",
            MessageKind::NewView => "consensus.new-view",
        };
        JsonRpcRequest {
            jsonrpc: JsonRpcVersion,
            method: method.to_string(),
            params: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
            id: None,
            from: self.node_id,
            to: Target::Broadcast,
            timestamp: Utc::now(),
            message_type: "consensus".to_string(),
            priority: None,
            signature: None,
            nonce: None,
            context: None,
        }
    }

    pub async fn committed_entries(&self) -> Vec<CommittedEntry> {
        self.committed_log.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::Agent;
    use a2a_crypto::Ed25519Blake3Provider;
    use a2a_transport::InMemoryTransport;

    async fn sample_engine() -> (PbftEngine, AgentId) {
        let registry = AgentRegistry::new();
        let keys = KeyPair::generate();
        let agent = Agent::new(keys.public_key());
        let node_id = agent.id;
        registry.register(agent).unwrap();
        registry.activate(&node_id).unwrap();

        let transport = Arc::new(InMemoryTransport::new());
        transport.register(node_id);

        let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Blake3Provider);
        let view_change = Arc::new(ViewChangeCoordinator::new(Arc::new(crate::election::RoundRobin)));
        let byzantine = Arc::new(ByzantineTracker::new(registry.clone(), 3));
        let state_machine = Arc::new(StateMachine::new());

        let engine = PbftEngine::new(
            node_id,
            keys,
            ConsensusConfig { total_agents: 1, ..ConsensusConfig::default() },
            crypto,
            transport,
            registry,
            state_machine,
            view_change,
            byzantine,
        );
        (engine, node_id)
    }

    #[tokio::test]
    async fn single_node_cluster_is_its_own_leader() {
        let (engine, _node_id) = sample_engine().await;
        assert!(engine.is_leader().await);
        assert_eq!(engine.current_view().await, 0);
    }

    #[tokio::test]
    async fn non_leader_cannot_start_consensus() {
        let (engine, _) = sample_engine().await;
        {
            let mut state = engine.state.write().await;
            state.leader = AgentId::new();
        }
        let result = engine.start_consensus(serde_json::json!({"type": "create"})).await;
        assert!(result.is_err());
    }

    /// A 4-node registry/transport shared across every node's engine, so votes signed by one
    /// node's keys verify against the same `AgentRegistry` entry another node's engine reads.
    struct Cluster {
        registry: AgentRegistry,
        crypto: Arc<dyn CryptoProvider>,
        keys: Vec<KeyPair>,
        ids: Vec<AgentId>,
    }

    impl Cluster {
        fn new(n: usize) -> Self {
            let registry = AgentRegistry::new();
            let crypto: Arc<dyn CryptoProvider> = Arc::new(Ed25519Blake3Provider);
            let mut keys = Vec::new();
            let mut ids = Vec::new();
            for _ in 0..n {
                let kp = KeyPair::generate();
                let agent = Agent::new(kp.public_key());
                let id = agent.id;
                registry.register(agent).unwrap();
                registry.activate(&id).unwrap();
                keys.push(kp);
                ids.push(id);
            }
            Self { registry, crypto, keys, ids }
        }

        fn engine(&self, index: usize, config: ConsensusConfig) -> PbftEngine {
            let transport = Arc::new(InMemoryTransport::new());
            transport.register(self.ids[index]);
            let view_change = Arc::new(ViewChangeCoordinator::new(Arc::new(crate::election::RoundRobin)));
            let byzantine = Arc::new(ByzantineTracker::new(self.registry.clone(), 3));
            let state_machine = Arc::new(StateMachine::new());
            PbftEngine::new(
                self.ids[index],
                self.keys[index].clone(),
                config,
                self.crypto.clone(),
                transport,
                self.registry.clone(),
                state_machine,
                view_change,
                byzantine,
            )
        }

        fn sign_view_change_vote(&self, index: usize, target_view: View, prepared: Vec<PreparedInstance>) -> ViewChangeVote {
            let payload = PbftEngine::view_change_vote_payload(self.ids[index], target_view, 0, &prepared);
            let signature = self.keys[index].sign(&payload);
            ViewChangeVote { voter: self.ids[index], target_view, last_stable_checkpoint: 0, prepared, signature }
        }
    }

    fn cluster_config() -> ConsensusConfig {
        ConsensusConfig { total_agents: 4, ..ConsensusConfig::default() }
    }

    #[tokio::test]
    async fn future_view_pre_prepare_is_buffered_then_replayed_on_adoption() {
        let cluster = Cluster::new(4);
        let engine = cluster.engine(0, cluster_config());

        let proposal = ConsensusProposal::new(serde_json::json!({"op": "noop"}), cluster.ids[1], cluster.crypto.as_ref());
        let payload = PbftEngine::signing_payload(MessageKind::PrePrepare, 1, 1, &proposal.digest);
        let signature = cluster.keys[1].sign(&payload);
        let message = ConsensusMessage {
            kind: MessageKind::PrePrepare,
            view: 1,
            sequence: 1,
            digest: proposal.digest,
            sender: cluster.ids[1],
            signature,
            proposal: Some(proposal.clone()),
            view_change_vote: None,
            new_view: None,
        };

        let outcome = engine.process_message(message).await;
        assert_eq!(outcome, ConsensusOutcome::Pending);
        assert_eq!(engine.future_messages.get(&1).map(|b| b.len()), Some(1));

        engine.adopt_view(1, cluster.ids[1]).await;
        assert!(engine.future_messages.get(&1).is_none());
        assert_eq!(engine.log.phase((1, 1, proposal.digest)), Some(Phase::PrePrepare));
    }

    #[tokio::test]
    async fn view_change_quorum_adopts_new_view_and_carries_prepared_proposal() {
        let cluster = Cluster::new(4);
        let engine = cluster.engine(0, cluster_config());

        // Node 0 prepared this proposal in view 0 before the view change.
        let proposal = ConsensusProposal::new(serde_json::json!({"op": "prepared"}), cluster.ids[0], cluster.crypto.as_ref());
        let key = (0, 1, proposal.digest);
        engine.log.record_pre_prepare(key, cluster.ids[0], proposal.clone());
        engine.log.set_phase(key, Phase::Prepare);

        let prepared = vec![PreparedInstance { view: 0, sequence: 1, digest: proposal.digest, proposal: proposal.clone() }];
        let prepared_bytes = PbftEngine::prepared_set_bytes(&prepared);
        let digest = cluster.crypto.hash(&prepared_bytes);

        for voter in 1..4 {
            let vote = cluster.sign_view_change_vote(voter, 1, prepared.clone());
            let payload = PbftEngine::signing_payload(MessageKind::ViewChange, 1, 0, &digest);
            let signature = cluster.keys[voter].sign(&payload);
            let message = ConsensusMessage {
                kind: MessageKind::ViewChange,
                view: 1,
                sequence: 0,
                digest,
                sender: cluster.ids[voter],
                signature,
                proposal: None,
                view_change_vote: Some(vote),
                new_view: None,
            };
            let outcome = engine.process_message(message).await;
            if voter < 3 {
                assert_eq!(outcome, ConsensusOutcome::Pending);
            } else {
                assert_eq!(outcome, ConsensusOutcome::ViewAdopted(1));
            }
        }

        assert_eq!(engine.current_view().await, 1);
        // The instance prepared before the view change survives into the new view rather than
        // being lost, satisfying the "if i commits p at s, j commits p' at s then p = p'" safety
        // invariant across the transition.
        let carried = engine.log.phase((1, 1, proposal.digest));
        assert!(carried.is_some() && carried.unwrap() >= Phase::Prepare);
    }

    #[tokio::test]
    async fn new_view_with_insufficient_votes_is_rejected() {
        let cluster = Cluster::new(4);
        let engine = cluster.engine(0, cluster_config());

        let leader = cluster.ids[1];
        let votes: Vec<ViewChangeVote> = (1..3).map(|i| cluster.sign_view_change_vote(i, 1, vec![])).collect();
        let certificate = NewViewCertificate { target_view: 1, leader, prepared: vec![], votes };
        let bytes = PbftEngine::prepared_set_bytes(&certificate.prepared);
        let digest = cluster.crypto.hash(&bytes);
        let payload = PbftEngine::signing_payload(MessageKind::NewView, 1, 0, &digest);
        let signature = cluster.keys[1].sign(&payload);
        let message = ConsensusMessage {
            kind: MessageKind::NewView,
            view: 1,
            sequence: 0,
            digest,
            sender: leader,
            signature,
            proposal: None,
            view_change_vote: None,
            new_view: Some(certificate),
        };

        let outcome = engine.process_message(message).await;
        assert_eq!(outcome, ConsensusOutcome::ProtocolError("new-view certificate lacks a valid view-change quorum".into()));
        assert_eq!(engine.current_view().await, 0);
    }

    #[tokio::test]
    async fn new_view_with_forged_vote_signature_is_rejected_as_byzantine_evidence() {
        let cluster = Cluster::new(4);
        let engine = cluster.engine(0, cluster_config());

        let leader = cluster.ids[1];
        let mut votes: Vec<ViewChangeVote> = (1..4).map(|i| cluster.sign_view_change_vote(i, 1, vec![])).collect();
        // Tamper with one vote's signature after the fact.
        votes[0].signature = cluster.keys[2].sign(b"not-the-real-payload");

        let certificate = NewViewCertificate { target_view: 1, leader, prepared: vec![], votes };
        let bytes = PbftEngine::prepared_set_bytes(&certificate.prepared);
        let digest = cluster.crypto.hash(&bytes);
        let payload = PbftEngine::signing_payload(MessageKind::NewView, 1, 0, &digest);
        let signature = cluster.keys[1].sign(&payload);
        let message = ConsensusMessage {
            kind: MessageKind::NewView,
            view: 1,
            sequence: 0,
            digest,
            sender: leader,
            signature,
            proposal: None,
            view_change_vote: None,
            new_view: Some(certificate),
        };

        let outcome = engine.process_message(message).await;
        assert!(matches!(outcome, ConsensusOutcome::ByzantineEvidence(_)));
        assert_eq!(engine.current_view().await, 0);
    }
}
