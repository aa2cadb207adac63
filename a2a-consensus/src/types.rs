use std::time::Duration;

use a2a_core::AgentId;
use a2a_crypto::{Digest, Signature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::view_change::{NewViewCertificate, ViewChangeVote};

/// Which election algorithm [`crate::election::ElectionAlgorithm`] a node was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionAlgorithmKind {
    RoundRobin,
    Reputation,
    Stake,
    Performance,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub total_agents: usize,
    pub prepare_timeout: Duration,
    pub view_change_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub election_timeout: Duration,
    pub election_timeout_min: Duration,
    pub election_timeout_max: Duration,
    pub max_consecutive_terms: u32,
    pub election_algorithm: ElectionAlgorithmKind,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub pipeline_depth: usize,
    pub speculative: bool,
    pub digest_cache_size: usize,
    /// Number of committed sequences between stable checkpoints, at which point the message log
    /// truncates voting instances it no longer needs.
    pub checkpoint_interval: u64,
}

impl ConsensusConfig {
    /// `f = ⌊(n−1)/3⌋`, the maximum number of Byzantine-faulty agents this configuration
    /// tolerates.
    pub fn fault_threshold(&self) -> usize {
        self.total_agents.saturating_sub(1) / 3
    }

    /// `Q = 2f+1 = ⌊2n/3⌋+1`.
    pub fn quorum(&self) -> usize {
        2 * self.fault_threshold() + 1
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            total_agents: 4,
            prepare_timeout: Duration::from_secs(30),
            view_change_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(5),
            election_timeout: Duration::from_secs(15),
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            max_consecutive_terms: 3,
            election_algorithm: ElectionAlgorithmKind::Hybrid,
            batch_size: 10,
            batch_timeout: Duration::from_millis(100),
            pipeline_depth: 3,
            speculative: true,
            digest_cache_size: 1000,
            checkpoint_interval: 100,
        }
    }
}

pub type ProposalId = Uuid;
pub type View = u64;
pub type Sequence = u64;

/// A value proposed for Byzantine agreement. `digest` binds `id` to `content`: any tampering
/// with `content` in flight is detectable without re-running application logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusProposal {
    pub id: ProposalId,
    pub content: serde_json::Value,
    pub proposer: AgentId,
    pub timestamp: DateTime<Utc>,
    pub digest: Digest,
}

impl ConsensusProposal {
    pub fn new(content: serde_json::Value, proposer: AgentId, provider: &dyn a2a_crypto::CryptoProvider) -> Self {
        let digest = provider.hash(content.to_string().as_bytes());
        Self {
            id: Uuid::new_v4(),
            content,
            proposer,
            timestamp: Utc::now(),
            digest,
        }
    }
}

/// The three PBFT phases plus the two view-change frame types, as carried over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    PrePrepare,
    Prepare,
    Commit,
    ViewChange,
    NewView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusMessage {
    pub kind: MessageKind,
    pub view: View,
    pub sequence: Sequence,
    pub digest: Digest,
    pub sender: AgentId,
    pub signature: Signature,
    /// Present only on `pre-prepare`, carrying the proposal body itself.
    pub proposal: Option<ConsensusProposal>,
    /// Present only on `view-change`, carrying this sender's vote.
    pub view_change_vote: Option<ViewChangeVote>,
    /// Present only on `new-view`, carrying the VCset + PP certificate justifying the transition.
    pub new_view: Option<NewViewCertificate>,
}

impl ConsensusMessage {
    /// Identity key PBFT uses to deduplicate and to index the message log: `(kind, sender, view,
    /// sequence, digest)`.
    pub fn dedup_key(&self) -> (MessageKind, AgentId, View, Sequence, Digest) {
        (self.kind, self.sender, self.view, self.sequence, self.digest)
    }

    pub fn instance_key(&self) -> (View, Sequence, Digest) {
        (self.view, self.sequence, self.digest)
    }
}

/// Phase a particular `(view, sequence)` voting instance has reached. Transitions strictly
/// forward; nothing moves this backwards except starting a brand new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    PrePrepare,
    Prepare,
    Commit,
    Committed,
}

/// Per-node PBFT state for the currently active view.
#[derive(Debug, Clone)]
pub struct ConsensusState {
    pub view: View,
    pub sequence: Sequence,
    pub leader: AgentId,
    pub active_set: Vec<AgentId>,
}

impl ConsensusState {
    pub fn leader_for(view: View, active_set: &[AgentId]) -> AgentId {
        let idx = (view as usize) % active_set.len().max(1);
        active_set[idx]
    }
}
