use std::collections::HashMap;
use std::sync::Arc;

use a2a_core::AgentId;
use a2a_crypto::{Digest, Signature};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::election::{Candidate, ElectionAlgorithm};
use crate::types::{ConsensusProposal, Sequence, View};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChangeState {
    Stable,
    Changing,
}

/// One `(view, sequence)` instance that had reached `Phase::Prepare` or later in the view a voter
/// is leaving — carried forward so the new leader can reconstruct it instead of letting it be
/// silently dropped across the view change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedInstance {
    pub view: View,
    pub sequence: Sequence,
    pub digest: Digest,
    pub proposal: ConsensusProposal,
}

/// A view-change vote from one agent: the view it wants to move to, the prepared instances it is
/// carrying forward, and its own signature over `(voter, target_view, last_stable_checkpoint,
/// prepared digests)` — kept alongside the vote itself so its authenticity survives being relayed
/// inside a [`NewViewCertificate`] separately from the envelope it first arrived in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewChangeVote {
    pub voter: AgentId,
    pub target_view: View,
    pub last_stable_checkpoint: u64,
    pub prepared: Vec<PreparedInstance>,
    pub signature: Signature,
}

/// The `new-view(v, VCset, PP)` certificate: the quorum of view-change votes (`votes`) justifying
/// the move to `target_view` under `leader`, and the minimally consistent pre-prepare set (`PP`)
/// reconstructed from them by picking, per sequence, the prepared instance from the highest view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewViewCertificate {
    pub target_view: View,
    pub leader: AgentId,
    pub prepared: Vec<PreparedInstance>,
    pub votes: Vec<ViewChangeVote>,
}

/// Drives the view-change protocol: collects `view-change(v+1)` votes, each carrying its own
/// prepared set, and once a quorum is reached, computes the new leader via the configured
/// [`ElectionAlgorithm`] and assembles a [`NewViewCertificate`] ready to broadcast. Heartbeat
/// liveness tracking and signature verification both live in the PBFT engine, which owns the
/// timer and the keys/registry this coordinator has no need to see.
pub struct ViewChangeCoordinator {
    algorithm: Arc<dyn ElectionAlgorithm>,
    state: Mutex<ViewChangeState>,
    votes: DashMap<View, HashMap<AgentId, ViewChangeVote>>,
}

impl ViewChangeCoordinator {
    pub fn new(algorithm: Arc<dyn ElectionAlgorithm>) -> Self {
        Self {
            algorithm,
            state: Mutex::new(ViewChangeState::Stable),
            votes: DashMap::new(),
        }
    }

    pub fn state(&self) -> ViewChangeState {
        *self.state.lock()
    }

    /// Enter `Changing` for `target_view`. The caller still records its own signed
    /// [`ViewChangeVote`] via [`Self::record_vote`] once it has assembled its prepared set.
    pub fn begin(&self, target_view: View, self_id: AgentId, reason: &str) {
        warn!(target_view, voter = %self_id, reason, "initiating view change");
        *self.state.lock() = ViewChangeState::Changing;
        self.votes.entry(target_view).or_default();
    }

    /// Record a vote the caller has already signature-checked. Returns a [`NewViewCertificate`]
    /// once `quorum` distinct voters have voted for `vote.target_view`, computing the new leader
    /// from `candidates` via the configured election algorithm and merging every vote's prepared
    /// set into `PP`; returns `None` if quorum isn't reached yet.
    pub fn record_vote(&self, vote: ViewChangeVote, quorum: usize, candidates: &[Candidate]) -> Option<NewViewCertificate> {
        let target_view = vote.target_view;
        let count = {
            let mut entry = self.votes.entry(target_view).or_default();
            entry.insert(vote.voter, vote);
            entry.len()
        };
        if count < quorum {
            return None;
        }
        let entry = self.votes.get(&target_view)?;
        let leader = self.algorithm.pick(candidates, target_view);
        let prepared = merge_prepared(entry.value());
        let votes: Vec<ViewChangeVote> = entry.value().values().cloned().collect();
        info!(view = target_view, leader = %leader, votes = votes.len(), prepared = prepared.len(), "view change quorum reached");
        Some(NewViewCertificate { target_view, leader, prepared, votes })
    }

    /// Adopt the new view: clear votes for it and return to `Stable`.
    pub fn adopt(&self, view: View) {
        self.votes.remove(&view);
        *self.state.lock() = ViewChangeState::Stable;
    }

    pub fn vote_count(&self, view: View) -> usize {
        self.votes.get(&view).map(|v| v.len()).unwrap_or(0)
    }
}

/// Per sequence, keep the prepared instance from the highest view — the "minimally consistent"
/// reconstruction: every sequence a quorum of voters prepared gets carried forward exactly once,
/// preferring whichever vote observed it most recently.
fn merge_prepared(votes: &HashMap<AgentId, ViewChangeVote>) -> Vec<PreparedInstance> {
    let mut by_sequence: HashMap<Sequence, PreparedInstance> = HashMap::new();
    for vote in votes.values() {
        for prepared in &vote.prepared {
            match by_sequence.get(&prepared.sequence) {
                Some(existing) if existing.view >= prepared.view => {}
                _ => {
                    by_sequence.insert(prepared.sequence, prepared.clone());
                }
            }
        }
    }
    let mut merged: Vec<PreparedInstance> = by_sequence.into_values().collect();
    merged.sort_by_key(|p| p.sequence);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::election::RoundRobin;
    use a2a_crypto::{CryptoProvider, Ed25519Blake3Provider, KeyPair};

    fn candidate(seed: u8) -> Candidate {
        Candidate {
            id: AgentId(uuid::Uuid::from_bytes([seed; 16])),
            reputation: 0.5,
            stake: 0.5,
            performance: 0.5,
            availability: 0.5,
            consecutive_terms: 0,
        }
    }

    fn vote(voter: AgentId, target_view: View, prepared: Vec<PreparedInstance>) -> ViewChangeVote {
        let keys = KeyPair::generate();
        ViewChangeVote { voter, target_view, last_stable_checkpoint: 0, prepared, signature: keys.sign(b"test-vote") }
    }

    fn sample_prepared(sequence: Sequence) -> PreparedInstance {
        let provider = Ed25519Blake3Provider;
        let proposal = ConsensusProposal::new(serde_json::json!({"sequence": sequence}), AgentId::new(), &provider);
        PreparedInstance { view: 0, sequence, digest: proposal.digest, proposal }
    }

    #[test]
    fn quorum_reached_returns_certificate() {
        let coordinator = ViewChangeCoordinator::new(Arc::new(RoundRobin));
        let candidates = vec![candidate(1), candidate(2), candidate(3)];
        coordinator.begin(1, candidates[0].id, "leader-timeout");

        assert!(coordinator.record_vote(vote(candidates[1].id, 1, vec![]), 2, &candidates).is_none());

        let certificate = coordinator.record_vote(vote(candidates[2].id, 1, vec![]), 2, &candidates);
        assert!(certificate.is_some());
        assert_eq!(certificate.unwrap().votes.len(), 2);
    }

    #[test]
    fn adopt_resets_to_stable() {
        let coordinator = ViewChangeCoordinator::new(Arc::new(RoundRobin));
        coordinator.begin(1, AgentId::new(), "leader-timeout");
        assert_eq!(coordinator.state(), ViewChangeState::Changing);
        coordinator.adopt(1);
        assert_eq!(coordinator.state(), ViewChangeState::Stable);
        assert_eq!(coordinator.vote_count(1), 0);
    }

    #[test]
    fn merged_prepared_set_picks_highest_view_per_sequence() {
        let coordinator = ViewChangeCoordinator::new(Arc::new(RoundRobin));
        let candidates = vec![candidate(1), candidate(2)];

        let stale = sample_prepared(5);
        let mut fresh = stale.clone();
        fresh.view = 1;

        coordinator.record_vote(vote(candidates[0].id, 2, vec![stale]), 2, &candidates);
        let certificate = coordinator.record_vote(vote(candidates[1].id, 2, vec![fresh]), 2, &candidates).unwrap();

        assert_eq!(certificate.prepared.len(), 1);
        assert_eq!(certificate.prepared[0].view, 1);
    }
}
