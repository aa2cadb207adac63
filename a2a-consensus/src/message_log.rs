use std::collections::HashSet;

use a2a_core::AgentId;
use a2a_crypto::Digest;
use dashmap::DashMap;

use crate::types::{ConsensusProposal, MessageKind, Phase, Sequence, View};

/// The set of messages and vote counters for one `(view, sequence, digest)` voting instance.
#[derive(Debug, Clone)]
pub struct VotingInstance {
    pub phase: Phase,
    pub proposal: Option<ConsensusProposal>,
    pub pre_prepare_sender: Option<AgentId>,
    pub prepares: HashSet<AgentId>,
    pub commits: HashSet<AgentId>,
}

impl VotingInstance {
    fn new() -> Self {
        Self {
            phase: Phase::PrePrepare,
            proposal: None,
            pre_prepare_sender: None,
            prepares: HashSet::new(),
            commits: HashSet::new(),
        }
    }

    /// Advance `self.phase` to `candidate` if it is strictly ahead of the current phase.
    /// Phase transitions only ever move forward for a given instance.
    fn advance_to(&mut self, candidate: Phase) {
        if candidate > self.phase {
            self.phase = candidate;
        }
    }
}

/// Append-only log of PBFT voting instances, keyed by `(view, sequence, digest)`. Readers see a
/// consistent snapshot of one instance via [`MessageLog::instance`]; nothing is ever removed
/// except by [`MessageLog::truncate_before`] once a checkpoint makes older entries moot.
#[derive(Default)]
pub struct MessageLog {
    instances: DashMap<(View, Sequence, Digest), VotingInstance>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    pub fn instance(&self, key: (View, Sequence, Digest)) -> Option<VotingInstance> {
        self.instances.get(&key).map(|e| e.value().clone())
    }

    /// Record a pre-prepare, seeding the voting instance for `key`. Returns `false` if an
    /// instance already exists at this key with a *different* sender — an equivocating leader —
    /// without mutating the existing entry.
    pub fn record_pre_prepare(
        &self,
        key: (View, Sequence, Digest),
        sender: AgentId,
        proposal: ConsensusProposal,
    ) -> bool {
        let mut entry = self.instances.entry(key).or_insert_with(VotingInstance::new);
        match entry.pre_prepare_sender {
            Some(existing) if existing != sender => return false,
            _ => {}
        }
        entry.pre_prepare_sender = Some(sender);
        entry.proposal = Some(proposal);
        entry.advance_to(Phase::PrePrepare);
        true
    }

    /// Record a `prepare` vote from `sender`; idempotent on repeats. Returns the number of
    /// distinct preparers recorded so far, excluding the leader's own pre-prepare per the protocol's
    /// quorum accounting.
    pub fn record_prepare(&self, key: (View, Sequence, Digest), sender: AgentId) -> usize {
        let mut entry = self.instances.entry(key).or_insert_with(VotingInstance::new);
        entry.prepares.insert(sender);
        entry.prepares.len()
    }

    pub fn record_commit(&self, key: (View, Sequence, Digest), sender: AgentId) -> usize {
        let mut entry = self.instances.entry(key).or_insert_with(VotingInstance::new);
        entry.commits.insert(sender);
        entry.commits.len()
    }

    pub fn set_phase(&self, key: (View, Sequence, Digest), phase: Phase) {
        if let Some(mut entry) = self.instances.get_mut(&key) {
            entry.advance_to(phase);
        }
    }

    pub fn phase(&self, key: (View, Sequence, Digest)) -> Option<Phase> {
        self.instances.get(&key).map(|e| e.phase)
    }

    pub fn kind_seen(&self, key: (View, Sequence, Digest), kind: MessageKind, sender: &AgentId) -> bool {
        self.instances.get(&key).is_some_and(|entry| match kind {
            MessageKind::PrePrepare => entry.pre_prepare_sender.as_ref() == Some(sender),
            MessageKind::Prepare => entry.prepares.contains(sender),
            MessageKind::Commit => entry.commits.contains(sender),
            MessageKind::ViewChange | MessageKind::NewView => false,
        })
    }

    /// Drop all voting instances at or before `sequence`, called once a checkpoint covering them
    /// is stable.
    pub fn truncate_before(&self, sequence: Sequence) {
        self.instances.retain(|(_, seq, _), _| *seq > sequence);
    }

    /// Every instance strictly before `before_view` that reached `Phase::Prepare` but not yet
    /// `Phase::Committed` — the prepared-but-uncommitted work a view change must carry forward
    /// rather than lose.
    pub fn prepared_before(&self, before_view: View) -> Vec<((View, Sequence, Digest), VotingInstance)> {
        self.instances
            .iter()
            .filter(|entry| {
                let (view, _, _) = *entry.key();
                view < before_view && entry.value().phase >= Phase::Prepare && entry.value().phase < Phase::Committed
            })
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
