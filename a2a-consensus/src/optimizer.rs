use std::collections::VecDeque;
use std::time::{Duration, Instant};

use a2a_crypto::Digest;
use parking_lot::Mutex;

use crate::types::{ConsensusConfig, ConsensusProposal, ProposalId};

/// Accumulates proposals into a batch, flushing when `queueLength ≥ batchSize` or
/// `batchTimeout` has elapsed since the oldest queued proposal, whichever comes first.
pub struct BatchCollector {
    batch_size: usize,
    batch_timeout: Duration,
    queue: Mutex<VecDeque<(ConsensusProposal, Instant)>>,
}

impl BatchCollector {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_timeout: config.batch_timeout,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, proposal: ConsensusProposal) {
        self.queue.lock().push_back((proposal, Instant::now()));
    }

    /// Drain and return a batch if one is ready, else `None`.
    pub fn try_flush(&self) -> Option<Vec<ConsensusProposal>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            return None;
        }
        let oldest_age = queue.front().map(|(_, t)| t.elapsed()).unwrap_or_default();
        if queue.len() >= self.batch_size || oldest_age >= self.batch_timeout {
            let batch = queue.drain(..).map(|(p, _)| p).collect();
            Some(batch)
        } else {
            None
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

/// The three PBFT phases a batch traverses, named so pipelining code reads like the protocol it
/// implements rather than `0`/`1`/`2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    PrePrepare,
    Prepare,
    Commit,
}

impl PipelineStage {
    pub fn next(self) -> Option<Self> {
        match self {
            PipelineStage::PrePrepare => Some(PipelineStage::Prepare),
            PipelineStage::Prepare => Some(PipelineStage::Commit),
            PipelineStage::Commit => None,
        }
    }
}

/// Tracks which pipeline stage each in-flight batch has reached. A depth-3 pipeline lets up to
/// three batches be in pre-prepare/prepare/commit simultaneously rather than waiting for one
/// batch to fully commit before starting the next.
pub struct Pipeline {
    depth: usize,
    in_flight: Mutex<Vec<(u64, PipelineStage)>>,
}

impl Pipeline {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            depth: config.pipeline_depth,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Admit a new batch at `PrePrepare` if there is room in the pipeline.
    pub fn admit(&self, batch_id: u64) -> bool {
        let mut in_flight = self.in_flight.lock();
        if in_flight.len() >= self.depth {
            return false;
        }
        in_flight.push((batch_id, PipelineStage::PrePrepare));
        true
    }

    pub fn advance(&self, batch_id: u64) -> Option<PipelineStage> {
        let mut in_flight = self.in_flight.lock();
        let entry = in_flight.iter_mut().find(|(id, _)| *id == batch_id)?;
        match entry.1.next() {
            Some(next) => {
                entry.1 = next;
                Some(next)
            }
            None => {
                in_flight.retain(|(id, _)| *id != batch_id);
                None
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

/// A speculative outcome for a proposal whose confidence exceeded the speculation threshold.
/// Downstream code either [`SpeculativeExecutor::commit`]s it once the real commit quorum is
/// reached, or [`SpeculativeExecutor::rollback`]s it if the proposal is ultimately aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeculationOutcome {
    Applied,
    RolledBack,
}

const SPECULATION_CONFIDENCE_THRESHOLD: f64 = 0.8;

pub struct SpeculativeExecutor {
    enabled: bool,
    pending: Mutex<std::collections::HashMap<ProposalId, ()>>,
}

impl SpeculativeExecutor {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            enabled: config.speculative,
            pending: Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Decide whether `proposal` should be executed speculatively ahead of full commit, based on
    /// a caller-supplied confidence score in `[0.0, 1.0]`.
    pub fn should_speculate(&self, confidence: f64) -> bool {
        self.enabled && confidence > SPECULATION_CONFIDENCE_THRESHOLD
    }

    pub fn mark_speculated(&self, proposal_id: ProposalId) {
        self.pending.lock().insert(proposal_id, ());
    }

    pub fn commit(&self, proposal_id: ProposalId) -> SpeculationOutcome {
        self.pending.lock().remove(&proposal_id);
        SpeculationOutcome::Applied
    }

    pub fn rollback(&self, proposal_id: ProposalId) -> SpeculationOutcome {
        self.pending.lock().remove(&proposal_id);
        SpeculationOutcome::RolledBack
    }

    pub fn is_speculated(&self, proposal_id: &ProposalId) -> bool {
        self.pending.lock().contains_key(proposal_id)
    }
}

/// Bounded FIFO cache of recently seen digests, used to suppress duplicate message processing
/// without growing unbounded over a long-running node.
pub struct DigestCache {
    capacity: usize,
    order: Mutex<VecDeque<Digest>>,
    seen: Mutex<std::collections::HashSet<Digest>>,
}

impl DigestCache {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            capacity: config.digest_cache_size,
            order: Mutex::new(VecDeque::new()),
            seen: Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Returns `true` if `digest` was already present (a duplicate); otherwise records it and
    /// returns `false`.
    pub fn check_and_insert(&self, digest: Digest) -> bool {
        let mut seen = self.seen.lock();
        if !seen.insert(digest) {
            return true;
        }
        let mut order = self.order.lock();
        order.push_back(digest);
        if order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                seen.remove(&oldest);
            }
        }
        false
    }
}
