//! Byzantine agreement kernel for the A2A coordination fabric.
//!
//! The protocol core is a three-phase PBFT (pre-prepare/prepare/commit) over a configurable
//! active agent set, with Raft available as the non-Byzantine alternative and a pluggable leader
//! election policy shared by both (`view-change` for PBFT, a randomized-timeout campaign for
//! Raft). Byzantine evidence, message-log bookkeeping, and a performance optimizer (batching,
//! pipelining, speculative execution, a digest dedup cache) live alongside as collaborators the
//! engine composes rather than a monolith.

mod byzantine;
mod election;
mod error;
mod message_log;
mod optimizer;
mod pbft;
mod raft;
mod types;
mod view_change;

pub use byzantine::{ByzantineEvidence, ByzantineTracker};
pub use election::{Candidate, ElectionAlgorithm, Hybrid, PerformanceWeighted, ReputationWeighted, RoundRobin, StakeWeighted};
pub use error::{ConsensusError, ConsensusOutcome};
pub use message_log::{MessageLog, VotingInstance};
pub use optimizer::{BatchCollector, DigestCache, Pipeline, PipelineStage, SpeculationOutcome, SpeculativeExecutor};
pub use pbft::{CommittedEntry, PbftEngine};
pub use raft::{AppendEntries, AppendResponse, LogEntry, RaftNode, RequestVote, Role, VoteResponse};
pub use types::{
    ConsensusConfig, ConsensusMessage, ConsensusProposal, ConsensusState, ElectionAlgorithmKind, MessageKind, Phase,
    ProposalId, Sequence, View,
};
pub use view_change::{NewViewCertificate, PreparedInstance, ViewChangeCoordinator, ViewChangeState, ViewChangeVote};

/// Build the election algorithm a [`ConsensusConfig`] selects.
pub fn election_algorithm(config: &ConsensusConfig) -> std::sync::Arc<dyn ElectionAlgorithm> {
    use std::sync::Arc;
    match config.election_algorithm {
        ElectionAlgorithmKind::RoundRobin => Arc::new(RoundRobin),
        ElectionAlgorithmKind::Reputation => Arc::new(ReputationWeighted),
        ElectionAlgorithmKind::Stake => Arc::new(StakeWeighted),
        ElectionAlgorithmKind::Performance => Arc::new(PerformanceWeighted),
        ElectionAlgorithmKind::Hybrid => Arc::new(Hybrid { max_consecutive_terms: config.max_consecutive_terms }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn election_algorithm_matches_configured_kind() {
        let mut config = ConsensusConfig::default();
        config.election_algorithm = ElectionAlgorithmKind::RoundRobin;
        let algo = election_algorithm(&config);
        let candidates = vec![
            Candidate { id: a2a_core::AgentId::new(), reputation: 0.1, stake: 0.1, performance: 0.1, availability: 0.1, consecutive_terms: 0 },
        ];
        let _ = algo.pick(&candidates, 0);
    }
}
