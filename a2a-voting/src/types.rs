use a2a_core::AgentId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingType {
    Weighted,
    Quadratic,
    Approval,
    Liquid,
    StakeWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Approve,
    Reject,
}

/// A participant's standing for voting purposes, distinct from its consensus reputation/trust —
/// a voter can hold weight, staked tokens, and quadratic voice credits independently.
#[derive(Debug, Clone)]
pub struct VoterProfile {
    pub agent_id: AgentId,
    pub weight: f64,
    pub stake: f64,
    pub voice_credits: f64,
    pub delegated_to: Option<AgentId>,
}

impl VoterProfile {
    pub fn new(agent_id: AgentId) -> Self {
        Self { agent_id, weight: 1.0, stake: 0.0, voice_credits: 100.0, delegated_to: None }
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: Uuid,
    pub deadline: DateTime<Utc>,
    pub voting_type: VotingType,
    pub minimum_participation: f64,
    pub passing_threshold: f64,
    pub finalized: bool,
}

impl Proposal {
    pub fn new(voting_type: VotingType, deadline: DateTime<Utc>, minimum_participation: f64, passing_threshold: f64) -> Self {
        Self { id: Uuid::new_v4(), deadline, voting_type, minimum_participation, passing_threshold, finalized: false }
    }
}

/// A single cast vote. `magnitude` is interpreted according to the proposal's [`VotingType`]:
/// a quadratic strength, a stake or plain weight, or ignored for approval voting.
#[derive(Debug, Clone)]
pub struct Vote {
    pub voter: AgentId,
    pub proposal_id: Uuid,
    pub choice: Choice,
    pub magnitude: f64,
    pub cast_at: DateTime<Utc>,
    /// Set when this vote was synthesized by mirroring a delegate's vote rather than cast
    /// directly by `voter`.
    pub mirrored: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TallyResult {
    pub approve_weight: f64,
    pub reject_weight: f64,
    pub participation_rate: f64,
    pub passed: bool,
}
