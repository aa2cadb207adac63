use a2a_core::AgentId;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::anomaly::{self, VotingAnomaly};
use crate::delegation::creates_cycle;
use crate::error::VotingError;
use crate::types::{Choice, Proposal, TallyResult, Vote, VoterProfile, VotingType};

/// Proposal lifecycle, vote validation, delegation, and tallying for the fabric's decision
/// making. Stake, weight, and voice credits are tracked per-voter independently of consensus
/// reputation — a low-trust agent can still hold voting weight it earned elsewhere.
pub struct VotingEngine {
    voters: DashMap<AgentId, VoterProfile>,
    proposals: DashMap<Uuid, Proposal>,
    votes: DashMap<Uuid, Vec<Vote>>,
    delegations: DashMap<AgentId, AgentId>,
}

impl VotingEngine {
    pub fn new() -> Self {
        Self { voters: DashMap::new(), proposals: DashMap::new(), votes: DashMap::new(), delegations: DashMap::new() }
    }

    pub fn register_voter(&self, profile: VoterProfile) {
        self.voters.insert(profile.agent_id, profile);
    }

    pub fn create_proposal(&self, proposal: Proposal) -> Uuid {
        let id = proposal.id;
        self.proposals.insert(id, proposal);
        self.votes.insert(id, Vec::new());
        id
    }

    /// Delegates `delegator`'s vote to `delegate`. Rejected if it would close a cycle in the
    /// delegation graph.
    pub fn delegate(&self, delegator: AgentId, delegate: AgentId) -> Result<(), VotingError> {
        if creates_cycle(&self.delegations, delegate, delegator) {
            return Err(VotingError::DelegationCycle { delegator: delegator.to_string(), delegate: delegate.to_string() });
        }
        self.delegations.insert(delegator, delegate);
        if let Some(mut profile) = self.voters.get_mut(&delegator) {
            profile.delegated_to = Some(delegate);
        }
        Ok(())
    }

    fn voter(&self, id: &AgentId) -> Result<VoterProfile, VotingError> {
        self.voters.get(id).map(|v| v.clone()).ok_or_else(|| VotingError::UnknownVoter(id.to_string()))
    }

    fn proposal(&self, id: &Uuid) -> Result<Proposal, VotingError> {
        self.proposals.get(id).map(|p| p.clone()).ok_or(VotingError::UnknownProposal(*id))
    }

    /// Casts `voter`'s vote on `proposal_id`. Validates `magnitude` against the proposal's
    /// [`VotingType`] and, for liquid democracy, mirrors the vote to every voter who has
    /// delegated to `voter`.
    pub fn cast_vote(&self, proposal_id: Uuid, voter: AgentId, choice: Choice, magnitude: f64) -> Result<(), VotingError> {
        let proposal = self.proposal(&proposal_id)?;
        if proposal.finalized {
            return Err(VotingError::AlreadyFinalized(proposal_id));
        }
        if Utc::now() > proposal.deadline {
            return Err(VotingError::DeadlinePassed(proposal_id));
        }
        let profile = self.voter(&voter)?;

        if self.has_direct_vote(proposal_id, voter) {
            return Err(VotingError::AlreadyVoted { proposal_id, voter: voter.to_string() });
        }

        match proposal.voting_type {
            VotingType::Quadratic => {
                let cost = magnitude * magnitude;
                if cost > profile.voice_credits {
                    return Err(VotingError::InsufficientVoiceCredits { strength: magnitude, available: profile.voice_credits });
                }
            }
            VotingType::StakeWeighted => {
                if magnitude > profile.stake {
                    return Err(VotingError::InsufficientStake { weight: magnitude, available: profile.stake });
                }
            }
            VotingType::Weighted => {
                if magnitude > profile.weight {
                    return Err(VotingError::InsufficientWeight { weight: magnitude, available: profile.weight });
                }
            }
            VotingType::Approval => {}
            VotingType::Liquid => {
                if profile.delegated_to.is_some() {
                    return Err(VotingError::VoterHasDelegated(voter.to_string()));
                }
            }
        }

        let cast_at = Utc::now();
        self.record_vote(proposal_id, Vote { voter, proposal_id, choice, magnitude, cast_at, mirrored: false });

        if proposal.voting_type == VotingType::Liquid {
            for entry in self.delegations.iter() {
                if *entry.value() == voter {
                    let delegator = *entry.key();
                    // A delegator who already voted directly on this proposal — before delegating,
                    // since Liquid forbids casting directly while delegated — keeps that vote; the
                    // delegate's mirror never overrides or duplicates it.
                    if self.has_direct_vote(proposal_id, delegator) {
                        continue;
                    }
                    self.record_vote(
                        proposal_id,
                        Vote { voter: delegator, proposal_id, choice, magnitude: profile.weight, cast_at, mirrored: true },
                    );
                }
            }
        }
        Ok(())
    }

    /// Whether `voter` has a non-mirrored vote recorded on `proposal_id` — the per-voter
    /// uniqueness check direct casts and liquid mirroring both consult.
    fn has_direct_vote(&self, proposal_id: Uuid, voter: AgentId) -> bool {
        self.votes
            .get(&proposal_id)
            .is_some_and(|votes| votes.iter().any(|v| v.voter == voter && !v.mirrored))
    }

    fn record_vote(&self, proposal_id: Uuid, vote: Vote) {
        self.votes.entry(proposal_id).or_default().push(vote);
    }

    pub fn tally(&self, proposal_id: Uuid) -> Result<TallyResult, VotingError> {
        let proposal = self.proposal(&proposal_id)?;
        let votes = self.votes.get(&proposal_id).map(|v| v.clone()).unwrap_or_default();

        let weight_of = |v: &Vote| match proposal.voting_type {
            VotingType::Approval => 1.0,
            _ => v.magnitude,
        };
        let approve_weight: f64 = votes.iter().filter(|v| v.choice == Choice::Approve).map(weight_of).sum();
        let reject_weight: f64 = votes.iter().filter(|v| v.choice == Choice::Reject).map(weight_of).sum();

        let eligible = self.voters.len().max(1) as f64;
        let participants: std::collections::HashSet<AgentId> = votes.iter().map(|v| v.voter).collect();
        let participation_rate = participants.len() as f64 / eligible;

        let total = approve_weight + reject_weight;
        let approval_ratio = if total > 0.0 { approve_weight / total } else { 0.0 };
        let passed = participation_rate >= proposal.minimum_participation && approval_ratio >= proposal.passing_threshold;

        Ok(TallyResult { approve_weight, reject_weight, participation_rate, passed })
    }

    /// Finalizes a proposal: marks it closed and, for quadratic voting, deducts `strength²` from
    /// each direct voter's voice credits.
    pub fn finalize(&self, proposal_id: Uuid) -> Result<TallyResult, VotingError> {
        let result = self.tally(proposal_id)?;
        {
            let mut proposal = self.proposals.get_mut(&proposal_id).ok_or(VotingError::UnknownProposal(proposal_id))?;
            if proposal.finalized {
                return Err(VotingError::AlreadyFinalized(proposal_id));
            }
            proposal.finalized = true;
        }

        let proposal = self.proposal(&proposal_id)?;
        if proposal.voting_type == VotingType::Quadratic {
            if let Some(votes) = self.votes.get(&proposal_id) {
                for vote in votes.iter().filter(|v| !v.mirrored) {
                    if let Some(mut profile) = self.voters.get_mut(&vote.voter) {
                        let cost = vote.magnitude * vote.magnitude;
                        profile.voice_credits = (profile.voice_credits - cost).max(0.0);
                    }
                }
            }
        }
        Ok(result)
    }

    pub fn anomalies(&self, proposal_id: Uuid) -> Vec<VotingAnomaly> {
        let votes = self.votes.get(&proposal_id).map(|v| v.clone()).unwrap_or_default();
        anomaly::detect(&votes)
    }
}

impl Default for VotingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn future_proposal(voting_type: VotingType, min_participation: f64, passing_threshold: f64) -> Proposal {
        Proposal::new(voting_type, Utc::now() + Duration::hours(1), min_participation, passing_threshold)
    }

    #[test]
    fn weighted_vote_exceeding_profile_weight_rejected() {
        let engine = VotingEngine::new();
        let voter = AgentId::new();
        engine.register_voter(VoterProfile { weight: 2.0, ..VoterProfile::new(voter) });
        let id = engine.create_proposal(future_proposal(VotingType::Weighted, 0.0, 0.5));
        assert!(matches!(engine.cast_vote(id, voter, Choice::Approve, 5.0), Err(VotingError::InsufficientWeight { .. })));
        assert!(engine.cast_vote(id, voter, Choice::Approve, 2.0).is_ok());
    }

    #[test]
    fn quadratic_vote_cost_checked_against_voice_credits() {
        let engine = VotingEngine::new();
        let voter = AgentId::new();
        engine.register_voter(VoterProfile { voice_credits: 50.0, ..VoterProfile::new(voter) });
        let id = engine.create_proposal(future_proposal(VotingType::Quadratic, 0.0, 0.5));
        // strength 8 costs 64 credits, exceeds 50
        assert!(matches!(engine.cast_vote(id, voter, Choice::Approve, 8.0), Err(VotingError::InsufficientVoiceCredits { .. })));
        assert!(engine.cast_vote(id, voter, Choice::Approve, 5.0).is_ok());
    }

    #[test]
    fn quadratic_finalize_deducts_credits() {
        let engine = VotingEngine::new();
        let voter = AgentId::new();
        engine.register_voter(VoterProfile::new(voter));
        let id = engine.create_proposal(future_proposal(VotingType::Quadratic, 0.0, 0.5));
        engine.cast_vote(id, voter, Choice::Approve, 5.0).unwrap();
        engine.finalize(id).unwrap();
        let remaining = engine.voter(&voter).unwrap().voice_credits;
        assert_eq!(remaining, 75.0);
    }

    #[test]
    fn liquid_vote_mirrors_to_delegators() {
        let engine = VotingEngine::new();
        let delegate = AgentId::new();
        let delegator = AgentId::new();
        engine.register_voter(VoterProfile::new(delegate));
        engine.register_voter(VoterProfile::new(delegator));
        engine.delegate(delegator, delegate).unwrap();

        let id = engine.create_proposal(future_proposal(VotingType::Liquid, 0.0, 0.5));
        engine.cast_vote(id, delegate, Choice::Approve, 1.0).unwrap();

        let votes = engine.votes.get(&id).unwrap().clone();
        assert_eq!(votes.len(), 2);
        assert!(votes.iter().any(|v| v.voter == delegator && v.mirrored));
    }

    #[test]
    fn second_direct_vote_from_same_voter_rejected() {
        let engine = VotingEngine::new();
        let voter = AgentId::new();
        engine.register_voter(VoterProfile::new(voter));
        let id = engine.create_proposal(future_proposal(VotingType::Approval, 0.0, 0.5));
        engine.cast_vote(id, voter, Choice::Approve, 1.0).unwrap();
        assert!(matches!(
            engine.cast_vote(id, voter, Choice::Reject, 1.0),
            Err(VotingError::AlreadyVoted { .. })
        ));
        let votes = engine.votes.get(&id).unwrap().clone();
        assert_eq!(votes.len(), 1);
    }

    #[test]
    fn liquid_mirror_does_not_override_a_prior_direct_vote() {
        let engine = VotingEngine::new();
        let delegate = AgentId::new();
        let delegator = AgentId::new();
        engine.register_voter(VoterProfile::new(delegate));
        engine.register_voter(VoterProfile::new(delegator));

        let id = engine.create_proposal(future_proposal(VotingType::Liquid, 0.0, 0.5));
        // delegator votes directly before delegating — still allowed since it has no delegation yet.
        engine.cast_vote(id, delegator, Choice::Reject, 1.0).unwrap();
        engine.delegate(delegator, delegate).unwrap();
        engine.cast_vote(id, delegate, Choice::Approve, 1.0).unwrap();

        let votes = engine.votes.get(&id).unwrap().clone();
        let delegator_votes: Vec<&Vote> = votes.iter().filter(|v| v.voter == delegator).collect();
        assert_eq!(delegator_votes.len(), 1);
        assert_eq!(delegator_votes[0].choice, Choice::Reject);
        assert!(!delegator_votes[0].mirrored);
    }

    #[test]
    fn delegated_voter_cannot_cast_direct_liquid_vote() {
        let engine = VotingEngine::new();
        let delegate = AgentId::new();
        let delegator = AgentId::new();
        engine.register_voter(VoterProfile::new(delegate));
        engine.register_voter(VoterProfile::new(delegator));
        engine.delegate(delegator, delegate).unwrap();

        let id = engine.create_proposal(future_proposal(VotingType::Liquid, 0.0, 0.5));
        assert!(matches!(engine.cast_vote(id, delegator, Choice::Approve, 1.0), Err(VotingError::VoterHasDelegated(_))));
    }

    #[test]
    fn cyclic_delegation_rejected() {
        let engine = VotingEngine::new();
        let a = AgentId::new();
        let b = AgentId::new();
        engine.register_voter(VoterProfile::new(a));
        engine.register_voter(VoterProfile::new(b));
        engine.delegate(a, b).unwrap();
        assert!(matches!(engine.delegate(b, a), Err(VotingError::DelegationCycle { .. })));
    }

    #[test]
    fn tally_passes_above_participation_and_threshold() {
        let engine = VotingEngine::new();
        let voters: Vec<AgentId> = (0..4).map(|_| AgentId::new()).collect();
        for v in &voters {
            engine.register_voter(VoterProfile::new(*v));
        }
        let id = engine.create_proposal(future_proposal(VotingType::Approval, 0.5, 0.6));
        engine.cast_vote(id, voters[0], Choice::Approve, 1.0).unwrap();
        engine.cast_vote(id, voters[1], Choice::Approve, 1.0).unwrap();
        engine.cast_vote(id, voters[2], Choice::Reject, 1.0).unwrap();

        let result = engine.tally(id).unwrap();
        assert!(result.passed);
    }

    #[test]
    fn tally_fails_below_minimum_participation() {
        let engine = VotingEngine::new();
        let voters: Vec<AgentId> = (0..10).map(|_| AgentId::new()).collect();
        for v in &voters {
            engine.register_voter(VoterProfile::new(*v));
        }
        let id = engine.create_proposal(future_proposal(VotingType::Approval, 0.5, 0.5));
        engine.cast_vote(id, voters[0], Choice::Approve, 1.0).unwrap();

        let result = engine.tally(id).unwrap();
        assert!(!result.passed);
    }

    proptest::proptest! {
        /// Whatever mix of approvals and rejections gets cast, the tally's derived rates always
        /// stay within `[0, 1]` — neither can run out of bounds regardless of how lopsided the
        /// vote is.
        #[test]
        fn participation_and_approval_rates_stay_within_unit_interval(
            approvals in 0usize..8,
            rejections in 0usize..8,
        ) {
            let engine = VotingEngine::new();
            let total_voters = 10;
            let voters: Vec<AgentId> = (0..total_voters).map(|_| AgentId::new()).collect();
            for v in &voters {
                engine.register_voter(VoterProfile::new(*v));
            }
            let id = engine.create_proposal(future_proposal(VotingType::Approval, 0.0, 0.5));

            let mut cursor = 0;
            for _ in 0..approvals.min(total_voters) {
                engine.cast_vote(id, voters[cursor], Choice::Approve, 1.0).unwrap();
                cursor += 1;
            }
            for _ in 0..rejections.min(total_voters - cursor) {
                engine.cast_vote(id, voters[cursor], Choice::Reject, 1.0).unwrap();
                cursor += 1;
            }

            let result = engine.tally(id).unwrap();
            proptest::prop_assert!((0.0..=1.0).contains(&result.participation_rate));
            let total = result.approve_weight + result.reject_weight;
            if total > 0.0 {
                proptest::prop_assert!((result.approve_weight / total) <= 1.0);
            }
        }
    }
}
