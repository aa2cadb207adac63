use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    #[error("proposal {0} not found")]
    UnknownProposal(Uuid),

    #[error("voter {0} not registered")]
    UnknownVoter(String),

    #[error("proposal {0} voting deadline has passed")]
    DeadlinePassed(Uuid),

    #[error("vote strength {strength} exceeds available voice credits {available}")]
    InsufficientVoiceCredits { strength: f64, available: f64 },

    #[error("vote weight {weight} exceeds staked weight {available}")]
    InsufficientStake { weight: f64, available: f64 },

    #[error("vote weight {weight} exceeds voter weight {available}")]
    InsufficientWeight { weight: f64, available: f64 },

    #[error("voter {0} has delegated and may not cast a direct vote under liquid democracy")]
    VoterHasDelegated(String),

    #[error("delegating {delegator} to {delegate} would create a delegation cycle")]
    DelegationCycle { delegator: String, delegate: String },

    #[error("proposal {0} has already been finalized")]
    AlreadyFinalized(Uuid),

    #[error("voter {voter} already cast a direct vote on proposal {proposal_id}")]
    AlreadyVoted { proposal_id: Uuid, voter: String },
}
