//! Weighted, quadratic, approval, liquid-democracy, and stake-weighted voting for fabric-wide
//! decisions, independent of consensus's own Byzantine agreement.

mod anomaly;
mod delegation;
mod engine;
mod error;
mod types;

pub use anomaly::VotingAnomaly;
pub use engine::VotingEngine;
pub use error::VotingError;
pub use types::{Choice, Proposal, TallyResult, Vote, VoterProfile, VotingType};
