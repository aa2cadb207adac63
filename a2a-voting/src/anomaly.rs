use crate::types::{Choice, Vote};

#[derive(Debug, Clone, PartialEq)]
pub enum VotingAnomaly {
    /// Two votes on the same proposal cast less than a second apart.
    CoordinatedVoting { first: a2a_core::AgentId, second: a2a_core::AgentId },
    /// The approve/reject ratio is outside `(0.1, 10.0)`.
    ExtremeRatio { ratio: f64 },
    /// A single voter cast more than 10% of all votes on a proposal.
    ExcessiveVoterActivity { voter: a2a_core::AgentId, share: f64 },
}

pub fn detect(votes: &[Vote]) -> Vec<VotingAnomaly> {
    let mut anomalies = Vec::new();
    if votes.is_empty() {
        return anomalies;
    }

    let mut ordered: Vec<&Vote> = votes.iter().collect();
    ordered.sort_by_key(|v| v.cast_at);
    for pair in ordered.windows(2) {
        let gap = pair[1].cast_at - pair[0].cast_at;
        if gap.num_milliseconds() < 1000 {
            anomalies.push(VotingAnomaly::CoordinatedVoting { first: pair[0].voter, second: pair[1].voter });
        }
    }

    let approve = votes.iter().filter(|v| v.choice == Choice::Approve).count() as f64;
    let reject = votes.iter().filter(|v| v.choice == Choice::Reject).count() as f64;
    if reject > 0.0 && (approve / reject > 10.0 || approve / reject < 0.1) {
        anomalies.push(VotingAnomaly::ExtremeRatio { ratio: approve / reject });
    }

    let total = votes.len() as f64;
    let mut counts: std::collections::HashMap<a2a_core::AgentId, usize> = std::collections::HashMap::new();
    for v in votes {
        *counts.entry(v.voter).or_insert(0) += 1;
    }
    for (voter, count) in counts {
        let share = count as f64 / total;
        if share > 0.1 {
            anomalies.push(VotingAnomaly::ExcessiveVoterActivity { voter, share });
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::AgentId;
    use chrono::Utc;

    fn vote(voter: AgentId, choice: Choice, cast_at: chrono::DateTime<Utc>) -> Vote {
        Vote { voter, proposal_id: uuid::Uuid::new_v4(), choice, magnitude: 1.0, cast_at, mirrored: false }
    }

    #[test]
    fn detects_rapid_succession_as_coordinated() {
        let now = Utc::now();
        let votes = vec![
            vote(AgentId::new(), Choice::Approve, now),
            vote(AgentId::new(), Choice::Approve, now + chrono::Duration::milliseconds(200)),
        ];
        let found = detect(&votes);
        assert!(found.iter().any(|a| matches!(a, VotingAnomaly::CoordinatedVoting { .. })));
    }

    #[test]
    fn detects_extreme_ratio() {
        let now = Utc::now();
        let mut votes: Vec<Vote> = (0..11).map(|i| vote(AgentId::new(), Choice::Approve, now + chrono::Duration::seconds(i * 2))).collect();
        votes.push(vote(AgentId::new(), Choice::Reject, now + chrono::Duration::seconds(30)));
        let found = detect(&votes);
        assert!(found.iter().any(|a| matches!(a, VotingAnomaly::ExtremeRatio { .. })));
    }

    #[test]
    fn no_anomalies_for_balanced_spread_out_votes() {
        let now = Utc::now();
        let votes = vec![
            vote(AgentId::new(), Choice::Approve, now),
            vote(AgentId::new(), Choice::Reject, now + chrono::Duration::seconds(5)),
        ];
        assert!(detect(&votes).is_empty());
    }
}
