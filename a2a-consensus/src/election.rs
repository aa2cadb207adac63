use a2a_core::AgentId;

use crate::types::View;

/// Everything an election algorithm needs to know about one candidate leader. `reputation`,
/// `stake`, and `performance` are expected in `[0.0, 1.0]`; callers normalize before handing
/// candidates to `pick`.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: AgentId,
    pub reputation: f64,
    pub stake: f64,
    pub performance: f64,
    pub availability: f64,
    pub consecutive_terms: u32,
}

/// A pluggable leader-selection policy for view changes. One `pick` call replaces the class
/// hierarchy a language with virtual dispatch would reach for — each implementation is a small
/// struct, selected once at configuration time and never swapped at runtime mid-view.
pub trait ElectionAlgorithm: Send + Sync {
    /// Choose the leader for `view` from `candidates`. `candidates` is never empty — callers
    /// filter out suspected-faulty agents before calling.
    fn pick(&self, candidates: &[Candidate], view: View) -> AgentId;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl ElectionAlgorithm for RoundRobin {
    fn pick(&self, candidates: &[Candidate], view: View) -> AgentId {
        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by_key(|c| c.id.0);
        let idx = (view as usize) % sorted.len();
        sorted[idx].id
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReputationWeighted;

impl ElectionAlgorithm for ReputationWeighted {
    fn pick(&self, candidates: &[Candidate], _view: View) -> AgentId {
        argmax(candidates, |c| c.reputation)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StakeWeighted;

impl ElectionAlgorithm for StakeWeighted {
    fn pick(&self, candidates: &[Candidate], _view: View) -> AgentId {
        argmax(candidates, |c| c.stake)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceWeighted;

impl ElectionAlgorithm for PerformanceWeighted {
    fn pick(&self, candidates: &[Candidate], _view: View) -> AgentId {
        argmax(candidates, |c| c.performance)
    }
}

/// `0.3·reputation + 0.25·availability + 0.25·performance + 0.2·stake`, halved for any candidate
/// that has already held the leader seat `maxConsecutiveTerms` times in a row — a soft term
/// limit that still lets an otherwise-dominant candidate win if nobody else is close.
#[derive(Debug, Clone, Copy)]
pub struct Hybrid {
    pub max_consecutive_terms: u32,
}

impl ElectionAlgorithm for Hybrid {
    fn pick(&self, candidates: &[Candidate], _view: View) -> AgentId {
        argmax(candidates, |c| {
            let score = 0.3 * c.reputation + 0.25 * c.availability + 0.25 * c.performance + 0.2 * c.stake;
            if c.consecutive_terms >= self.max_consecutive_terms {
                score * 0.5
            } else {
                score
            }
        })
    }
}

fn argmax(candidates: &[Candidate], score: impl Fn(&Candidate) -> f64) -> AgentId {
    candidates
        .iter()
        .max_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal))
        .expect("candidates is non-empty")
        .id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(seed: u8, reputation: f64, stake: f64, performance: f64, availability: f64) -> Candidate {
        Candidate {
            id: AgentId(uuid::Uuid::from_bytes([seed; 16])),
            reputation,
            stake,
            performance,
            availability,
            consecutive_terms: 0,
        }
    }

    #[test]
    fn round_robin_cycles_by_view() {
        let candidates = vec![candidate(1, 0.0, 0.0, 0.0, 0.0), candidate(2, 0.0, 0.0, 0.0, 0.0)];
        let algo = RoundRobin;
        let first = algo.pick(&candidates, 0);
        let second = algo.pick(&candidates, 1);
        assert_ne!(first, second);
        assert_eq!(algo.pick(&candidates, 2), first);
    }

    #[test]
    fn reputation_picks_highest() {
        let candidates = vec![candidate(1, 0.2, 0.0, 0.0, 0.0), candidate(2, 0.9, 0.0, 0.0, 0.0)];
        let algo = ReputationWeighted;
        assert_eq!(algo.pick(&candidates, 0), candidates[1].id);
    }

    #[test]
    fn hybrid_halves_score_past_term_limit() {
        let mut dominant = candidate(1, 1.0, 1.0, 1.0, 1.0);
        dominant.consecutive_terms = 5;
        let challenger = candidate(2, 0.6, 0.6, 0.6, 0.6);
        let algo = Hybrid { max_consecutive_terms: 3 };
        // dominant's halved score (0.5) is still above challenger's unhalved 0.6? check math:
        // dominant halved = 0.5, challenger = 0.6 -> challenger wins.
        assert_eq!(algo.pick(&[dominant, challenger], 0), challenger.id);
    }

    #[test]
    fn hybrid_lets_dominant_win_under_term_limit() {
        let dominant = candidate(1, 1.0, 1.0, 1.0, 1.0);
        let challenger = candidate(2, 0.6, 0.6, 0.6, 0.6);
        let algo = Hybrid { max_consecutive_terms: 3 };
        assert_eq!(algo.pick(&[dominant, challenger], 0), dominant.id);
    }
}
