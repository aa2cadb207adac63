use std::collections::HashMap;

use a2a_core::AgentId;
use serde::{Deserialize, Serialize};

pub type Term = u64;
pub type LogIndex = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// A single replicated log entry. `index` is 1-based; `(index, term)` uniquely identifies an
/// entry, and once `committed` flips true it is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: LogIndex,
    pub term: Term,
    pub command: serde_json::Value,
    pub committed: bool,
}

#[derive(Debug, Clone)]
pub struct RequestVote {
    pub term: Term,
    pub candidate: AgentId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, Copy)]
pub struct VoteResponse {
    pub term: Term,
    pub granted: bool,
}

#[derive(Debug, Clone)]
pub struct AppendEntries {
    pub term: Term,
    pub leader: AgentId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: LogIndex,
}

#[derive(Debug, Clone, Copy)]
pub struct AppendResponse {
    pub term: Term,
    pub success: bool,
    /// The follower's last log index, so a rejecting response lets the leader jump `nextIndex`
    /// straight to the mismatch point instead of decrementing one at a time.
    pub last_log_index: LogIndex,
}

/// One node's view of Raft state. Election timing (the randomized 150-300ms timeout) is driven
/// by the caller — this type only holds state and answers "what should happen given this
/// message," consistent with the kernel's event-driven, non-blocking handlers.
pub struct RaftNode {
    pub id: AgentId,
    pub role: Role,
    pub current_term: Term,
    pub voted_for: Option<AgentId>,
    pub log: Vec<LogEntry>,
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    next_index: HashMap<AgentId, LogIndex>,
    match_index: HashMap<AgentId, LogIndex>,
    quorum: usize,
}

impl RaftNode {
    pub fn new(id: AgentId, quorum: usize) -> Self {
        Self {
            id,
            role: Role::Follower,
            current_term: 0,
            voted_for: None,
            log: Vec::new(),
            commit_index: 0,
            last_applied: 0,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            quorum,
        }
    }

    pub fn last_log_index(&self) -> LogIndex {
        self.log.last().map(|e| e.index).unwrap_or(0)
    }

    pub fn last_log_term(&self) -> Term {
        self.log.last().map(|e| e.term).unwrap_or(0)
    }

    /// Election timeout fired: become a candidate, bump term, vote for self.
    pub fn become_candidate(&mut self) -> RequestVote {
        self.current_term += 1;
        self.role = Role::Candidate;
        self.voted_for = Some(self.id);
        RequestVote {
            term: self.current_term,
            candidate: self.id,
            last_log_index: self.last_log_index(),
            last_log_term: self.last_log_term(),
        }
    }

    /// `candidate-log ≥ local-log`: higher last-log term wins; ties broken by longer log.
    fn log_at_least_as_up_to_date(&self, last_log_index: LogIndex, last_log_term: Term) -> bool {
        match last_log_term.cmp(&self.last_log_term()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => last_log_index >= self.last_log_index(),
        }
    }

    pub fn handle_request_vote(&mut self, req: &RequestVote) -> VoteResponse {
        if req.term < self.current_term {
            return VoteResponse { term: self.current_term, granted: false };
        }
        if req.term > self.current_term {
            self.current_term = req.term;
            self.voted_for = None;
            self.role = Role::Follower;
        }
        let can_vote = matches!(self.voted_for, None | Some(c) if c == req.candidate);
        let granted = can_vote && self.log_at_least_as_up_to_date(req.last_log_index, req.last_log_term);
        if granted {
            self.voted_for = Some(req.candidate);
        }
        VoteResponse { term: self.current_term, granted }
    }

    /// Record a vote response while campaigning. Returns `true` the moment this call pushes the
    /// candidate over quorum in the same term it started the election in.
    pub fn record_vote(&mut self, votes_received: usize, resp: VoteResponse) -> bool {
        if resp.term > self.current_term {
            self.current_term = resp.term;
            self.role = Role::Follower;
            self.voted_for = None;
            return false;
        }
        self.role == Role::Candidate && resp.granted && votes_received + 1 >= self.quorum
    }

    /// Transition to leader after winning an election; seeds `nextIndex`/`matchIndex` for every
    /// peer in `peers`.
    pub fn become_leader(&mut self, peers: &[AgentId]) {
        self.role = Role::Leader;
        let next = self.last_log_index() + 1;
        self.next_index = peers.iter().map(|p| (*p, next)).collect();
        self.match_index = peers.iter().map(|p| (*p, 0)).collect();
    }

    pub fn append_command(&mut self, command: serde_json::Value) -> LogIndex {
        let index = self.last_log_index() + 1;
        self.log.push(LogEntry {
            index,
            term: self.current_term,
            command,
            committed: false,
        });
        index
    }

    pub fn handle_append_entries(&mut self, req: &AppendEntries) -> AppendResponse {
        if req.term < self.current_term {
            return AppendResponse { term: self.current_term, success: false, last_log_index: self.last_log_index() };
        }
        self.current_term = req.term;
        self.role = Role::Follower;

        if req.prev_log_index > 0 {
            let has_matching_prev = self
                .log
                .iter()
                .any(|e| e.index == req.prev_log_index && e.term == req.prev_log_term);
            if !has_matching_prev {
                return AppendResponse { term: self.current_term, success: false, last_log_index: self.last_log_index() };
            }
        }

        self.log.retain(|e| e.index <= req.prev_log_index);
        self.log.extend(req.entries.iter().cloned());

        if req.leader_commit > self.commit_index {
            self.commit_index = req.leader_commit.min(self.last_log_index());
        }

        AppendResponse { term: self.current_term, success: true, last_log_index: self.last_log_index() }
    }

    pub fn next_index_for(&self, peer: &AgentId) -> LogIndex {
        *self.next_index.get(peer).unwrap_or(&(self.last_log_index() + 1))
    }

    /// Update leader-side replication bookkeeping after an `append-entries` response, then
    /// recompute `commitIndex` as the highest index replicated to a majority in the current term.
    pub fn handle_append_response(&mut self, peer: AgentId, resp: AppendResponse) {
        if resp.success {
            self.match_index.insert(peer, resp.last_log_index);
            self.next_index.insert(peer, resp.last_log_index + 1);
        } else {
            let next = self.next_index.entry(peer).or_insert(1);
            *next = next.saturating_sub(1).max(1);
        }
        self.advance_commit_index();
    }

    fn advance_commit_index(&mut self) {
        let mut candidate_indices: Vec<LogIndex> = self.match_index.values().copied().collect();
        candidate_indices.push(self.last_log_index()); // leader's own log counts as replicated to itself
        candidate_indices.sort_unstable_by(|a, b| b.cmp(a));

        if let Some(&k) = candidate_indices.get(self.quorum.saturating_sub(1)) {
            if k > self.commit_index {
                let term_at_k = self.log.iter().find(|e| e.index == k).map(|e| e.term);
                if term_at_k == Some(self.current_term) {
                    self.commit_index = k;
                    for entry in self.log.iter_mut().filter(|e| e.index <= k) {
                        entry.committed = true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_wins_with_majority_in_same_term() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        node.become_candidate();
        let resp = VoteResponse { term: node.current_term, granted: true };
        assert!(node.record_vote(0, resp));
    }

    #[test]
    fn higher_term_response_steps_down() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        node.become_candidate();
        let higher_term_resp = VoteResponse { term: node.current_term + 5, granted: false };
        assert!(!node.record_vote(0, higher_term_resp));
        assert_eq!(node.role, Role::Follower);
    }

    #[test]
    fn vote_rejected_for_stale_term() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        node.current_term = 5;
        let req = RequestVote { term: 3, candidate: AgentId::new(), last_log_index: 0, last_log_term: 0 };
        let resp = node.handle_request_vote(&req);
        assert!(!resp.granted);
    }

    #[test]
    fn vote_denied_if_already_voted_for_another_candidate() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        let first = AgentId::new();
        let second = AgentId::new();
        let req1 = RequestVote { term: 1, candidate: first, last_log_index: 0, last_log_term: 0 };
        assert!(node.handle_request_vote(&req1).granted);
        let req2 = RequestVote { term: 1, candidate: second, last_log_index: 0, last_log_term: 0 };
        assert!(!node.handle_request_vote(&req2).granted);
    }

    #[test]
    fn commit_index_advances_on_majority_replication() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        node.current_term = 1;
        node.append_command(serde_json::json!({"op": "set"}));
        let peer = AgentId::new();
        node.become_leader(&[peer]);
        node.handle_append_response(peer, AppendResponse { term: 1, success: true, last_log_index: 1 });
        assert_eq!(node.commit_index, 1);
        assert!(node.log[0].committed);
    }

    #[test]
    fn append_entries_rejects_on_log_mismatch() {
        let mut node = RaftNode::new(AgentId::new(), 2);
        let req = AppendEntries {
            term: 1,
            leader: AgentId::new(),
            prev_log_index: 5,
            prev_log_term: 1,
            entries: vec![],
            leader_commit: 0,
        };
        let resp = node.handle_append_entries(&req);
        assert!(!resp.success);
    }
}
