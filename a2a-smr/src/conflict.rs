use a2a_core::AgentRegistry;
use chrono::{DateTime, Utc};

use crate::types::{OperationKind, StateOperation};

/// Which two operation kinds on the same target, seen within the conflict detection window,
/// count as a real conflict rather than two independent edits.
pub fn kinds_conflict(a: OperationKind, b: OperationKind) -> bool {
    use OperationKind::*;
    matches!(
        (a, b),
        (Create, Create) | (Update, Update) | (Update, Delete) | (Delete, Update) | (Delete, Create) | (Create, Delete) | (Execute, Execute)
    )
}

/// How a conflict winner's synthesized reversal should be applied to the loser's side effects.
#[derive(Debug, Clone)]
pub enum RollbackAction {
    /// The losing operation created the target; undo by deleting it.
    Delete { target: String },
    /// The losing operation updated or deleted the target; undo by restoring captured prior data.
    Restore { target: String, data: serde_json::Value },
    /// The losing operation was an `execute` call; no generally safe inverse exists, so rollback
    /// is a no-op and the operation is simply marked rolled back in the audit trail.
    Noop,
}

impl RollbackAction {
    /// The inverse action for `op`, given `prior` — the target's value immediately before `op`
    /// was applied (`None` if the target didn't exist).
    pub fn inverse_of(op: &StateOperation, prior: Option<serde_json::Value>) -> Self {
        match op.kind {
            OperationKind::Create => RollbackAction::Delete { target: op.target.clone() },
            OperationKind::Update | OperationKind::Delete => match prior {
                Some(data) => RollbackAction::Restore { target: op.target.clone(), data },
                None => RollbackAction::Delete { target: op.target.clone() },
            },
            OperationKind::Execute => RollbackAction::Noop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    LastWriterWins,
    VectorClock,
    ConsensusBased,
}

/// One previously applied operation, kept around just long enough to be a candidate for conflict
/// detection against operations arriving within the window.
#[derive(Debug, Clone)]
pub struct AppliedRecord {
    pub op: StateOperation,
    pub applied_at: DateTime<Utc>,
    pub prior_value: Option<serde_json::Value>,
}

/// Decides, when an incoming operation conflicts with a previously applied one on the same
/// target, which survives. Losers are rolled back via [`RollbackAction::inverse_of`]; winners are
/// applied normally.
pub struct ConflictResolver {
    strategy: ConflictStrategy,
    registry: AgentRegistry,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy, registry: AgentRegistry) -> Self {
        Self { strategy, registry }
    }

    /// Returns `true` if `incoming` should win over `existing`.
    pub fn incoming_wins(&self, existing: &AppliedRecord, incoming: &StateOperation) -> bool {
        match self.strategy {
            // Operations are resolved in delivery order, so whichever arrives at resolution time
            // is, by construction, the latest writer.
            ConflictStrategy::LastWriterWins => true,
            ConflictStrategy::VectorClock => incoming.sequence > existing.op.sequence,
            ConflictStrategy::ConsensusBased => {
                let existing_trust = self.registry.get(&existing.op.executor).map(|a| a.reputation()).unwrap_or(0.0);
                let incoming_trust = self.registry.get(&incoming.executor).map(|a| a.reputation()).unwrap_or(0.0);
                if (incoming_trust - existing_trust).abs() < f64::EPSILON {
                    incoming.sequence > existing.op.sequence
                } else {
                    incoming_trust > existing_trust
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::{Agent, AgentId};
    use a2a_crypto::KeyPair;

    fn record(sequence: u64, executor: AgentId) -> AppliedRecord {
        AppliedRecord {
            op: StateOperation {
                id: uuid::Uuid::new_v4(),
                kind: OperationKind::Update,
                target: "doc-1".into(),
                data: serde_json::json!({"v": 1}),
                sequence,
                deps: vec![],
                signature: KeyPair::generate().sign(b"x"),
                executor,
            },
            applied_at: Utc::now(),
            prior_value: None,
        }
    }

    #[test]
    fn conflict_matrix_matches_spec_pairs() {
        assert!(kinds_conflict(OperationKind::Create, OperationKind::Create));
        assert!(kinds_conflict(OperationKind::Update, OperationKind::Delete));
        assert!(!kinds_conflict(OperationKind::Create, OperationKind::Update));
    }

    #[test]
    fn vector_clock_strategy_prefers_higher_sequence() {
        let registry = AgentRegistry::new();
        let resolver = ConflictResolver::new(ConflictStrategy::VectorClock, registry);
        let existing = record(5, AgentId::new());
        let incoming = StateOperation { sequence: 9, ..record(9, AgentId::new()).op };
        assert!(resolver.incoming_wins(&existing, &incoming));
    }

    #[test]
    fn consensus_based_strategy_prefers_higher_trust() {
        let registry = AgentRegistry::new();
        let low = Agent::new(KeyPair::generate().public_key());
        let high = Agent::new(KeyPair::generate().public_key());
        let low_id = low.id;
        let high_id = high.id;
        registry.register(low).unwrap();
        registry.register(high).unwrap();
        registry.update_reputation(&high_id, 0.9).unwrap();

        let resolver = ConflictResolver::new(ConflictStrategy::ConsensusBased, registry);
        let existing = record(5, low_id);
        let incoming = record(3, high_id).op;
        assert!(resolver.incoming_wins(&existing, &incoming));
    }

    #[test]
    fn rollback_of_create_deletes_target() {
        let op = record(1, AgentId::new()).op;
        let rollback = RollbackAction::inverse_of(&op, None);
        assert!(matches!(rollback, RollbackAction::Restore { .. } | RollbackAction::Delete { .. }));
    }
}
