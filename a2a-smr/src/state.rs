use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use a2a_core::AgentId;
use a2a_crypto::{CryptoProvider, Ed25519Blake3Provider};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::conflict::{kinds_conflict, AppliedRecord, ConflictResolver, ConflictStrategy, RollbackAction};
use crate::error::SmrError;
use crate::snapshot::Snapshot;
use crate::types::{OperationKind, StateOperation};

/// How often (in applied operations) a snapshot is captured, and how many are kept.
#[derive(Debug, Clone, Copy)]
pub struct SmrConfig {
    pub checkpoint_interval: u64,
    pub conflict_window: u64,
    pub snapshot_retention: usize,
}

impl Default for SmrConfig {
    fn default() -> Self {
        Self { checkpoint_interval: 100, conflict_window: 10, snapshot_retention: 10 }
    }
}

/// The deterministic key/value store consensus replicates into. A node owns exactly one
/// `StateMachine`; other replicas converge on the same state by applying the same committed
/// operations in the same order, never by sharing this struct across a process boundary.
pub struct StateMachine {
    state: DashMap<String, serde_json::Value>,
    pending: DashMap<Uuid, StateOperation>,
    applied_ids: DashMap<Uuid, ()>,
    last_sequence: DashMap<AgentId, u64>,
    history: Mutex<VecDeque<AppliedRecord>>,
    snapshots: Mutex<VecDeque<Snapshot>>,
    applied_count: AtomicU64,
    config: SmrConfig,
    crypto: Arc<dyn CryptoProvider>,
    resolver: RwLock<ConflictResolver>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self::with_config(SmrConfig::default(), ConflictStrategy::LastWriterWins, a2a_core::AgentRegistry::new())
    }

    pub fn with_config(config: SmrConfig, strategy: ConflictStrategy, registry: a2a_core::AgentRegistry) -> Self {
        Self {
            state: DashMap::new(),
            pending: DashMap::new(),
            applied_ids: DashMap::new(),
            last_sequence: DashMap::new(),
            history: Mutex::new(VecDeque::new()),
            snapshots: Mutex::new(VecDeque::new()),
            applied_count: AtomicU64::new(0),
            config,
            crypto: Arc::new(Ed25519Blake3Provider),
            resolver: RwLock::new(ConflictResolver::new(strategy, registry)),
        }
    }

    pub fn get(&self, target: &str) -> Option<serde_json::Value> {
        self.state.get(target).map(|e| e.value().clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Apply `op`, or queue it in `pendingOperations` if its `deps` aren't all satisfied yet.
    /// Drains the pending queue afterward for anything `op` unblocked.
    pub fn apply(&self, op: StateOperation) -> Result<(), SmrError> {
        if !self.deps_satisfied(&op) {
            let id = op.id;
            self.pending.insert(id, op);
            return Err(SmrError::DependenciesUnmet(id));
        }
        self.apply_checked(op)?;
        self.drain_pending();
        Ok(())
    }

    fn deps_satisfied(&self, op: &StateOperation) -> bool {
        op.deps.iter().all(|dep| self.applied_ids.contains_key(dep))
    }

    fn drain_pending(&self) {
        loop {
            let ready: Vec<StateOperation> = {
                let mut candidates: Vec<StateOperation> = self
                    .pending
                    .iter()
                    .filter(|entry| self.deps_satisfied(entry.value()))
                    .map(|entry| entry.value().clone())
                    .collect();
                candidates.sort_by_key(|op| op.sequence);
                candidates
            };
            if ready.is_empty() {
                return;
            }
            for op in ready {
                self.pending.remove(&op.id);
                if let Err(e) = self.apply_checked(op) {
                    warn!(error = %e, "deferred operation failed to apply once unblocked");
                }
            }
        }
    }

    fn apply_checked(&self, op: StateOperation) -> Result<(), SmrError> {
        self.check_sequence(&op)?;

        if let Some(conflict) = self.find_conflict(&op) {
            let incoming_wins = self.resolver.read().incoming_wins(&conflict, &op);
            if !incoming_wins {
                info!(op_id = %op.id, target = %op.target, "operation lost conflict resolution, dropping");
                return Ok(());
            }
            self.rollback(&conflict);
            self.history.lock().retain(|record| record.op.id != conflict.op.id);
        }

        let prior = self.state.get(&op.target).map(|e| e.value().clone());
        self.mutate(&op)?;

        self.last_sequence.insert(op.executor, op.sequence);
        self.applied_ids.insert(op.id, ());

        let mut history = self.history.lock();
        history.push_back(AppliedRecord { op: op.clone(), applied_at: Utc::now(), prior_value: prior });
        while history.len() > 256 {
            history.pop_front();
        }
        drop(history);

        let count = self.applied_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.config.checkpoint_interval == 0 {
            self.take_snapshot(op.sequence, vec![op.id]);
        }
        Ok(())
    }

    fn check_sequence(&self, op: &StateOperation) -> Result<(), SmrError> {
        let last = self.last_sequence.get(&op.executor).map(|e| *e.value()).unwrap_or(0);
        if op.sequence <= last && last != 0 {
            return Err(SmrError::NonMonotonicSequence { last, attempted: op.sequence });
        }
        Ok(())
    }

    /// Find a previously applied operation on the same target, within the configured sequence
    /// window, whose kind conflicts with `op`'s.
    fn find_conflict(&self, op: &StateOperation) -> Option<AppliedRecord> {
        let window = self.config.conflict_window;
        let history = self.history.lock();
        history
            .iter()
            .rev()
            .find(|record| {
                record.op.target == op.target
                    && op.sequence.abs_diff(record.op.sequence) <= window
                    && kinds_conflict(record.op.kind, op.kind)
            })
            .cloned()
    }

    fn rollback(&self, record: &AppliedRecord) {
        let action = RollbackAction::inverse_of(&record.op, record.prior_value.clone());
        match action {
            RollbackAction::Delete { target } => {
                self.state.remove(&target);
            }
            RollbackAction::Restore { target, data } => {
                self.state.insert(target, data);
            }
            RollbackAction::Noop => {}
        }
    }

    fn mutate(&self, op: &StateOperation) -> Result<(), SmrError> {
        match op.kind {
            OperationKind::Create => {
                if self.state.contains_key(&op.target) {
                    return Err(SmrError::TargetAlreadyExists(op.target.clone()));
                }
                self.state.insert(op.target.clone(), op.data.clone());
                Ok(())
            }
            OperationKind::Update => {
                let mut entry = self
                    .state
                    .get_mut(&op.target)
                    .ok_or_else(|| SmrError::TargetNotFound(op.target.clone()))?;
                match (entry.value_mut(), &op.data) {
                    (serde_json::Value::Object(existing), serde_json::Value::Object(incoming)) => {
                        for (k, v) in incoming {
                            existing.insert(k.clone(), v.clone());
                        }
                    }
                    (slot, new_value) => *slot = new_value.clone(),
                }
                Ok(())
            }
            OperationKind::Delete => {
                self.state
                    .remove(&op.target)
                    .map(|_| ())
                    .ok_or_else(|| SmrError::TargetNotFound(op.target.clone()))
            }
            OperationKind::Execute => self.execute(op),
        }
    }

    /// Dispatches `execute` operations to a small whitelist of safe, total functions. Anything
    /// outside the whitelist is rejected rather than evaluated.
    fn execute(&self, op: &StateOperation) -> Result<(), SmrError> {
        let function = op.data.get("function").and_then(|v| v.as_str()).unwrap_or_default();
        let params = op.data.get("params").cloned().unwrap_or(serde_json::Value::Null);

        match function {
            "increment" => {
                let amount = params.as_f64().or_else(|| params.get("amount").and_then(|v| v.as_f64())).unwrap_or(0.0);
                let mut entry = self.state.entry(op.target.clone()).or_insert(serde_json::json!(0.0));
                let current = entry.value().as_f64().unwrap_or(0.0);
                *entry.value_mut() = serde_json::json!(current + amount);
                Ok(())
            }
            "append" => {
                let mut entry = self.state.entry(op.target.clone()).or_insert(serde_json::json!([]));
                if let serde_json::Value::Array(arr) = entry.value_mut() {
                    arr.push(params);
                }
                Ok(())
            }
            "merge" => {
                let mut entry = self.state.entry(op.target.clone()).or_insert(serde_json::json!({}));
                if let (serde_json::Value::Object(existing), serde_json::Value::Object(incoming)) =
                    (entry.value_mut(), &params)
                {
                    for (k, v) in incoming {
                        existing.insert(k.clone(), v.clone());
                    }
                }
                Ok(())
            }
            other => Err(SmrError::UnknownFunction(other.to_string())),
        }
    }

    fn take_snapshot(&self, sequence: u64, included: Vec<Uuid>) {
        let snapshot_state: HashMap<String, serde_json::Value> =
            self.state.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        let snapshot = Snapshot::capture(sequence, &snapshot_state, included, self.crypto.as_ref());
        let mut snapshots = self.snapshots.lock();
        snapshots.push_back(snapshot);
        while snapshots.len() > self.config.snapshot_retention {
            snapshots.pop_front();
        }
    }

    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.lock().back().cloned()
    }

    /// Restore state from `snapshot`, then replay `replay` (already-committed operations with
    /// `sequence` greater than the snapshot's) in ascending sequence order.
    pub fn restore(&self, snapshot: &Snapshot, mut replay: Vec<StateOperation>) -> Result<(), SmrError> {
        self.state.clear();
        for (k, v) in &snapshot.state {
            self.state.insert(k.clone(), v.clone());
        }
        replay.sort_by_key(|op| op.sequence);
        for op in replay {
            self.apply_checked(op)?;
        }
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
