use a2a_core::AgentId;
use a2a_crypto::Signature;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The four operation kinds the replicated state machine understands. `Execute` is the escape
/// hatch for the small whitelist of side-effecting functions in [`crate::state::StateMachine`]
/// rather than a raw key/value mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
    Execute,
}

/// One operation committed through consensus and destined for the replicated state machine.
/// `sequence` must strictly increase per `executor`; `deps` names operation ids that must already
/// be applied before this one is eligible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateOperation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub target: String,
    pub data: serde_json::Value,
    pub sequence: u64,
    #[serde(default)]
    pub deps: Vec<Uuid>,
    pub signature: Signature,
    pub executor: AgentId,
}

/// Status an operation occupies from the moment it is proposed to the moment it is durably
/// applied or rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Proposed,
    Pending,
    Applied,
    RolledBack,
}
