use std::collections::HashMap;

use a2a_crypto::Digest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stable checkpoint of the replicated state, taken every `checkpointInterval` applied
/// operations. `state` is a deep copy at capture time — later mutation of the live state never
/// touches an already-taken snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub sequence: u64,
    pub state: HashMap<String, serde_json::Value>,
    pub hash: Digest,
    pub included_operations: Vec<Uuid>,
}

impl Snapshot {
    pub fn capture(
        sequence: u64,
        state: &HashMap<String, serde_json::Value>,
        included_operations: Vec<Uuid>,
        crypto: &dyn a2a_crypto::CryptoProvider,
    ) -> Self {
        let serialized = serde_json::to_vec(state).unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            sequence,
            state: state.clone(),
            hash: crypto.hash(&serialized),
            included_operations,
        }
    }
}
