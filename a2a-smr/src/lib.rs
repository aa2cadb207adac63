//! State machine replication for the A2A coordination fabric.
//!
//! Holds the deterministic key/value state every committed consensus proposal mutates, the
//! dependency-ordered pending queue for operations whose `deps` aren't satisfied yet, conflict
//! detection and resolution for operations landing on the same target close together, and
//! periodic snapshotting with bounded retention for crash recovery.

mod conflict;
mod error;
mod snapshot;
mod state;
mod types;
mod vector_clock;

pub use conflict::{kinds_conflict, AppliedRecord, ConflictResolver, ConflictStrategy, RollbackAction};
pub use error::SmrError;
pub use snapshot::Snapshot;
pub use state::{SmrConfig, StateMachine};
pub use types::{OperationKind, OperationStatus, StateOperation};
pub use vector_clock::{VectorClock, VectorClockOrdering};
