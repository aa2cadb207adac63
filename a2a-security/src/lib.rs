//! Identity binding and participation authorization for the A2A coordination fabric.
//!
//! Deliberately has no dependency on `a2a-consensus`: anomaly reports flow out through the
//! narrow [`AnomalySink`] trait so whichever consensus kernel is wired up at the top level can
//! react to them, while this crate stays usable standalone.

mod anomaly;
mod error;
mod identity;
mod integrator;

pub use anomaly::{AnomalyEvidence, AnomalySink, NullSink};
pub use error::SecurityError;
pub use identity::{Action, IdentityBinding};
pub use integrator::SecurityIntegrator;
