use a2a_core::AgentId;

/// A behavioral anomaly observed against a bound identity, reported independently of whatever
/// consensus or registry mechanism noticed it.
#[derive(Debug, Clone)]
pub enum AnomalyEvidence {
    RepeatedAuthorizationDenial { action: &'static str, attempts: u32 },
    KeyMismatch,
    RateLimitExceeded { observed: u32, limit: u32 },
}

/// Narrow sink other crates implement to receive anomaly reports without this crate needing to
/// depend on them back. Consensus's `ByzantineTracker` is the primary implementor, wired up at
/// the top level so this crate never imports `a2a-consensus`.
pub trait AnomalySink: Send + Sync {
    fn record(&self, agent_id: AgentId, evidence: AnomalyEvidence);
}

/// Sink that drops every report, used wherever a fabric runs without a consensus kernel attached
/// (e.g. isolated registry/voting services) so `SecurityIntegrator` always has a sink to call.
pub struct NullSink;

impl AnomalySink for NullSink {
    fn record(&self, _agent_id: AgentId, _evidence: AnomalyEvidence) {}
}
