use std::sync::Arc;

use a2a_core::{AgentId, TrustLevel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceBounds {
    pub max_avg_latency_ms: f64,
    pub min_success_rate: f64,
}

impl Default for PerformanceBounds {
    fn default() -> Self {
        Self { max_avg_latency_ms: f64::MAX, min_success_rate: 0.0 }
    }
}

/// A capability's static metadata, independent of the callable wrapper that implements it.
/// `id` is dotted (`"vision.detect-objects"`): the first segment is the category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub required_capabilities: Vec<String>,
    pub min_trust_level: TrustLevel,
    pub performance: PerformanceBoundsSerde,
    pub tags: Vec<String>,
    pub metadata: Value,
}

/// Runtime-observed performance, updated as the capability is invoked; distinct from the
/// declared [`PerformanceBounds`] a query filters against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceBoundsSerde {
    pub avg_latency_ms: f64,
    pub success_rate: f64,
}

impl CapabilityDescriptor {
    pub fn category(&self) -> &str {
        self.id.split('.').next().unwrap_or(&self.id)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.id.is_empty() {
            return Err(RegistryError::IncompleteCapability(self.id.clone(), "id must not be empty"));
        }
        if self.name.is_empty() {
            return Err(RegistryError::IncompleteCapability(self.id.clone(), "name must not be empty"));
        }
        if self.version.is_empty() {
            return Err(RegistryError::IncompleteCapability(self.id.clone(), "version must not be empty"));
        }
        Ok(())
    }

    /// Score query results are ordered by: higher is better, never divides by zero.
    pub fn rank_score(&self) -> f64 {
        self.performance.success_rate / self.performance.avg_latency_ms.max(1.0)
    }
}

/// Caller-supplied execution context: identity, trust, and whatever the invoked capability needs
/// threaded through (trace id, deadline, etc.) beyond its own `params`.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub caller: AgentId,
    pub trust: TrustLevel,
    pub trace_id: uuid::Uuid,
}

/// The callable side of a capability, registered alongside its [`CapabilityDescriptor`].
#[async_trait]
pub trait CapabilityWrapper: Send + Sync {
    async fn invoke(&self, params: Value, ctx: &ExecutionContext) -> Result<Value, RegistryError>;
}

pub type SharedWrapper = Arc<dyn CapabilityWrapper>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    FailFast,
    Continue,
    Retry { max_attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionStrategy {
    Sequential,
    Parallel,
    Conditional,
    Pipeline,
}

#[derive(Debug, Clone)]
pub struct Composition {
    pub id: String,
    pub members: Vec<String>,
    pub strategy: CompositionStrategy,
    pub error_policy: ErrorPolicy,
    pub min_trust_level: TrustLevel,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityFilter {
    pub name_substring: Option<String>,
    pub version: Option<String>,
    pub category: Option<String>,
    pub min_trust_level: Option<TrustLevel>,
    pub required_capabilities: Vec<String>,
    pub performance: Option<PerformanceBounds>,
    pub tags: Vec<String>,
}
