use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use futures::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::error::RegistryError;
use crate::graph::find_cycle;
use crate::types::{
    CapabilityDescriptor, CapabilityFilter, CompositionStrategy, Composition, ErrorPolicy, ExecutionContext, SharedWrapper,
};

struct Registration {
    descriptor: CapabilityDescriptor,
    wrapper: SharedWrapper,
}

/// Holds every capability a fabric node can invoke, directly or as part of a declared
/// composition, plus the indices `query` needs to avoid a linear scan of unrelated state on
/// every call.
pub struct CapabilityRegistry {
    capabilities: DashMap<String, Registration>,
    by_category: DashMap<String, HashSet<String>>,
    compositions: DashMap<String, Composition>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self { capabilities: DashMap::new(), by_category: DashMap::new(), compositions: DashMap::new() }
    }

    /// Registers `descriptor` under `descriptor.id`. A second call with the same id replaces the
    /// prior registration, logging both versions rather than silently overwriting.
    pub fn register(&self, descriptor: CapabilityDescriptor, wrapper: SharedWrapper) -> Result<(), RegistryError> {
        descriptor.validate()?;
        let id = descriptor.id.clone();
        let category = descriptor.category().to_string();

        if let Some(existing) = self.capabilities.get(&id) {
            warn!(
                id = %id,
                old_version = %existing.descriptor.version,
                new_version = %descriptor.version,
                "replacing existing capability registration"
            );
        }

        self.by_category.entry(category).or_default().insert(id.clone());
        self.capabilities.insert(id, Registration { descriptor, wrapper });
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<CapabilityDescriptor, RegistryError> {
        self.capabilities.get(id).map(|r| r.descriptor.clone()).ok_or_else(|| RegistryError::UnknownCapability(id.to_string()))
    }

    /// Linear scan filtered by every populated field of `filter`, results ordered by
    /// `success_rate / max(avg_latency, 1)` descending.
    pub fn query(&self, filter: &CapabilityFilter) -> Vec<CapabilityDescriptor> {
        let mut results: Vec<CapabilityDescriptor> = self
            .capabilities
            .iter()
            .map(|entry| entry.descriptor.clone())
            .filter(|d| filter.name_substring.as_ref().map_or(true, |s| d.name.contains(s.as_str())))
            .filter(|d| filter.version.as_ref().map_or(true, |v| &d.version == v))
            .filter(|d| filter.category.as_ref().map_or(true, |c| d.category() == c))
            .filter(|d| filter.min_trust_level.map_or(true, |min| d.min_trust_level >= min))
            .filter(|d| filter.required_capabilities.iter().all(|r| d.required_capabilities.contains(r)))
            .filter(|d| {
                filter.performance.map_or(true, |bounds| {
                    d.performance.avg_latency_ms <= bounds.max_avg_latency_ms && d.performance.success_rate >= bounds.min_success_rate
                })
            })
            .filter(|d| filter.tags.iter().all(|t| d.tags.contains(t)))
            .collect();
        results.sort_by(|a, b| b.rank_score().partial_cmp(&a.rank_score()).unwrap_or(std::cmp::Ordering::Equal));
        results
    }

    /// Registers a composition, rejecting unknown members, dependency edges that reach outside
    /// the composition, and cyclic dependency graphs among the members.
    pub fn compose(&self, composition: Composition) -> Result<(), RegistryError> {
        let member_set: HashSet<&str> = composition.members.iter().map(|m| m.as_str()).collect();

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for member in &composition.members {
            let descriptor = self.get(member)?;
            for dep in &descriptor.required_capabilities {
                if !member_set.contains(dep.as_str()) {
                    return Err(RegistryError::UnknownMember(dep.clone()));
                }
                edges.entry(member.clone()).or_default().push(dep.clone());
            }
            edges.entry(member.clone()).or_default();
        }

        if let Some(cycle_at) = find_cycle(&edges) {
            return Err(RegistryError::CyclicDependency(cycle_at));
        }

        self.compositions.insert(composition.id.clone(), composition);
        Ok(())
    }

    /// Dispatches `composition_id` over `params` according to its declared strategy, after
    /// checking the caller's trust meets the composition's minimum.
    pub async fn execute(&self, composition_id: &str, params: Value, ctx: &ExecutionContext) -> Result<Vec<Value>, RegistryError> {
        let composition = self
            .compositions
            .get(composition_id)
            .map(|c| c.clone())
            .ok_or_else(|| RegistryError::UnknownComposition(composition_id.to_string()))?;

        if ctx.trust < composition.min_trust_level {
            return Err(RegistryError::TrustTooLow(composition_id.to_string()));
        }

        match composition.strategy {
            CompositionStrategy::Sequential | CompositionStrategy::Conditional => {
                self.execute_sequential(&composition, params, ctx).await
            }
            CompositionStrategy::Parallel => self.execute_parallel(&composition, params, ctx).await,
            CompositionStrategy::Pipeline => self.execute_pipeline(&composition, params, ctx).await,
        }
    }

    async fn invoke_member(&self, member: &str, params: Value, ctx: &ExecutionContext) -> Result<Value, RegistryError> {
        let wrapper = self
            .capabilities
            .get(member)
            .map(|r| r.wrapper.clone())
            .ok_or_else(|| RegistryError::UnknownCapability(member.to_string()))?;
        wrapper.invoke(params, ctx).await
    }

    async fn execute_sequential(&self, composition: &Composition, params: Value, ctx: &ExecutionContext) -> Result<Vec<Value>, RegistryError> {
        let mut results = Vec::with_capacity(composition.members.len());
        for member in &composition.members {
            match self.invoke_with_policy(member, params.clone(), ctx, composition.error_policy).await {
                Ok(Some(value)) => results.push(value),
                Ok(None) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    async fn execute_parallel(&self, composition: &Composition, params: Value, ctx: &ExecutionContext) -> Result<Vec<Value>, RegistryError> {
        let futures = composition.members.iter().map(|member| self.invoke_member(member, params.clone(), ctx));
        let outcomes = join_all(futures).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (member, outcome) in composition.members.iter().zip(outcomes) {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => match composition.error_policy {
                    ErrorPolicy::FailFast => {
                        return Err(RegistryError::MemberExecutionFailed { member: member.clone(), strategy: "parallel", source: e.to_string() })
                    }
                    ErrorPolicy::Continue | ErrorPolicy::Retry { .. } => {
                        warn!(member = %member, error = %e, "parallel member failed, continuing per error policy");
                    }
                },
            }
        }
        Ok(results)
    }

    async fn execute_pipeline(&self, composition: &Composition, params: Value, ctx: &ExecutionContext) -> Result<Vec<Value>, RegistryError> {
        let mut current = params;
        let mut results = Vec::with_capacity(composition.members.len());
        for member in &composition.members {
            let result = self.invoke_member(member, current.clone(), ctx).await?;
            if let (Value::Object(base), Value::Object(additions)) = (&mut current, &result) {
                base.extend(additions.clone());
            } else {
                current = result.clone();
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn invoke_with_policy(
        &self,
        member: &str,
        params: Value,
        ctx: &ExecutionContext,
        policy: ErrorPolicy,
    ) -> Result<Option<Value>, RegistryError> {
        match policy {
            ErrorPolicy::FailFast => self.invoke_member(member, params, ctx).await.map(Some),
            ErrorPolicy::Continue => match self.invoke_member(member, params, ctx).await {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!(member = %member, error = %e, "sequential member failed, continuing per error policy");
                    Ok(None)
                }
            },
            ErrorPolicy::Retry { max_attempts } => {
                let mut last_err = None;
                for attempt in 0..max_attempts.max(1) {
                    match self.invoke_member(member, params.clone(), ctx).await {
                        Ok(value) => return Ok(Some(value)),
                        Err(e) => {
                            warn!(member = %member, attempt, error = %e, "retrying failing member");
                            last_err = Some(e);
                        }
                    }
                }
                Err(last_err.expect("max_attempts.max(1) guarantees at least one attempt"))
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
