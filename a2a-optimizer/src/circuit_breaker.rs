use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Per-tool circuit breakers: `closed -> open` after `failure_threshold` consecutive failures,
/// `open -> half-open` after `reset_timeout`, and the first result from half-open decides
/// whether it closes again or reopens.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Breaker>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::with_config(5, Duration::from_secs(30))
    }

    pub fn with_config(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self { breakers: DashMap::new(), failure_threshold, reset_timeout }
    }

    fn breaker_mut(&self, tool_id: &str) -> dashmap::mapref::one::RefMut<'_, String, Breaker> {
        self.breakers
            .entry(tool_id.to_string())
            .or_insert(Breaker { state: BreakerState::Closed, consecutive_failures: 0, opened_at: None })
    }

    /// Call before invoking `tool_id`. Transitions `open -> half-open` once `reset_timeout` has
    /// elapsed, so the caller sees a half-open tool as allowed (it's the trial call).
    pub fn allow(&self, tool_id: &str) -> bool {
        let mut breaker = self.breaker_mut(tool_id);
        if breaker.state == BreakerState::Open {
            if breaker.opened_at.is_some_and(|t| t.elapsed() >= self.reset_timeout) {
                breaker.state = BreakerState::HalfOpen;
                info!(tool = tool_id, "circuit half-open, allowing trial call");
            } else {
                return false;
            }
        }
        true
    }

    pub fn record_success(&self, tool_id: &str) {
        let mut breaker = self.breaker_mut(tool_id);
        if breaker.state == BreakerState::HalfOpen {
            info!(tool = tool_id, "circuit closed after successful trial call");
        }
        breaker.state = BreakerState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    pub fn record_failure(&self, tool_id: &str) {
        let mut breaker = self.breaker_mut(tool_id);
        if breaker.state == BreakerState::HalfOpen {
            warn!(tool = tool_id, "trial call failed, reopening circuit");
            breaker.state = BreakerState::Open;
            breaker.opened_at = Some(Instant::now());
            return;
        }
        breaker.consecutive_failures += 1;
        if breaker.consecutive_failures >= self.failure_threshold {
            warn!(tool = tool_id, failures = breaker.consecutive_failures, "circuit opened");
            breaker.state = BreakerState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self, tool_id: &str) -> BreakerState {
        self.breaker_mut(tool_id).state
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
