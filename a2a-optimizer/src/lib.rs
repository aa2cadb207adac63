//! Per-tool performance tracking and the strategy layer (caching, circuit breaking, load
//! balancing, batching, predictive latency) that reacts to it.

mod batch;
mod cache;
mod circuit_breaker;
mod error;
mod load_balancer;
mod predictive;
mod profile;
mod strategy;
mod thresholds;

pub use batch::BatchProcessor;
pub use cache::{CacheKey, IntelligentCache};
pub use circuit_breaker::{BreakerState, CircuitBreakerRegistry};
pub use error::OptimizerError;
pub use load_balancer::LoadBalancer;
pub use predictive::estimate_latency_ms;
pub use profile::PerformanceProfile;
pub use strategy::{select, Condition, Metric, MetricSnapshot, Operator, Strategy, StrategyKind};
pub use thresholds::AdaptiveThresholds;
