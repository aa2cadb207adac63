#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Latency,
    ErrorRate,
    Throughput,
    ResourceUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Contains,
    Matches,
}

/// A snapshot of current metric values a [`Condition`] is evaluated against. Numeric metrics
/// cover the four well-known ones; `custom` carries anything strategy-specific that needs
/// `contains`/`matches` string comparison instead.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub latency_ms: f64,
    pub error_rate: f64,
    pub throughput: f64,
    pub resource_usage: f64,
    pub custom: std::collections::HashMap<String, String>,
}

impl MetricSnapshot {
    fn numeric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Latency => self.latency_ms,
            Metric::ErrorRate => self.error_rate,
            Metric::Throughput => self.throughput,
            Metric::ResourceUsage => self.resource_usage,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    Numeric { metric: Metric, operator: Operator, threshold: f64 },
    Custom { key: String, operator: Operator, pattern: String },
}

impl Condition {
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> bool {
        match self {
            Condition::Numeric { metric, operator, threshold } => {
                let value = snapshot.numeric(*metric);
                match operator {
                    Operator::Gt => value > *threshold,
                    Operator::Lt => value < *threshold,
                    Operator::Eq => (value - threshold).abs() < f64::EPSILON,
                    Operator::Gte => value >= *threshold,
                    Operator::Lte => value <= *threshold,
                    Operator::Contains | Operator::Matches => false,
                }
            }
            Condition::Custom { key, operator, pattern } => {
                let Some(value) = snapshot.custom.get(key) else {
                    return false;
                };
                match operator {
                    Operator::Contains => value.contains(pattern.as_str()),
                    Operator::Matches => value == pattern,
                    Operator::Eq => value == pattern,
                    _ => false,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    IntelligentCaching,
    CircuitBreaker,
    LoadBalancing,
    ParallelExecution,
    BatchProcessing,
}

#[derive(Debug, Clone)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub priority: f64,
    pub success_rate: f64,
    pub average_improvement: f64,
    pub conditions: Vec<Condition>,
}

impl Strategy {
    fn score(&self) -> f64 {
        self.priority * self.success_rate * self.average_improvement
    }

    fn applicable(&self, snapshot: &MetricSnapshot) -> bool {
        self.conditions.iter().all(|c| c.evaluate(snapshot))
    }
}

/// Picks the single highest-scoring strategy whose conditions all hold against `snapshot`.
/// Strategies that don't apply are skipped outright; once one is selected, no others are tried.
pub fn select<'a>(strategies: &'a [Strategy], snapshot: &MetricSnapshot) -> Option<&'a Strategy> {
    strategies
        .iter()
        .filter(|s| s.applicable(snapshot))
        .max_by(|a, b| a.score().partial_cmp(&b.score()).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(kind: StrategyKind, priority: f64, conditions: Vec<Condition>) -> Strategy {
        Strategy { kind, priority, success_rate: 1.0, average_improvement: 1.0, conditions }
    }

    #[test]
    fn selects_highest_scoring_applicable_strategy() {
        let snapshot = MetricSnapshot { latency_ms: 500.0, ..Default::default() };
        let strategies = vec![
            strategy(StrategyKind::LoadBalancing, 1.0, vec![Condition::Numeric { metric: Metric::Latency, operator: Operator::Gt, threshold: 100.0 }]),
            strategy(StrategyKind::IntelligentCaching, 5.0, vec![Condition::Numeric { metric: Metric::Latency, operator: Operator::Gt, threshold: 100.0 }]),
        ];
        let chosen = select(&strategies, &snapshot).unwrap();
        assert_eq!(chosen.kind, StrategyKind::IntelligentCaching);
    }

    #[test]
    fn inapplicable_conditions_are_skipped() {
        let snapshot = MetricSnapshot { latency_ms: 10.0, ..Default::default() };
        let strategies = vec![strategy(
            StrategyKind::CircuitBreaker,
            10.0,
            vec![Condition::Numeric { metric: Metric::Latency, operator: Operator::Gt, threshold: 100.0 }],
        )];
        assert!(select(&strategies, &snapshot).is_none());
    }
}
