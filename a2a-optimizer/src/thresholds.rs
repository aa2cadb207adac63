use dashmap::DashMap;

/// Adaptively tracks per-metric thresholds, nudging each one toward an observed target whenever
/// it drifts more than 10% from the current threshold. Bounded below by 1 so a threshold never
/// collapses to (or past) zero.
pub struct AdaptiveThresholds {
    thresholds: DashMap<String, f64>,
    adjustment_factor: f64,
}

impl AdaptiveThresholds {
    pub fn new(adjustment_factor: f64) -> Self {
        Self { thresholds: DashMap::new(), adjustment_factor }
    }

    pub fn set(&self, metric: impl Into<String>, threshold: f64) {
        self.thresholds.insert(metric.into(), threshold);
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.thresholds.get(metric).map(|v| *v)
    }

    /// Call once per adjustment tick (every 5s in the fabric's default scheduling) with the
    /// current observed value for `metric`. Adjusts the threshold toward `current` if it has
    /// drifted by more than 10%.
    pub fn adjust(&self, metric: &str, current: f64) {
        let mut threshold = self.thresholds.entry(metric.to_string()).or_insert(current.max(1.0));
        if (current - *threshold).abs() > 0.1 * *threshold {
            let adjusted = *threshold + (current - *threshold) * self.adjustment_factor;
            *threshold = adjusted.max(1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_drift_leaves_threshold_unchanged() {
        let thresholds = AdaptiveThresholds::new(0.5);
        thresholds.set("latency", 100.0);
        thresholds.adjust("latency", 105.0);
        assert_eq!(thresholds.get("latency"), Some(100.0));
    }

    #[test]
    fn large_drift_moves_threshold_toward_target() {
        let thresholds = AdaptiveThresholds::new(0.5);
        thresholds.set("latency", 100.0);
        thresholds.adjust("latency", 200.0);
        assert_eq!(thresholds.get("latency"), Some(150.0));
    }

    #[test]
    fn threshold_never_drops_below_one() {
        let thresholds = AdaptiveThresholds::new(1.0);
        thresholds.set("latency", 2.0);
        thresholds.adjust("latency", 0.0);
        assert!(thresholds.get("latency").unwrap() >= 1.0);
    }
}
