use a2a_core::TrustLevel;

const EMA_ALPHA: f64 = 0.1;

/// Tracks a tool's observed performance as an exponential moving average so strategy selection
/// reacts to recent behavior without needing the full history in memory.
#[derive(Debug, Clone)]
pub struct PerformanceProfile {
    pub tool_id: String,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub resource_utilization: f64,
    pub trust_level: TrustLevel,
    pub load_factor: f64,
    pub samples: u64,
}

impl PerformanceProfile {
    pub fn new(tool_id: impl Into<String>, trust_level: TrustLevel) -> Self {
        Self {
            tool_id: tool_id.into(),
            avg_latency_ms: 0.0,
            success_rate: 1.0,
            resource_utilization: 0.0,
            trust_level,
            load_factor: 0.0,
            samples: 0,
        }
    }

    /// Folds one observed invocation into the running averages.
    pub fn record(&mut self, latency_ms: f64, success: bool, resource_utilization: f64) {
        if self.samples == 0 {
            self.avg_latency_ms = latency_ms;
            self.success_rate = if success { 1.0 } else { 0.0 };
            self.resource_utilization = resource_utilization;
        } else {
            self.avg_latency_ms = EMA_ALPHA * latency_ms + (1.0 - EMA_ALPHA) * self.avg_latency_ms;
            let observed = if success { 1.0 } else { 0.0 };
            self.success_rate = EMA_ALPHA * observed + (1.0 - EMA_ALPHA) * self.success_rate;
            self.resource_utilization = EMA_ALPHA * resource_utilization + (1.0 - EMA_ALPHA) * self.resource_utilization;
        }
        self.samples += 1;
    }

    pub fn set_load_factor(&mut self, load_factor: f64) {
        self.load_factor = load_factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_baseline_exactly() {
        let mut profile = PerformanceProfile::new("t", TrustLevel::Basic);
        profile.record(100.0, true, 0.2);
        assert_eq!(profile.avg_latency_ms, 100.0);
        assert_eq!(profile.success_rate, 1.0);
    }

    #[test]
    fn subsequent_samples_ema_toward_new_value() {
        let mut profile = PerformanceProfile::new("t", TrustLevel::Basic);
        profile.record(100.0, true, 0.0);
        profile.record(200.0, true, 0.0);
        assert!((profile.avg_latency_ms - 110.0).abs() < 1e-9);
    }

    #[test]
    fn failure_drags_success_rate_down() {
        let mut profile = PerformanceProfile::new("t", TrustLevel::Basic);
        profile.record(10.0, true, 0.0);
        profile.record(10.0, false, 0.0);
        assert!(profile.success_rate < 1.0);
    }

    proptest::proptest! {
        /// An EMA of values drawn from `[0, 1]` can never drift outside that interval, whatever
        /// the sequence of successes and failures.
        #[test]
        fn success_rate_stays_within_unit_interval(outcomes in proptest::collection::vec(proptest::bool::ANY, 0..50)) {
            let mut profile = PerformanceProfile::new("t", TrustLevel::Basic);
            for success in outcomes {
                profile.record(10.0, success, 0.0);
                proptest::prop_assert!((0.0..=1.0).contains(&profile.success_rate));
            }
        }
    }
}
