use std::f64::consts::PI;

use crate::profile::PerformanceProfile;

/// Multiplier applied per trust level: less-trusted callers are assumed to run through extra
/// verification overhead on the hot path.
fn trust_multiplier(trust: a2a_core::TrustLevel) -> f64 {
    use a2a_core::TrustLevel::*;
    match trust {
        Untrusted => 1.5,
        Basic => 1.2,
        Verified => 1.0,
        Trusted => 0.9,
        Privileged => 0.8,
    }
}

/// Predicts a tool call's latency from its running profile, current load, and the time of day,
/// per `estimatedLatency = avgLatency · (1 + loadFactor·loadImpact) ·
/// (1 + log(|params|+1)/10 · sizeImpact) · trustMult · (1 + sin(hour/24·2π)·timeOfDayVariance)`.
pub fn estimate_latency_ms(
    profile: &PerformanceProfile,
    param_size: usize,
    hour_of_day: f64,
    load_impact: f64,
    size_impact: f64,
    time_of_day_variance: f64,
) -> f64 {
    let load_term = 1.0 + profile.load_factor * load_impact;
    let size_term = 1.0 + ((param_size as f64 + 1.0).ln() / 10.0) * size_impact;
    let trust_term = trust_multiplier(profile.trust_level);
    let time_term = 1.0 + (hour_of_day / 24.0 * 2.0 * PI).sin() * time_of_day_variance;

    profile.avg_latency_ms * load_term * size_term * trust_term * time_term
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_core::TrustLevel;

    #[test]
    fn zero_load_and_zero_variance_reduces_to_latency_times_trust() {
        let mut profile = PerformanceProfile::new("t", TrustLevel::Verified);
        profile.record(100.0, true, 0.0);
        let estimate = estimate_latency_ms(&profile, 0, 0.0, 0.0, 0.0, 0.0);
        assert!((estimate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn higher_load_factor_increases_estimate() {
        let mut profile = PerformanceProfile::new("t", TrustLevel::Verified);
        profile.record(100.0, true, 0.0);
        profile.set_load_factor(1.0);
        let low = estimate_latency_ms(&profile, 0, 0.0, 0.5, 0.0, 0.0);
        profile.set_load_factor(2.0);
        let high = estimate_latency_ms(&profile, 0, 0.0, 0.5, 0.0, 0.0);
        assert!(high > low);
    }

    #[test]
    fn untrusted_caller_predicted_slower_than_privileged() {
        let mut untrusted = PerformanceProfile::new("t", TrustLevel::Untrusted);
        untrusted.record(100.0, true, 0.0);
        let mut privileged = PerformanceProfile::new("t", TrustLevel::Privileged);
        privileged.record(100.0, true, 0.0);
        assert!(estimate_latency_ms(&untrusted, 0, 0.0, 0.0, 0.0, 0.0) > estimate_latency_ms(&privileged, 0, 0.0, 0.0, 0.0, 0.0));
    }
}
