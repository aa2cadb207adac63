use a2a_core::AgentId;
use dashmap::DashMap;

/// Walks the `delegated_to` chain starting at `start` and returns `true` if `target` is reached,
/// meaning a new delegation from `target` to `start` would close a cycle.
pub fn creates_cycle(delegations: &DashMap<AgentId, AgentId>, start: AgentId, target: AgentId) -> bool {
    let mut current = start;
    let mut hops = 0usize;
    loop {
        if current == target {
            return true;
        }
        let Some(next) = delegations.get(&current).map(|e| *e.value()) else {
            return false;
        };
        current = next;
        hops += 1;
        if hops > delegations.len() {
            // Defensive: a pre-existing cycle (shouldn't happen if every delegate() call is
            // guarded by this function) would otherwise loop forever.
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_cycle_detected() {
        let delegations = DashMap::new();
        let a = AgentId::new();
        let b = AgentId::new();
        delegations.insert(b, a);
        assert!(creates_cycle(&delegations, b, a));
    }

    #[test]
    fn transitive_cycle_detected() {
        let delegations = DashMap::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let c = AgentId::new();
        delegations.insert(b, c);
        delegations.insert(c, a);
        assert!(creates_cycle(&delegations, b, a));
    }

    #[test]
    fn non_cyclic_chain_allowed() {
        let delegations = DashMap::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let c = AgentId::new();
        delegations.insert(b, c);
        assert!(!creates_cycle(&delegations, a, b));
    }
}
