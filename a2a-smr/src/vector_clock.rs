use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};

/// A logical clock over a set of nodes, used by the vector-clock conflict resolution strategy to
/// order operations that consensus delivered concurrently.
#[derive(Debug, Clone, Serialize)]
pub struct VectorClock<T>
where
    T: Clone + Eq + std::hash::Hash + Serialize,
{
    clocks: HashMap<T, u64>,
}

impl<T> VectorClock<T>
where
    T: Clone + Eq + std::hash::Hash + Serialize,
{
    pub fn new() -> Self {
        Self { clocks: HashMap::new() }
    }

    pub fn increment(&mut self, node: T) {
        let current = self.clocks.get(&node).unwrap_or(&0);
        self.clocks.insert(node, current + 1);
    }

    pub fn get(&self, node: &T) -> u64 {
        self.clocks.get(node).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &VectorClock<T>) {
        for (node, clock) in &other.clocks {
            let current = self.clocks.get(node).unwrap_or(&0);
            self.clocks.insert(node.clone(), (*current).max(*clock));
        }
    }

    /// `self` happens-before `other`: no entry of `self` exceeds the matching entry of `other`,
    /// and at least one is strictly less (including entries `other` has that `self` lacks).
    pub fn happens_before(&self, other: &VectorClock<T>) -> bool {
        let mut strictly_less = false;

        for (node, our_clock) in &self.clocks {
            let their_clock = other.clocks.get(node).unwrap_or(&0);
            if our_clock > their_clock {
                return false;
            }
            if our_clock < their_clock {
                strictly_less = true;
            }
        }
        for (node, their_clock) in &other.clocks {
            if !self.clocks.contains_key(node) && *their_clock > 0 {
                strictly_less = true;
            }
        }
        strictly_less
    }

    pub fn concurrent(&self, other: &VectorClock<T>) -> bool {
        !self.happens_before(other) && !other.happens_before(self)
    }

    pub fn equals(&self, other: &VectorClock<T>) -> bool {
        let mut all_nodes = HashSet::new();
        all_nodes.extend(self.clocks.keys());
        all_nodes.extend(other.clocks.keys());
        all_nodes.into_iter().all(|node| self.clocks.get(node).unwrap_or(&0) == other.clocks.get(node).unwrap_or(&0))
    }

    pub fn update_on_receive(&mut self, sender: T, received_clock: &VectorClock<T>) {
        self.merge(received_clock);
        self.increment(sender);
    }

    pub fn nodes(&self) -> Vec<&T> {
        self.clocks.keys().collect()
    }

    pub fn logical_time(&self) -> u64 {
        self.clocks.values().sum()
    }

    pub fn snapshot(&self) -> VectorClock<T> {
        self.clone()
    }

    pub fn reset(&mut self) {
        self.clocks.clear();
    }

    pub fn remove_node(&mut self, node: &T) -> Option<u64> {
        self.clocks.remove(node)
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.clocks.len()
    }

    pub fn max_value(&self) -> u64 {
        self.clocks.values().copied().max().unwrap_or(0)
    }

    pub fn compare(&self, other: &VectorClock<T>) -> VectorClockOrdering {
        if self.equals(other) {
            VectorClockOrdering::Equal
        } else if self.happens_before(other) {
            VectorClockOrdering::Before
        } else if other.happens_before(self) {
            VectorClockOrdering::After
        } else {
            VectorClockOrdering::Concurrent
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorClockOrdering {
    Before,
    After,
    Equal,
    Concurrent,
}

impl<T> Default for VectorClock<T>
where
    T: Clone + Eq + std::hash::Hash + Serialize,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Display for VectorClock<T>
where
    T: std::fmt::Display + Clone + Eq + std::hash::Hash + Serialize,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for (node, clock) in &self.clocks {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", node, clock)?;
            first = false;
        }
        write!(f, "}}")
    }
}

// Manual impl: deriving Deserialize directly would require `T: Deserialize` to also satisfy
// `Serialize` in the derived bound, which conflicts with how serde generates the HashMap impl.
impl<'de, T> Deserialize<'de> for VectorClock<T>
where
    T: Clone + Eq + std::hash::Hash + Serialize + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let clocks = HashMap::<T, u64>::deserialize(deserializer)?;
        Ok(VectorClock { clocks })
    }
}
