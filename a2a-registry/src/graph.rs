use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Detects a cycle in a directed graph given as `node -> outgoing edges`, using the standard
/// white/grey/black DFS coloring: white is unvisited, grey is on the current recursion stack,
/// black is fully explored. A grey node reached again means a back edge, i.e. a cycle.
///
/// Returns the node at which the cycle was detected, or `None` if the graph is acyclic.
pub fn find_cycle(edges: &HashMap<String, Vec<String>>) -> Option<String> {
    let mut color: HashMap<&str, Color> = edges.keys().map(|k| (k.as_str(), Color::White)).collect();

    fn visit<'a>(node: &'a str, edges: &'a HashMap<String, Vec<String>>, color: &mut HashMap<&'a str, Color>) -> Option<String> {
        color.insert(node, Color::Grey);
        if let Some(neighbors) = edges.get(node) {
            for next in neighbors {
                match color.get(next.as_str()).copied() {
                    Some(Color::Grey) => return Some(next.clone()),
                    Some(Color::White) | None => {
                        if let Some(cycle_at) = visit(next, edges, color) {
                            return Some(cycle_at);
                        }
                    }
                    Some(Color::Black) => {}
                }
            }
        }
        color.insert(node, Color::Black);
        None
    }

    let nodes: Vec<String> = edges.keys().cloned().collect();
    for node in &nodes {
        if color.get(node.as_str()).copied() == Some(Color::White) {
            if let Some(cycle_at) = visit(node, edges, &mut color) {
                return Some(cycle_at);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(pairs: &[(&str, &str)]) -> HashMap<String, Vec<String>> {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in pairs {
            edges.entry(from.to_string()).or_default().push(to.to_string());
            edges.entry(to.to_string()).or_default();
        }
        edges
    }

    #[test]
    fn acyclic_chain_has_no_cycle() {
        let g = graph(&[("a", "b"), ("b", "c")]);
        assert!(find_cycle(&g).is_none());
    }

    #[test]
    fn direct_self_loop_is_a_cycle() {
        let g = graph(&[("a", "a")]);
        assert!(find_cycle(&g).is_some());
    }

    #[test]
    fn transitive_cycle_detected() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert!(find_cycle(&g).is_some());
    }

    #[test]
    fn diamond_shape_is_not_a_cycle() {
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        assert!(find_cycle(&g).is_none());
    }

    proptest::proptest! {
        /// Edges only ever pointing from a lower-numbered node to a higher-numbered one can never
        /// form a cycle, whatever the exact edge set — a DAG-by-construction sanity check against
        /// false positives.
        #[test]
        fn edges_only_increasing_never_form_a_cycle(
            pairs in proptest::collection::vec((0u8..10, 0u8..10), 0..30)
        ) {
            let increasing: Vec<(String, String)> = pairs
                .into_iter()
                .filter(|(a, b)| a < b)
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect();
            let refs: Vec<(&str, &str)> = increasing.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
            let g = graph(&refs);
            proptest::prop_assert!(find_cycle(&g).is_none());
        }

        /// Closing an otherwise-increasing chain with one back edge always reintroduces a cycle.
        #[test]
        fn closing_a_chain_with_a_back_edge_is_always_a_cycle(len in 2u8..8) {
            let mut pairs: Vec<(String, String)> = (0..len - 1).map(|i| (i.to_string(), (i + 1).to_string())).collect();
            pairs.push(((len - 1).to_string(), "0".to_string()));
            let refs: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
            let g = graph(&refs);
            proptest::prop_assert!(find_cycle(&g).is_some());
        }
    }
}
