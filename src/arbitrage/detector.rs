//! Bellman-Ford negative-cycle search over a graph snapshot.
//!
//! Edge weights are `-ln(rate)`, so a closed walk whose rates multiply to
//! more than 1.0 has a negative weight sum. The search runs single-source
//! relaxation from every vertex in turn, re-running with legs of found cycles
//! disabled. Graphs here have tens of vertices, so the O(V²·E²) worst case
//! is fine.

use super::types::{ArbitrageCycle, DetectorConfig};
use crate::graph::GraphSnapshot;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

/// Read-only detector; never mutates the snapshot it is given.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageDetector {
    config: DetectorConfig,
}

/// Snapshot re-expressed over dense vertex indices.
struct IndexedGraph<'a> {
    tokens: Vec<&'a str>,
    /// (from, to, weight)
    edges: Vec<(usize, usize, f64)>,
    /// (from, to) -> literal rate
    rates: HashMap<(usize, usize), f64>,
    /// (from, to) -> position in `edges`
    edge_ids: HashMap<(usize, usize), usize>,
}

impl<'a> IndexedGraph<'a> {
    fn build(snapshot: &'a GraphSnapshot) -> Self {
        let mut tokens: Vec<&str> = Vec::with_capacity(snapshot.vertices.len());
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut intern = |token: &'a str, tokens: &mut Vec<&'a str>| {
            *index.entry(token).or_insert_with(|| {
                tokens.push(token);
                tokens.len() - 1
            })
        };

        for v in &snapshot.vertices {
            intern(v.as_str(), &mut tokens);
        }

        let mut edges = Vec::with_capacity(snapshot.edges.len());
        let mut rates = HashMap::with_capacity(snapshot.edges.len());
        let mut edge_ids = HashMap::with_capacity(snapshot.edges.len());
        for e in &snapshot.edges {
            let u = intern(e.from.as_str(), &mut tokens);
            let v = intern(e.to.as_str(), &mut tokens);
            edge_ids.insert((u, v), edges.len());
            edges.push((u, v, e.weight));
            rates.insert((u, v), e.rate);
        }

        Self {
            tokens,
            edges,
            rates,
            edge_ids,
        }
    }
}

impl ArbitrageDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Return every distinct profitable cycle reachable from some vertex.
    ///
    /// A single Bellman-Ford run only surfaces the cycles its predecessor
    /// walks fall into, which hides weaker cycles sharing a token or leg with
    /// a stronger one. Each source therefore re-runs with one leg of every
    /// cycle found so far disabled, breadth-first, up to one run per edge.
    ///
    /// Cycles are rotated to start at their lexicographically smallest token
    /// and de-duplicated, so the same cycle found from several sources or
    /// runs is reported once.
    pub fn detect(&self, snapshot: &GraphSnapshot) -> Vec<ArbitrageCycle> {
        if !snapshot.has_minimum_data() {
            return Vec::new();
        }

        let graph = IndexedGraph::build(snapshot);
        let n = graph.tokens.len();
        let m = graph.edges.len();
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut found = Vec::new();
        let mut runs = 0usize;

        for source in 0..n {
            let mut queue: VecDeque<Vec<bool>> = VecDeque::from([vec![false; m]]);
            let mut tried: HashSet<Vec<bool>> = HashSet::new();
            let mut budget = m.max(1);

            while let Some(disabled) = queue.pop_front() {
                if budget == 0 {
                    break;
                }
                budget -= 1;
                runs += 1;

                for cycle in negative_cycles_from(&graph, source, &disabled) {
                    for leg in legs(&cycle) {
                        let Some(&id) = graph.edge_ids.get(&leg) else {
                            continue;
                        };
                        let mut next = disabled.clone();
                        next[id] = true;
                        if tried.insert(next.clone()) {
                            queue.push_back(next);
                        }
                    }
                    if !seen.insert(cycle.clone()) {
                        continue;
                    }
                    if let Some(opportunity) = self.evaluate(&graph, &cycle) {
                        found.push(opportunity);
                    }
                }
            }
        }

        debug!(
            vertices = n,
            edges = m,
            runs,
            candidates = seen.len(),
            profitable = found.len(),
            "[DETECT] search finished"
        );
        found
    }

    /// Recompute the cycle's literal rates from the edges and keep it only if
    /// the compounded return clears `1 + epsilon`.
    fn evaluate(&self, graph: &IndexedGraph<'_>, cycle: &[usize]) -> Option<ArbitrageCycle> {
        let mut rates = Vec::with_capacity(cycle.len());
        for leg in legs(cycle) {
            rates.push(*graph.rates.get(&leg)?);
        }
        let compounded_return: f64 = rates.iter().product();
        let path: Vec<String> = cycle.iter().map(|&i| graph.tokens[i].to_string()).collect();

        trace!(?path, ?rates, compounded_return, "[DETECT] analyzing cycle");
        if compounded_return <= 1.0 + self.config.min_profit_epsilon {
            return None;
        }
        Some(ArbitrageCycle {
            path,
            rates,
            compounded_return,
        })
    }
}

/// Single-source Bellman-Ford over the enabled edges: at most `|V| - 1`
/// passes, stopping early once a pass changes nothing. One extra pass then
/// relaxes whatever still improves; each vertex it touches sits on or
/// downstream of a negative cycle, which is extracted in canonical form.
fn negative_cycles_from(
    graph: &IndexedGraph<'_>,
    source: usize,
    disabled: &[bool],
) -> Vec<Vec<usize>> {
    let n = graph.tokens.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut pred = vec![None; n];
    dist[source] = 0.0;

    let relax = |dist: &mut [f64], pred: &mut [Option<usize>]| {
        let mut touched = Vec::new();
        for (id, &(u, v, w)) in graph.edges.iter().enumerate() {
            if disabled[id] {
                continue;
            }
            if dist[u].is_finite() && dist[u] + w < dist[v] {
                dist[v] = dist[u] + w;
                pred[v] = Some(u);
                touched.push(v);
            }
        }
        touched
    };

    for _ in 1..n {
        if relax(&mut dist, &mut pred).is_empty() {
            return Vec::new();
        }
    }

    let mut cycles: Vec<Vec<usize>> = Vec::new();
    for v in relax(&mut dist, &mut pred) {
        let Some(cycle) = extract_cycle(&pred, v, n) else {
            continue;
        };
        let cycle = canonical_rotation(cycle, &graph.tokens);
        if !cycles.contains(&cycle) {
            cycles.push(cycle);
        }
    }
    cycles
}

/// Step back `n` predecessors from `start` to land on a cycle, then follow
/// predecessors once around it. Returned in forward trading order.
///
/// Every walk is bounded by the vertex count, so a chain that ends at the
/// source yields `None` instead of looping.
fn extract_cycle(pred: &[Option<usize>], start: usize, n: usize) -> Option<Vec<usize>> {
    let mut on_cycle = start;
    for _ in 0..n {
        on_cycle = pred[on_cycle]?;
    }

    let mut cycle = vec![on_cycle];
    let mut current = pred[on_cycle]?;
    while current != on_cycle {
        if cycle.len() > n {
            return None;
        }
        cycle.push(current);
        current = pred[current]?;
    }
    cycle.reverse();
    Some(cycle)
}

/// Consecutive `(from, to)` pairs of a cycle, including the closing leg.
fn legs(cycle: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let len = cycle.len();
    (0..len).map(move |i| (cycle[i], cycle[(i + 1) % len]))
}

/// Rotate so the lexicographically smallest token leads.
fn canonical_rotation(mut cycle: Vec<usize>, tokens: &[&str]) -> Vec<usize> {
    if let Some(start) = (0..cycle.len()).min_by_key(|&i| tokens[cycle[i]]) {
        cycle.rotate_left(start);
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Edge;
    use proptest::prelude::*;

    fn snapshot(edges: &[(&str, &str, f64)]) -> GraphSnapshot {
        let mut vertices: Vec<String> = Vec::new();
        for (a, b, _) in edges {
            for t in [a, b] {
                if !vertices.iter().any(|v| v == t) {
                    vertices.push(t.to_string());
                }
            }
        }
        GraphSnapshot {
            vertices,
            edges: edges.iter().map(|&(a, b, r)| Edge::new(a, b, r)).collect(),
        }
    }

    fn detector() -> ArbitrageDetector {
        ArbitrageDetector::new(DetectorConfig::default())
    }

    #[test]
    fn finds_profitable_triangle() {
        let snap = snapshot(&[("X", "Y", 2.0), ("Y", "Z", 2.0), ("Z", "X", 0.30)]);
        let cycles = detector().detect(&snap);

        assert_eq!(cycles.len(), 1);
        let c = &cycles[0];
        assert_eq!(c.path, vec!["X", "Y", "Z"]);
        assert_eq!(c.rates, vec![2.0, 2.0, 0.30]);
        assert!((c.compounded_return - 1.2).abs() < 1e-12);
        assert!((c.profit_pct() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn unprofitable_triangle_yields_nothing() {
        let snap = snapshot(&[("X", "Y", 2.0), ("Y", "Z", 2.0), ("Z", "X", 0.24)]);
        assert!(detector().detect(&snap).is_empty());
    }

    #[test]
    fn single_vertex_short_circuits() {
        let snap = GraphSnapshot {
            vertices: vec!["SOL".into()],
            edges: Vec::new(),
        };
        assert!(detector().detect(&snap).is_empty());
        assert!(detector().detect(&GraphSnapshot::default()).is_empty());
    }

    #[test]
    fn epsilon_filters_thin_cycles() {
        let snap = snapshot(&[("X", "Y", 2.0), ("Y", "Z", 2.0), ("Z", "X", 0.2525)]);
        assert_eq!(detector().detect(&snap).len(), 1);

        let strict = ArbitrageDetector::new(DetectorConfig {
            min_profit_epsilon: 0.05,
        });
        assert!(strict.detect(&snap).is_empty());
    }

    #[test]
    fn reverse_legs_and_rotation_do_not_duplicate() {
        // Full pool pairs: forward triangle profitable, reverse is not.
        let snap = snapshot(&[
            ("USDC", "SOL", 0.0101),
            ("SOL", "USDC", 98.0),
            ("SOL", "GRASS", 50.0),
            ("GRASS", "SOL", 0.019),
            ("GRASS", "USDC", 2.1),
            ("USDC", "GRASS", 0.45),
        ]);
        let cycles = detector().detect(&snap);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].path, vec!["GRASS", "USDC", "SOL"]);
        assert!(cycles[0].compounded_return > 1.0);
    }

    #[test]
    fn unreachable_source_is_not_an_error() {
        // "ISLAND" has no outgoing edges at all.
        let mut snap = snapshot(&[("X", "Y", 2.0), ("Y", "Z", 2.0), ("Z", "X", 0.30)]);
        snap.vertices.insert(0, "ISLAND".into());
        let cycles = detector().detect(&snap);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn broken_predecessor_chain_is_bounded() {
        let chain = vec![None, Some(0), Some(1)];
        assert_eq!(extract_cycle(&chain, 2, 3), None);

        let looping = vec![Some(2), Some(0), Some(1)];
        assert_eq!(extract_cycle(&looping, 2, 3), Some(vec![0, 1, 2]));

        // Vertex 3 hangs off the 2 -> 0 -> 1 -> 2 cycle.
        let tail = vec![Some(2), Some(0), Some(1), Some(0)];
        assert_eq!(extract_cycle(&tail, 3, 4), Some(vec![1, 2, 0]));
    }

    fn paths(cycles: &[ArbitrageCycle]) -> Vec<Vec<String>> {
        let mut paths: Vec<Vec<String>> = cycles.iter().map(|c| c.path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn weaker_cycle_through_shared_token_is_reported() {
        let snap = snapshot(&[
            ("X", "Y", 1.1),
            ("Y", "X", 1.0),
            ("X", "Z", 1.5),
            ("Z", "X", 1.0),
        ]);
        let cycles = detector().detect(&snap);
        assert_eq!(
            paths(&cycles),
            vec![vec!["X".to_string(), "Y".into()], vec!["X".to_string(), "Z".into()]]
        );
    }

    #[test]
    fn weaker_cycle_through_shared_leg_is_reported() {
        let snap = snapshot(&[
            ("A", "B", 2.0),
            ("B", "C", 2.0),
            ("C", "A", 0.3),
            ("B", "D", 2.0),
            ("D", "A", 0.26),
        ]);
        let cycles = detector().detect(&snap);
        assert_eq!(
            paths(&cycles),
            vec![
                vec!["A".to_string(), "B".into(), "C".into()],
                vec!["A".to_string(), "B".into(), "D".into()],
            ]
        );
        let abd = cycles.iter().find(|c| c.path[2] == "D").unwrap();
        assert!((abd.compounded_return - 1.04).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn planted_cycle_is_found(
            legs in proptest::collection::vec(0.5f64..2.0, 3..7),
            boost in 0.01f64..0.5,
        ) {
            let k = legs.len();
            let tokens: Vec<String> = (0..k).map(|i| format!("T{i}")).collect();
            // Scale the closing leg so the product is exactly 1 + boost.
            let product: f64 = legs[..k - 1].iter().product();
            let mut rates = legs.clone();
            rates[k - 1] = (1.0 + boost) / product;

            let mut edges = Vec::new();
            for i in 0..k {
                let (a, b) = (tokens[i].as_str(), tokens[(i + 1) % k].as_str());
                edges.push((a, b, rates[i]));
                edges.push((b, a, 0.5 / rates[i]));
            }
            let cycles = detector().detect(&snapshot(&edges));

            prop_assert_eq!(cycles.len(), 1);
            prop_assert_eq!(&cycles[0].path, &tokens);
            prop_assert!((cycles[0].compounded_return - (1.0 + boost)).abs() < 1e-9);
        }

        #[test]
        fn two_planted_cycles_sharing_a_token_are_both_found(
            first in proptest::collection::vec(0.5f64..2.0, 3),
            second in proptest::collection::vec(0.5f64..2.0, 3),
            boosts in (0.01f64..0.5, 0.01f64..0.5),
        ) {
            // T0 -> T1 -> T2 -> T0 and T0 -> T3 -> T4 -> T0.
            let mut edges: Vec<(String, String, f64)> = Vec::new();
            for (ring, legs, boost) in [([0, 1, 2], &first, boosts.0), ([0, 3, 4], &second, boosts.1)] {
                let mut rates = legs.clone();
                rates[2] = (1.0 + boost) / (legs[0] * legs[1]);
                for i in 0..3 {
                    let (a, b) = (format!("T{}", ring[i]), format!("T{}", ring[(i + 1) % 3]));
                    edges.push((b.clone(), a.clone(), 0.5 / rates[i]));
                    edges.push((a, b, rates[i]));
                }
            }
            let borrowed: Vec<(&str, &str, f64)> =
                edges.iter().map(|(a, b, r)| (a.as_str(), b.as_str(), *r)).collect();
            let cycles = detector().detect(&snapshot(&borrowed));

            prop_assert_eq!(
                paths(&cycles),
                vec![
                    vec!["T0".to_string(), "T1".into(), "T2".into()],
                    vec!["T0".to_string(), "T3".into(), "T4".into()],
                ]
            );
        }

        #[test]
        fn consistent_prices_have_no_cycle(
            prices in proptest::collection::vec(0.001f64..1000.0, 2..8),
            fee in 0.001f64..0.05,
        ) {
            let n = prices.len();
            let tokens: Vec<String> = (0..n).map(|i| format!("T{i}")).collect();
            let mut edges = Vec::new();
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        edges.push((tokens[i].as_str(), tokens[j].as_str(), prices[i] / prices[j] * (1.0 - fee)));
                    }
                }
            }
            prop_assert!(detector().detect(&snapshot(&edges)).is_empty());
        }
    }
}
