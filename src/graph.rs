//! Shared exchange-rate graph.
//!
//! Pool tasks write into it through [`ExchangeRateGraph::upsert_pool_rates`];
//! the detector reads a [`GraphSnapshot`] copied out under a short read lock.

use crate::dex::calc::pool_rates;
use crate::errors::Result;
use crate::models::{Edge, Token};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Point-in-time copy of the graph, safe to iterate without holding the lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub vertices: Vec<Token>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// A cycle needs at least two tokens and two edges.
    pub fn has_minimum_data(&self) -> bool {
        self.vertex_count() >= 2 && self.edge_count() >= 2
    }
}

#[derive(Debug, Default)]
struct GraphInner {
    vertices: Vec<Token>,
    edges: Vec<Edge>,
    /// (from, to) -> position in `edges`
    edge_index: HashMap<(Token, Token), usize>,
}

impl GraphInner {
    fn add_vertex(&mut self, token: &str) -> bool {
        if self.vertices.iter().any(|v| v == token) {
            return false;
        }
        self.vertices.push(token.to_string());
        true
    }

    /// Replace the edge for this direction, or append it if new.
    fn put_edge(&mut self, edge: Edge) {
        let key = (edge.from.clone(), edge.to.clone());
        match self.edge_index.get(&key) {
            Some(&i) => self.edges[i] = edge,
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }
}

/// Concurrency-safe directed graph of token exchange rates.
///
/// Edges are keyed by `(from, to)`: a later update for the same pair
/// supersedes the earlier one instead of accumulating beside it.
#[derive(Debug, Default)]
pub struct ExchangeRateGraph {
    inner: RwLock<GraphInner>,
}

impl ExchangeRateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute both directed rates for one pool and write them atomically.
    ///
    /// Rates are computed before the lock is taken; an invalid rate leaves the
    /// graph untouched and is returned as `InvalidRate` for the caller to log.
    pub async fn upsert_pool_rates(
        &self,
        token_a: &str,
        token_b: &str,
        reserve_a: u64,
        reserve_b: u64,
        fee_rate: f64,
    ) -> Result<(f64, f64)> {
        let (rate_ab, rate_ba) = pool_rates(token_a, token_b, reserve_a, reserve_b, fee_rate)?;

        let mut inner = self.inner.write().await;
        for token in [token_a, token_b] {
            if inner.add_vertex(token) {
                debug!(token, "[GRAPH] added vertex");
            }
        }
        inner.put_edge(Edge::new(token_a, token_b, rate_ab));
        inner.put_edge(Edge::new(token_b, token_a, rate_ba));
        drop(inner);

        debug!(
            "[GRAPH] 1 {token_a} = {rate_ab:.12} {token_b}, 1 {token_b} = {rate_ba:.12} {token_a}"
        );
        Ok((rate_ab, rate_ba))
    }

    pub async fn snapshot(&self) -> GraphSnapshot {
        let inner = self.inner.read().await;
        GraphSnapshot {
            vertices: inner.vertices.clone(),
            edges: inner.edges.clone(),
        }
    }
}
