use crate::models::Token;

/// Configuration for negative-cycle detection
#[derive(Debug, Clone, Default)]
pub struct DetectorConfig {
    /// Cycles are emitted only when their compounded return exceeds `1 + epsilon`.
    pub min_profit_epsilon: f64,
}

/// A profitable closed walk through the rate graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageCycle {
    /// Tokens in trading order. The first token is not repeated at the end;
    /// the walk implicitly closes back to it.
    pub path: Vec<Token>,
    /// `rates[i]` is the rate of `path[i] -> path[(i + 1) % len]`.
    pub rates: Vec<f64>,
    /// Product of all leg rates.
    pub compounded_return: f64,
}

impl ArbitrageCycle {
    /// Path with the closing token appended, e.g. `[X, Y, Z, X]`.
    pub fn closed_path(&self) -> Vec<Token> {
        let mut path = self.path.clone();
        if let Some(first) = self.path.first() {
            path.push(first.clone());
        }
        path
    }

    pub fn profit_pct(&self) -> f64 {
        (self.compounded_return - 1.0) * 100.0
    }
}
