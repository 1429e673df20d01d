//! Shared data structures used throughout the application.

/// Tradable asset identifier: a symbol such as `"SOL"` or a mint address.
pub type Token = String;

/// Static description of one monitored pool, supplied once at subscription time.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMetadata {
    /// On-chain account address of the pool.
    pub address: String,
    pub base_token: Token,
    pub quote_token: Token,
    /// Flat swap fee as a fraction (0.003 = 0.30%).
    pub fee_rate: f64,
}

impl PoolMetadata {
    pub fn name(&self) -> String {
        format!("{}-{}", self.base_token, self.quote_token)
    }
}

/// Directed exchange-rate edge. `rate` is units of `to` per unit of `from`,
/// net of fee; `weight` is `-ln(rate)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: Token,
    pub to: Token,
    pub rate: f64,
    pub weight: f64,
}

impl Edge {
    pub fn new(from: impl Into<Token>, to: impl Into<Token>, rate: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rate,
            weight: -rate.ln(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_negative_log_of_rate() {
        let e = Edge::new("X", "Y", 2.0);
        assert!((e.weight + 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(Edge::new("X", "Y", 1.0).weight, 0.0);
    }

    #[test]
    fn pool_name_joins_sides() {
        let pool = PoolMetadata {
            address: "addr".into(),
            base_token: "USDC".into(),
            quote_token: "SOL".into(),
            fee_rate: 0.003,
        };
        assert_eq!(pool.name(), "USDC-SOL");
    }
}
