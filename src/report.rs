//! Formatting and emission of detected opportunities.

use crate::arbitrage::ArbitrageCycle;
use crate::models::Token;
use serde::Serialize;
use std::fmt;

/// Human-readable view of one cycle, ready for logs or alerting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunityRecord {
    /// Closed token path, first token repeated at the end.
    pub path: Vec<Token>,
    /// One rate per leg.
    pub rates: Vec<f64>,
    pub profit_pct: f64,
}

impl From<&ArbitrageCycle> for OpportunityRecord {
    fn from(cycle: &ArbitrageCycle) -> Self {
        Self {
            path: cycle.closed_path(),
            rates: cycle.rates.clone(),
            profit_pct: cycle.profit_pct(),
        }
    }
}

impl fmt::Display for OpportunityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rates: Vec<String> = self.rates.iter().map(|r| format!("{r:.6}")).collect();
        write!(
            f,
            "{} | rates [{}] | profit {:.2}%",
            self.path.join(" -> "),
            rates.join(", "),
            self.profit_pct
        )
    }
}

/// Sink for detected cycles. The scheduler calls `report` once per cycle.
pub trait OpportunityReporter: Send + Sync {
    fn report(&self, cycle: &ArbitrageCycle);
}

/// Logs each opportunity through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl OpportunityReporter for TracingReporter {
    fn report(&self, cycle: &ArbitrageCycle) {
        let record = OpportunityRecord::from(cycle);
        tracing::info!(
            profit_pct = record.profit_pct,
            legs = record.rates.len(),
            "[OPP] {record}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> ArbitrageCycle {
        ArbitrageCycle {
            path: vec!["X".into(), "Y".into(), "Z".into()],
            rates: vec![2.0, 2.0, 0.3],
            compounded_return: 1.2,
        }
    }

    #[test]
    fn record_closes_path_and_computes_profit() {
        let record = OpportunityRecord::from(&triangle());
        assert_eq!(record.path, vec!["X", "Y", "Z", "X"]);
        assert_eq!(record.rates.len(), 3);
        assert!((record.profit_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn display_format() {
        let record = OpportunityRecord::from(&triangle());
        assert_eq!(
            record.to_string(),
            "X -> Y -> Z -> X | rates [2.000000, 2.000000, 0.300000] | profit 20.00%"
        );
    }

    #[test]
    fn record_serializes_to_json() {
        let json = serde_json::to_value(OpportunityRecord::from(&triangle())).unwrap();
        assert_eq!(json["path"][3], "X");
        assert_eq!(json["rates"].as_array().map(Vec::len), Some(3));
    }
}
