//! Configuration loader and application settings.

use crate::dex::DEFAULT_FEE_RATE;
use crate::errors::{AppError, Result};
use crate::models::PoolMetadata;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "wss://api.mainnet-beta.solana.com";

/// Raydium USDC-SOL and SOL-GRASS.
pub const DEFAULT_POOLS: &str = "8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj:USDC:SOL,\
                                 2AXXcN6oN9bBT5owwmTH53C7QHUXvhLeu718Kqt8rvY2:SOL:GRASS";

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// WebSocket endpoint of the Solana RPC node.
    pub ws_url: String,
    /// Pools to monitor, one task each.
    pub pools: Vec<PoolMetadata>,
    /// Fee applied to pools that don't carry their own.
    pub default_fee_rate: f64,
    /// Time between detection runs.
    pub detection_interval: Duration,
    /// Cycles must return more than `1 + epsilon` to be reported.
    pub min_profit_epsilon: f64,
    /// Ticks between status heartbeats.
    pub heartbeat_every: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ws_url = lookup("SOLANA_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.into());

        let default_fee_rate: f64 = parse_var(&lookup, "FEE_RATE", DEFAULT_FEE_RATE)?;
        validate_fee(default_fee_rate)?;

        let interval_ms: u64 = parse_var(&lookup, "DETECTION_INTERVAL_MS", 1_000)?;
        if interval_ms == 0 {
            return Err(AppError::Config("DETECTION_INTERVAL_MS must be > 0".into()));
        }

        let min_profit_epsilon: f64 = parse_var(&lookup, "MIN_PROFIT_EPSILON", 0.0)?;
        if !(min_profit_epsilon >= 0.0 && min_profit_epsilon.is_finite()) {
            return Err(AppError::Config(format!(
                "MIN_PROFIT_EPSILON must be a finite value >= 0, got {min_profit_epsilon}"
            )));
        }

        let heartbeat_every: u64 = parse_var(&lookup, "HEARTBEAT_EVERY", 5)?;

        let pools_raw = lookup("POOLS").unwrap_or_else(|| DEFAULT_POOLS.into());
        let pools = parse_pools(&pools_raw, default_fee_rate)?;

        Ok(Self {
            ws_url,
            pools,
            default_fee_rate,
            detection_interval: Duration::from_millis(interval_ms),
            min_profit_epsilon,
            heartbeat_every,
        })
    }
}

/// Parse `address:BASE:QUOTE[:fee_rate]` entries separated by commas.
pub fn parse_pools(raw: &str, default_fee_rate: f64) -> Result<Vec<PoolMetadata>> {
    let mut pools = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let (address, base, quote, fee_rate) = match parts.as_slice() {
            [address, base, quote] => (*address, *base, *quote, default_fee_rate),
            [address, base, quote, fee] => {
                let fee_rate = fee.parse::<f64>().map_err(|e| {
                    AppError::Config(format!("pool entry `{entry}`: fee `{fee}`: {e}"))
                })?;
                (*address, *base, *quote, fee_rate)
            }
            _ => {
                return Err(AppError::Config(format!(
                    "pool entry `{entry}` must be address:BASE:QUOTE[:fee_rate]"
                )));
            }
        };
        if address.is_empty() || base.is_empty() || quote.is_empty() {
            return Err(AppError::Config(format!("pool entry `{entry}` has an empty field")));
        }
        if base == quote {
            return Err(AppError::Config(format!(
                "pool entry `{entry}` pairs a token with itself"
            )));
        }
        validate_fee(fee_rate)?;
        pools.push(PoolMetadata {
            address: address.to_string(),
            base_token: base.to_string(),
            quote_token: quote.to_string(),
            fee_rate,
        });
    }

    if pools.is_empty() {
        return Err(AppError::Config("no pools configured".into()));
    }
    Ok(pools)
}

/// Parse `key` if set, otherwise take `default`. Errors name the key.
fn parse_var<T>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}=`{raw}`: {e}"))),
        None => Ok(default),
    }
}

fn validate_fee(fee_rate: f64) -> Result<()> {
    if (0.0..1.0).contains(&fee_rate) {
        Ok(())
    } else {
        Err(AppError::Config(format!("fee rate {fee_rate} outside [0, 1)")))
    }
}
