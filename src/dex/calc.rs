use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;

/// Default pool fee (0.30%).
pub const DEFAULT_FEE_RATE: f64 = 0.003;

/// Compute both directed rates of a constant-product pool, net of fee.
///
/// Returns `(rate_ab, rate_ba)` where `rate_ab` is units of B per unit of A:
///
/// * `rate_ab = reserve_b / reserve_a * (1 - fee_rate)`
/// * `rate_ba = reserve_a / reserve_b * (1 - fee_rate)`
///
/// The reserve ratio is divided in arbitrary precision before narrowing to
/// `f64`, so large reserves at extreme ratios keep their significant digits.
///
/// # Errors
/// `InvalidRate` on identical tokens, a zero reserve, a fee outside
/// `[0, 1)`, or a narrowed rate that is not finite and positive.
pub fn pool_rates(
    token_a: &str,
    token_b: &str,
    reserve_a: u64,
    reserve_b: u64,
    fee_rate: f64,
) -> Result<(f64, f64)> {
    let invalid = |from: &str, to: &str, reason: String| AppError::InvalidRate {
        from: from.to_string(),
        to: to.to_string(),
        reason,
    };

    if token_a == token_b {
        return Err(invalid(token_a, token_b, "pool quotes a token against itself".into()));
    }
    if !(0.0..1.0).contains(&fee_rate) {
        return Err(invalid(token_a, token_b, format!("fee rate {fee_rate} outside [0, 1)")));
    }
    if reserve_a == 0 || reserve_b == 0 {
        return Err(invalid(
            token_a,
            token_b,
            format!("zero reserve ({reserve_a}, {reserve_b})"),
        ));
    }

    let fee_factor = 1.0 - fee_rate;
    let a = BigDecimal::from(reserve_a);
    let b = BigDecimal::from(reserve_b);

    let rate_ab = narrow(&b / &a) * fee_factor;
    let rate_ba = narrow(&a / &b) * fee_factor;

    for (from, to, rate) in [(token_a, token_b, rate_ab), (token_b, token_a, rate_ba)] {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(invalid(from, to, format!("computed rate {rate}")));
        }
    }

    Ok((rate_ab, rate_ba))
}

fn narrow(ratio: BigDecimal) -> f64 {
    ratio.to_f64().unwrap_or(f64::NAN)
}
