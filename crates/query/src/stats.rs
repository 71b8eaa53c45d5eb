//! Descriptive statistics over price windows

use rust_decimal::prelude::*;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divisor = n).
///
/// Two-pass: the mean is computed first, then the mean squared distance
/// from it. `None` below two values, where spread is undefined.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let avg = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - avg;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;

    Some(variance.sqrt())
}

/// Round half away from zero to `dp` decimal places.
///
/// Rounds the exact binary value of `value`, the way `toFixed` does, so
/// `1.005` (stored as 1.00499...) becomes `1.0`. Values outside Decimal's
/// range fall back to float rounding.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    Decimal::from_f64_retain(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| {
            let scale = 10f64.powi(dp as i32);
            (value * scale).round() / scale
        })
}
