use tracing::warn;

use crate::domain::{Basket, TokenAllocation};
use crate::error::OrchestrationError;

/// Largest minor-unit scale a token may declare.
pub const MAX_DECIMALS: u32 = 18;

/// One basket entry paired with the capital it receives.
#[derive(Debug, Clone, PartialEq)]
pub struct LegTarget {
    pub allocation: TokenAllocation,
    pub target_amount: f64,
}

/// Splits `total_amount` across the basket, one target per token, in basket
/// order. Percentages are taken as given: a basket summing to 80% spends 80%.
pub fn split(basket: &Basket, total_amount: f64) -> Result<Vec<LegTarget>, OrchestrationError> {
    if basket.tokens.is_empty() {
        return Err(OrchestrationError::InvalidBasket(format!(
            "basket '{}' has no tokens",
            basket.name
        )));
    }

    let total_pct = basket.total_allocation_percent();
    if (total_pct - 100.0).abs() > f64::EPSILON * 100.0 {
        warn!(basket = %basket.name, total_pct, "allocation.sum_drift");
    }

    Ok(basket
        .tokens
        .iter()
        .map(|t| LegTarget {
            target_amount: total_amount * t.allocation_percent / 100.0,
            allocation: t.clone(),
        })
        .collect())
}

/// Floors `amount * 10^decimals`. `None` for negative, non-finite or
/// out-of-range amounts, and for scales above `MAX_DECIMALS`.
pub fn to_minor_units(amount: f64, decimals: u32) -> Option<u64> {
    if !amount.is_finite() || amount < 0.0 || decimals > MAX_DECIMALS {
        return None;
    }
    let scaled = (amount * 10f64.powi(decimals as i32)).floor();
    if scaled > u64::MAX as f64 {
        return None;
    }
    Some(scaled as u64)
}

pub fn from_minor_units(minor: u64, decimals: u32) -> f64 {
    minor as f64 / 10f64.powi(decimals as i32)
}
