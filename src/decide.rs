//! Update decision: fixed-point scaling and on-chain comparison.
//!
//! The registry stores prices as `uint256` with scale 1e18. The canonical
//! rounding rule is truncate toward zero: any fractional unit smaller than
//! 10^-18 is dropped. Because the NAV is carried as the exact decimal from
//! the page text, values within 18 decimal places scale exactly
//! (`100.23 -> 100230000000000000000`).

use alloy_primitives::U256;
use rust_decimal::Decimal;

use crate::types::{ChainRecord, Observation};

/// On-chain fixed-point scale.
pub const PRICE_SCALE_DECIMALS: u32 = 18;

/// What a run should do after comparing fresh and recorded prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Scaled price equals the registry price; spend no fee.
    Skip,
    /// Submit `update` with this scaled price.
    Update { new_price: U256 },
}

/// Scale a non-negative NAV to the registry's 1e18 fixed point,
/// truncating toward zero.
///
/// Callers pass validated NAVs (`0 < nav < 1e11`), so the mantissa is
/// positive and the product fits comfortably in a `U256`.
pub fn scale_price(nav: Decimal) -> U256 {
    debug_assert!(!nav.is_sign_negative());
    let mantissa = U256::from(nav.mantissa().unsigned_abs());
    let scale = nav.scale();
    if scale <= PRICE_SCALE_DECIMALS {
        mantissa * U256::from(10u128.pow(PRICE_SCALE_DECIMALS - scale))
    } else {
        // More decimal places than the chain can hold: integer division
        // truncates toward zero.
        mantissa / U256::from(10u128.pow(scale - PRICE_SCALE_DECIMALS))
    }
}

/// Compare the fresh observation against the last recorded price using
/// exact integer equality. Equal means the source has not changed since the
/// last confirmed update, making repeated runs idempotent.
pub fn decide(observation: &Observation, last: &ChainRecord) -> Decision {
    let new_price = scale_price(observation.nav);
    if new_price == last.price {
        Decision::Skip
    } else {
        Decision::Update { new_price }
    }
}
