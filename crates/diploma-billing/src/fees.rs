//! Fee calculation for a batch of diplomas.
//!
//! Pricing has two components: a flat per-unit network fee (a percentage of
//! the base diploma price) and a storage fee charged only for diplomas whose
//! global index lands above the free tier. Amounts stay exact `Decimal`s
//! through accumulation; rounding happens once, at display time.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use tracing::warn;

use diploma_types::PriceConfig;

/// Flat per-unit network fee used when no price config has been stored.
pub const FALLBACK_UNIT_NETWORK_FEE: Decimal = dec!(0.50);

const PERCENT: Decimal = dec!(100);
const STORAGE_UNIT_DIVISOR: Decimal = dec!(1000);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("batch size must be at least 1")]
    EmptyBatch,
}

/// Derived quote for one batch; never persisted, recomputed on every
/// quantity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeQuote {
    pub network_fee: Decimal,
    pub storage_fee: Decimal,
    pub total: Decimal,
}

impl FeeQuote {
    /// Two-decimal figures for presentation. Accumulated values are left
    /// exact so large batches never compound rounding error.
    pub fn rounded(&self) -> FeeQuote {
        FeeQuote {
            network_fee: self.network_fee.round_dp(2),
            storage_fee: self.storage_fee.round_dp(2),
            total: self.total.round_dp(2),
        }
    }
}

/// Quote fees for a batch of `batch_size` diplomas when `prior_issued`
/// diplomas have already been issued under this school.
///
/// The batch member `i` (1-based) has global index `prior_issued + i`;
/// storage is charged only for indices strictly above the free limit.
pub fn calculate_fees(
    prior_issued: u64,
    batch_size: u32,
    config: &PriceConfig,
) -> Result<FeeQuote, FeeError> {
    if batch_size == 0 {
        return Err(FeeError::EmptyBatch);
    }

    let unit_network_fee = config.base_price * config.network_fee_percent / PERCENT;
    let network_fee = unit_network_fee * Decimal::from(batch_size);

    let charged_units = charged_storage_units(prior_issued, batch_size, config.storage_free_limit);
    let storage_fee =
        config.storage_price_per_1000 / STORAGE_UNIT_DIVISOR * Decimal::from(charged_units);

    Ok(FeeQuote {
        network_fee,
        storage_fee,
        total: network_fee + storage_fee,
    })
}

/// Documented default when no price config exists: flat network fee per
/// unit, no storage fee. Loud, never silent.
pub fn fallback_quote(batch_size: u32) -> Result<FeeQuote, FeeError> {
    if batch_size == 0 {
        return Err(FeeError::EmptyBatch);
    }
    warn!(
        batch_size,
        unit_fee = %FALLBACK_UNIT_NETWORK_FEE,
        "no price config stored; quoting fallback network fee only"
    );
    let network_fee = FALLBACK_UNIT_NETWORK_FEE * Decimal::from(batch_size);
    Ok(FeeQuote {
        network_fee,
        storage_fee: Decimal::ZERO,
        total: network_fee,
    })
}

/// Dispatch between the configured formula and the fallback.
pub fn quote_or_fallback(
    prior_issued: u64,
    batch_size: u32,
    config: Option<&PriceConfig>,
) -> Result<FeeQuote, FeeError> {
    match config {
        Some(config) => calculate_fees(prior_issued, batch_size, config),
        None => fallback_quote(batch_size),
    }
}

/// How many of the batch's global indices exceed the free limit.
fn charged_storage_units(prior_issued: u64, batch_size: u32, free_limit: u64) -> u64 {
    let batch = u64::from(batch_size);
    let free_remaining = free_limit.saturating_sub(prior_issued);
    batch.saturating_sub(free_remaining)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use diploma_types::PriceConfig;

    use super::{calculate_fees, fallback_quote, quote_or_fallback, FeeError};

    fn config() -> PriceConfig {
        PriceConfig {
            network_fee_percent: dec!(2),
            storage_free_limit: 100,
            storage_price_per_1000: dec!(3.50),
            base_price: dec!(25.00),
            updated_at_unix_millis: 0,
        }
    }

    #[test]
    fn total_is_sum_of_components() {
        for (prior, batch) in [(0u64, 1u32), (0, 250), (95, 10), (100, 1), (1000, 37)] {
            let quote = calculate_fees(prior, batch, &config()).unwrap();
            assert_eq!(quote.total, quote.network_fee + quote.storage_fee);
        }
    }

    #[test]
    fn free_tier_boundary_splits_the_batch() {
        // Prior 95, batch 10: indices 96..=105. 96..=100 ride the free
        // tier, 101..=105 pay storage.
        let quote = calculate_fees(95, 10, &config()).unwrap();
        assert_eq!(quote.storage_fee, dec!(5) * dec!(3.50) / dec!(1000));
        assert_eq!(quote.network_fee, dec!(10) * dec!(25.00) * dec!(2) / dec!(100));
    }

    #[test]
    fn network_fee_is_flat_across_the_free_tier() {
        let inside = calculate_fees(0, 5, &config()).unwrap();
        let outside = calculate_fees(500, 5, &config()).unwrap();
        assert_eq!(inside.network_fee, outside.network_fee);
        assert_eq!(inside.storage_fee, dec!(0));
        assert!(outside.storage_fee > dec!(0));
    }

    #[test]
    fn fully_free_batch_has_zero_storage_fee() {
        let quote = calculate_fees(0, 100, &config()).unwrap();
        assert_eq!(quote.storage_fee, dec!(0));
    }

    #[test]
    fn empty_batch_is_rejected_before_any_arithmetic() {
        assert_eq!(calculate_fees(10, 0, &config()), Err(FeeError::EmptyBatch));
        assert_eq!(fallback_quote(0), Err(FeeError::EmptyBatch));
    }

    #[test]
    fn calculation_is_pure() {
        let first = calculate_fees(95, 10, &config()).unwrap();
        let second = calculate_fees(95, 10, &config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn fallback_is_network_fee_only() {
        let quote = quote_or_fallback(40, 3, None).unwrap();
        assert_eq!(quote.storage_fee, dec!(0));
        assert_eq!(quote.network_fee, dec!(1.50));
        assert_eq!(quote.total, dec!(1.50));
    }

    #[test]
    fn rounding_happens_only_at_display() {
        let config = PriceConfig {
            storage_price_per_1000: dec!(1),
            ..config()
        };
        // 3 charged units at 0.001 each: exact total keeps the third
        // decimal, the display quote rounds it away.
        let quote = calculate_fees(100, 3, &config).unwrap();
        assert_eq!(quote.storage_fee, dec!(0.003));
        assert_eq!(quote.rounded().storage_fee, dec!(0.00));
        assert_eq!(quote.total, quote.network_fee + dec!(0.003));
    }
}
