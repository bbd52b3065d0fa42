use std::collections::BTreeMap;

use serde::Serialize;
use snapshot::{MarketCache, OracleId, Snapshot, UserAccount, PRICE_PRECISION};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceOverride {
    pub oracle_id: OracleId,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollateralOverride {
    pub market_index: u16,
    /// Simulated balance in whole tokens.
    pub tokens: f64,
    pub decimals: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverrideSet {
    pub prices: Vec<PriceOverride>,
    pub collateral: Vec<CollateralOverride>,
}

impl OverrideSet {
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty() && self.collateral.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedOverrides {
    pub prices: usize,
    pub collateral: usize,
}

/// Clones `original` and substitutes the overrides into the clone.
///
/// Collateral is rescaled against token amounts read from `original`, so the
/// result does not depend on the order overrides are listed in.
pub fn simulate(original: &Snapshot, overrides: &OverrideSet) -> (Snapshot, AppliedOverrides) {
    let mut working = original.clone();

    let original_tokens: BTreeMap<u16, i128> = overrides
        .collateral
        .iter()
        .filter_map(|change| {
            original
                .token_amount(change.market_index)
                .map(|tokens| (change.market_index, tokens))
        })
        .collect();

    let applied = AppliedOverrides {
        prices: apply_price_overrides(&mut working.markets, &overrides.prices),
        collateral: apply_collateral_overrides(
            &mut working.user,
            &overrides.collateral,
            &original_tokens,
        ),
    };

    (working, applied)
}

/// Overwrites the price of each referenced oracle record. Oracles not present
/// in the cache are skipped. Returns how many records were written.
pub fn apply_price_overrides(markets: &mut MarketCache, overrides: &[PriceOverride]) -> usize {
    let mut applied = 0;
    for change in overrides {
        if let Some(record) = markets.oracle_price_mut(&change.oracle_id) {
            record.price = price_to_fixed(change.price);
            applied += 1;
        }
    }
    applied
}

/// Rescales the scaled balance of each referenced spot position by
/// `new_tokens / original_tokens`. Positions without a recorded original
/// amount are left alone.
pub fn apply_collateral_overrides(
    user: &mut UserAccount,
    overrides: &[CollateralOverride],
    original_tokens: &BTreeMap<u16, i128>,
) -> usize {
    let mut applied = 0;
    for change in overrides {
        let Some(&original) = original_tokens.get(&change.market_index) else {
            continue;
        };
        let Some(position) = user
            .spot_positions
            .iter_mut()
            .find(|position| position.market_index == change.market_index && position.is_active())
        else {
            continue;
        };

        let new_tokens = tokens_to_native(change.tokens, change.decimals);
        position.scaled_balance = rescale_scaled_balance(position.scaled_balance, original, new_tokens);
        applied += 1;
    }
    applied
}

/// `scaled_balance * new_tokens / original_tokens`, exact in 128-bit integers.
///
/// A zero original yields zero. A ratio that flips the balance sign cannot be
/// represented by an unsigned balance and yields zero as well.
pub fn rescale_scaled_balance(scaled_balance: u64, original_tokens: i128, new_tokens: i128) -> u64 {
    if original_tokens == 0 {
        return 0;
    }

    let scaled = i128::from(scaled_balance);
    match scaled.checked_mul(new_tokens) {
        Some(product) => {
            let rescaled = product / original_tokens;
            if rescaled <= 0 {
                0
            } else {
                u64::try_from(rescaled).unwrap_or(u64::MAX)
            }
        }
        None => {
            let ratio = new_tokens as f64 / original_tokens as f64;
            if ratio <= 0.0 {
                0
            } else {
                (scaled_balance as f64 * ratio) as u64
            }
        }
    }
}

/// Nearest fixed-point price; `4.35 * 1e6` is `4349999.999...` in floating point.
pub fn price_to_fixed(price: f64) -> i64 {
    (price * PRICE_PRECISION as f64).round() as i64
}

pub fn tokens_to_native(tokens: f64, decimals: u32) -> i128 {
    (tokens * 10_f64.powi(decimals as i32)).round() as i128
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use snapshot::fixtures::{self, MarketCacheExt};
    use snapshot::{MarketCache, OracleId, OracleSource, Snapshot};

    use super::{
        apply_collateral_overrides, price_to_fixed, rescale_scaled_balance, simulate,
        tokens_to_native, CollateralOverride, OverrideSet, PriceOverride,
    };

    fn snapshot() -> Snapshot {
        let markets = MarketCache::default()
            .with_spot(fixtures::spot_market(0, "USDC", "usdc-feed", 6))
            .with_spot(fixtures::spot_market(1, "SOL", "sol-feed", 9))
            .with_perp(fixtures::perp_market(0, "SOL-PERP", "sol-feed"))
            .with_perp(fixtures::perp_market(1, "BTC-PERP", "btc-feed"))
            .with_price("usdc-feed", 1.0)
            .with_price("sol-feed", 150.0)
            .with_price("btc-feed", 60_000.0);
        let mut user = fixtures::user("authority", 0);
        user.spot_positions.push(fixtures::spot_deposit(0, 1_000));
        user.spot_positions.push(fixtures::spot_deposit(1, 4));
        user.perp_positions.push(fixtures::perp_position(0, 2.5));
        user.perp_positions.push(fixtures::perp_position(1, 0.1));
        Snapshot::new(markets, user)
    }

    fn feed(name: &str) -> OracleId {
        OracleId::new(name, OracleSource::PythPull)
    }

    #[test]
    fn price_override_reaches_every_market_on_the_feed_and_no_other() {
        let original = snapshot();
        let overrides = OverrideSet {
            prices: vec![PriceOverride {
                oracle_id: feed("sol-feed"),
                price: 120.0,
            }],
            collateral: Vec::new(),
        };

        let (working, applied) = simulate(&original, &overrides);

        assert_eq!(applied.prices, 1);
        assert_eq!(working.oracle_for_perp_market(0).unwrap().price, 120_000_000);
        assert_eq!(working.oracle_for_spot_market(1).unwrap().price, 120_000_000);
        assert_eq!(working.oracle_for_perp_market(1).unwrap().price, 60_000_000_000);
        assert_eq!(working.oracle_for_spot_market(0).unwrap().price, 1_000_000);
    }

    #[test]
    fn simulate_leaves_original_untouched() {
        let original = snapshot();
        let before = original.clone();
        let overrides = OverrideSet {
            prices: vec![PriceOverride {
                oracle_id: feed("btc-feed"),
                price: 1.0,
            }],
            collateral: vec![CollateralOverride {
                market_index: 1,
                tokens: 2.0,
                decimals: 9,
            }],
        };

        let (working, _) = simulate(&original, &overrides);

        assert_eq!(original, before);
        assert_ne!(working, before);
    }

    #[test]
    fn unknown_oracle_is_ignored() {
        let (working, applied) = simulate(
            &snapshot(),
            &OverrideSet {
                prices: vec![PriceOverride {
                    oracle_id: feed("nope"),
                    price: 1.0,
                }],
                collateral: Vec::new(),
            },
        );

        assert_eq!(applied.prices, 0);
        assert_eq!(working, snapshot());
    }

    #[test]
    fn collateral_override_rescales_by_token_ratio() {
        let original = snapshot();
        let scaled_before = original.user.spot_positions[1].scaled_balance;

        let (working, applied) = simulate(
            &original,
            &OverrideSet {
                prices: Vec::new(),
                collateral: vec![CollateralOverride {
                    market_index: 1,
                    tokens: 1.0,
                    decimals: 9,
                }],
            },
        );

        assert_eq!(applied.collateral, 1);
        assert_eq!(working.user.spot_positions[1].scaled_balance, scaled_before / 4);
        assert_eq!(working.token_amount(1), Some(1_000_000_000));
    }

    #[test]
    fn rescale_is_exact_integer_ratio() {
        assert_eq!(rescale_scaled_balance(1_000_000_007, 3, 2), 666_666_671);
        assert_eq!(rescale_scaled_balance(900, 300, 300), 900);
    }

    #[test]
    fn rescale_with_zero_original_is_zero() {
        assert_eq!(rescale_scaled_balance(123_456, 0, 1_000), 0);
    }

    #[test]
    fn rescale_that_flips_sign_saturates_to_zero() {
        assert_eq!(rescale_scaled_balance(1_000, -50, 25), 0);
    }

    #[test]
    fn borrow_rescale_keeps_borrow_magnitude_ratio() {
        assert_eq!(rescale_scaled_balance(1_000, -50, -100), 2_000);
    }

    #[test]
    fn override_without_original_amount_is_skipped() {
        let mut user = snapshot().user;
        let before = user.clone();

        let applied = apply_collateral_overrides(
            &mut user,
            &[CollateralOverride {
                market_index: 1,
                tokens: 10.0,
                decimals: 9,
            }],
            &BTreeMap::new(),
        );

        assert_eq!(applied, 0);
        assert_eq!(user, before);
    }

    #[test]
    fn fixed_point_conversions_round_to_nearest() {
        assert_eq!(price_to_fixed(80.0), 80_000_000);
        assert_eq!(price_to_fixed(4.35), 4_350_000);
        assert_eq!(price_to_fixed(0.1234564), 123_456);
        assert_eq!(tokens_to_native(1.5, 6), 1_500_000);
    }
}
