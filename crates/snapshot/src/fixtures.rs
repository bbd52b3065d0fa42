//! Small builders for hand-made snapshots, used by tests and benches across
//! the workspace.

use crate::{
    market::{encode_name, MarketCache, PerpMarket, SpotMarket},
    oracle::{OracleId, OraclePriceData, OracleSource},
    snapshot::{BASE_PRECISION, PRICE_PRECISION, SPOT_BALANCE_PRECISION, SPOT_CUMULATIVE_INTEREST_PRECISION},
    user::{PerpPosition, SpotBalanceType, SpotPosition, UserAccount},
};

pub fn spot_market(market_index: u16, name: &str, oracle: &str, decimals: u32) -> SpotMarket {
    SpotMarket {
        market_index,
        name: encode_name(name),
        oracle: oracle.to_string(),
        oracle_source: OracleSource::PythPull,
        decimals,
        cumulative_deposit_interest: SPOT_CUMULATIVE_INTEREST_PRECISION,
        cumulative_borrow_interest: SPOT_CUMULATIVE_INTEREST_PRECISION,
    }
}

pub fn perp_market(market_index: u16, name: &str, oracle: &str) -> PerpMarket {
    PerpMarket {
        market_index,
        name: encode_name(name),
        oracle: oracle.to_string(),
        oracle_source: OracleSource::PythPull,
    }
}

/// Spot deposit of `tokens` whole tokens at unit cumulative interest.
pub fn spot_deposit(market_index: u16, tokens: u64) -> SpotPosition {
    SpotPosition {
        market_index,
        scaled_balance: tokens * SPOT_BALANCE_PRECISION as u64,
        balance_type: SpotBalanceType::Deposit,
        ..SpotPosition::default()
    }
}

pub fn spot_borrow(market_index: u16, tokens: u64) -> SpotPosition {
    SpotPosition {
        balance_type: SpotBalanceType::Borrow,
        ..spot_deposit(market_index, tokens)
    }
}

/// Perp position of `base_size` (in whole base units, may be fractional).
pub fn perp_position(market_index: u16, base_size: f64) -> PerpPosition {
    PerpPosition {
        market_index,
        base_asset_amount: (base_size * BASE_PRECISION as f64) as i64,
        ..PerpPosition::default()
    }
}

pub fn user(authority: &str, sub_account_id: u16) -> UserAccount {
    UserAccount {
        authority: authority.to_string(),
        sub_account_id,
        spot_positions: Vec::new(),
        perp_positions: Vec::new(),
    }
}

pub trait MarketCacheExt {
    fn with_spot(self, market: SpotMarket) -> Self;
    fn with_perp(self, market: PerpMarket) -> Self;
    fn with_price(self, oracle: &str, price: f64) -> Self;
}

impl MarketCacheExt for MarketCache {
    fn with_spot(mut self, market: SpotMarket) -> Self {
        self.spot_markets.insert(market.market_index, market);
        self
    }

    fn with_perp(mut self, market: PerpMarket) -> Self {
        self.perp_markets.insert(market.market_index, market);
        self
    }

    fn with_price(mut self, oracle: &str, price: f64) -> Self {
        self.oracle_price_data.insert(
            OracleId::new(oracle, OracleSource::PythPull),
            OraclePriceData::with_price((price * PRICE_PRECISION as f64).round() as i64),
        );
        self
    }
}
