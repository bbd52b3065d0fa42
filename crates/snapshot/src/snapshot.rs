use serde::{Deserialize, Serialize};

use crate::{
    market::{MarketCache, PerpMarket, SpotMarket},
    oracle::{OracleId, OraclePriceData},
    user::{PerpPosition, SpotBalanceType, SpotPosition, UserAccount},
};

pub const PRICE_PRECISION: i64 = 1_000_000;
pub const BASE_PRECISION: i64 = 1_000_000_000;
pub const SPOT_BALANCE_PRECISION: u128 = 1_000_000_000;
pub const SPOT_CUMULATIVE_INTEREST_PRECISION: u128 = 10_000_000_000;

/// Scaled balances carry 19 decimals of precision once multiplied by the
/// cumulative interest, so a market with `decimals` needs `10^(19 - decimals)`
/// to land in token units.
const TOKEN_AMOUNT_PRECISION_EXP: u32 = 19;

/// Market data plus one user account, the unit the risk model evaluates.
///
/// Cloning is a deep copy; the working copy for a what-if pass is always a
/// clone so the cached original stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub markets: MarketCache,
    pub user: UserAccount,
}

impl Snapshot {
    pub fn new(markets: MarketCache, user: UserAccount) -> Self {
        Self { markets, user }
    }

    pub fn active_spot_positions(&self) -> Vec<SpotPosition> {
        self.user
            .spot_positions
            .iter()
            .filter(|position| position.is_active())
            .copied()
            .collect()
    }

    pub fn active_perp_positions(&self) -> Vec<PerpPosition> {
        self.user
            .perp_positions
            .iter()
            .filter(|position| position.is_active())
            .copied()
            .collect()
    }

    pub fn spot_market(&self, market_index: u16) -> Option<&SpotMarket> {
        self.markets.spot_market(market_index)
    }

    pub fn perp_market(&self, market_index: u16) -> Option<&PerpMarket> {
        self.markets.perp_market(market_index)
    }

    pub fn oracle_for_spot_market(&self, market_index: u16) -> Option<&OraclePriceData> {
        let oracle_id = self.spot_market(market_index)?.oracle_id();
        self.markets.oracle_price(&oracle_id)
    }

    pub fn oracle_for_perp_market(&self, market_index: u16) -> Option<&OraclePriceData> {
        let oracle_id = self.perp_market(market_index)?.oracle_id();
        self.markets.oracle_price(&oracle_id)
    }

    pub fn spot_oracle_id(&self, market_index: u16) -> Option<OracleId> {
        self.spot_market(market_index).map(SpotMarket::oracle_id)
    }

    pub fn perp_oracle_id(&self, market_index: u16) -> Option<OracleId> {
        self.perp_market(market_index).map(PerpMarket::oracle_id)
    }

    /// Signed token amount of the user's position in `market_index`, in the
    /// market's native units. Borrows are negative. Returns `None` when there
    /// is no active position or the market is unknown.
    pub fn token_amount(&self, market_index: u16) -> Option<i128> {
        let position = self.user.spot_position(market_index)?;
        let market = self.spot_market(market_index)?;
        signed_token_amount(position, market)
    }

    /// Token amount for a spot row. A position that was emptied, or never
    /// held, counts as zero instead of disappearing. `None` only when the
    /// market is unknown.
    pub fn token_amount_or_zero(&self, market_index: u16) -> Option<i128> {
        let market = self.spot_market(market_index)?;
        match self
            .user
            .spot_positions
            .iter()
            .find(|position| position.market_index == market_index)
        {
            Some(position) => signed_token_amount(position, market),
            None => Some(0),
        }
    }
}

pub fn signed_token_amount(position: &SpotPosition, market: &SpotMarket) -> Option<i128> {
    let exp = TOKEN_AMOUNT_PRECISION_EXP.checked_sub(market.decimals)?;
    let precision_decrease = 10_u128.checked_pow(exp)?;
    let balance = u128::from(position.scaled_balance);

    let amount = match position.balance_type {
        SpotBalanceType::Deposit => balance
            .checked_mul(market.cumulative_deposit_interest)?
            .checked_div(precision_decrease)?,
        SpotBalanceType::Borrow => balance
            .checked_mul(market.cumulative_borrow_interest)?
            .div_ceil(precision_decrease),
    };
    let amount = i128::try_from(amount).ok()?;

    Some(match position.balance_type {
        SpotBalanceType::Deposit => amount,
        SpotBalanceType::Borrow => -amount,
    })
}
