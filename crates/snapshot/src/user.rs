use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotBalanceType {
    #[default]
    Deposit,
    Borrow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotPosition {
    pub market_index: u16,
    pub scaled_balance: u64,
    pub balance_type: SpotBalanceType,
    pub open_orders: u8,
    pub open_bids: i64,
    pub open_asks: i64,
    pub cumulative_deposits: i64,
}

impl SpotPosition {
    pub fn is_active(&self) -> bool {
        self.scaled_balance != 0 || self.open_orders != 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpPosition {
    pub market_index: u16,
    pub base_asset_amount: i64,
    pub quote_asset_amount: i64,
    pub open_orders: u8,
    pub lp_shares: u64,
}

impl PerpPosition {
    pub fn is_active(&self) -> bool {
        self.base_asset_amount != 0
            || self.quote_asset_amount != 0
            || self.open_orders != 0
            || self.lp_shares != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub authority: String,
    pub sub_account_id: u16,
    pub spot_positions: Vec<SpotPosition>,
    pub perp_positions: Vec<PerpPosition>,
}

impl UserAccount {
    pub fn spot_position(&self, market_index: u16) -> Option<&SpotPosition> {
        self.spot_positions
            .iter()
            .find(|position| position.market_index == market_index && position.is_active())
    }

    pub fn perp_position(&self, market_index: u16) -> Option<&PerpPosition> {
        self.perp_positions
            .iter()
            .find(|position| position.market_index == market_index && position.is_active())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub authority: String,
    pub number_of_sub_accounts_created: u16,
}
