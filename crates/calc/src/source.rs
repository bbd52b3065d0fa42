use async_trait::async_trait;
use snapshot::{MarketCache, Snapshot, UserAccount, UserStats};
use thiserror::Error;

use crate::address::Authority;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("request to account gateway failed: {0}")]
    Network(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("account gateway returned an unreadable response: {0}")]
    Decode(String),
}

/// Read-only access to protocol accounts.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn fetch_market_cache(&self) -> Result<MarketCache, SourceError>;

    async fn fetch_user_stats(&self, authority: &Authority) -> Result<UserStats, SourceError>;

    /// `Ok(None)` when the subaccount has never been initialised.
    async fn fetch_user(
        &self,
        authority: &Authority,
        sub_account_id: u16,
    ) -> Result<Option<UserAccount>, SourceError>;
}

/// Protocol risk functions, evaluated against whatever snapshot they are
/// handed. Prices are in `PRICE_PRECISION`.
#[async_trait]
pub trait RiskModel: Send + Sync {
    async fn spot_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError>;

    async fn perp_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError>;

    /// Account health in percent, 0..=100.
    async fn health(&self, snapshot: &Snapshot) -> Result<u8, SourceError>;
}
