//! In-memory collaborators for tests and benches.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use snapshot::{MarketCache, Snapshot, UserAccount, UserStats};

use crate::{
    address::Authority,
    source::{AccountSource, RiskModel, SourceError},
};

/// Serves fixed accounts and counts how often each kind was fetched.
#[derive(Debug, Default)]
pub struct InMemorySource {
    markets: MarketCache,
    stats: HashMap<String, UserStats>,
    users: HashMap<(String, u16), UserAccount>,
    fail_with: Mutex<Option<SourceError>>,
    market_fetches: AtomicUsize,
    user_fetches: AtomicUsize,
}

impl InMemorySource {
    pub fn new(markets: MarketCache) -> Self {
        Self {
            markets,
            ..Self::default()
        }
    }

    /// Registers `user` and bumps the authority's subaccount count to cover it.
    pub fn with_user(mut self, user: UserAccount) -> Self {
        let stats = self
            .stats
            .entry(user.authority.clone())
            .or_insert_with(|| UserStats {
                authority: user.authority.clone(),
                number_of_sub_accounts_created: 0,
            });
        stats.number_of_sub_accounts_created = stats
            .number_of_sub_accounts_created
            .max(user.sub_account_id + 1);
        self.users
            .insert((user.authority.clone(), user.sub_account_id), user);
        self
    }

    pub fn with_stats(mut self, stats: UserStats) -> Self {
        self.stats.insert(stats.authority.clone(), stats);
        self
    }

    /// Every following fetch fails with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<SourceError>) {
        *self.fail_with.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    pub fn market_fetches(&self) -> usize {
        self.market_fetches.load(Ordering::Relaxed)
    }

    pub fn user_fetches(&self) -> usize {
        self.user_fetches.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> Result<(), SourceError> {
        match self
            .fail_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountSource for InMemorySource {
    async fn fetch_market_cache(&self) -> Result<MarketCache, SourceError> {
        self.check_failure()?;
        self.market_fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.markets.clone())
    }

    async fn fetch_user_stats(&self, authority: &Authority) -> Result<UserStats, SourceError> {
        self.check_failure()?;
        self.stats
            .get(authority.as_str())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("user stats for {authority}")))
    }

    async fn fetch_user(
        &self,
        authority: &Authority,
        sub_account_id: u16,
    ) -> Result<Option<UserAccount>, SourceError> {
        self.check_failure()?;
        self.user_fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .users
            .get(&(authority.as_str().to_owned(), sub_account_id))
            .cloned())
    }
}

/// Places every liquidation price at a fixed fraction of the snapshot's
/// oracle price, and reports health by how far the lowest of those oracle
/// prices sits above `healthy_above`. Only useful for exercising the
/// plumbing: it reads the snapshot it is given, nothing else.
#[derive(Debug, Clone, Copy)]
pub struct RatioRiskModel {
    pub liq_ratio_bps: i64,
    pub healthy_above: i64,
}

impl Default for RatioRiskModel {
    fn default() -> Self {
        Self {
            liq_ratio_bps: 6_000,
            healthy_above: 0,
        }
    }
}

#[async_trait]
impl RiskModel for RatioRiskModel {
    async fn spot_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError> {
        snapshot
            .oracle_for_spot_market(market_index)
            .map(|oracle| oracle.price * self.liq_ratio_bps / 10_000)
            .ok_or_else(|| SourceError::NotFound(format!("spot market {market_index}")))
    }

    async fn perp_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError> {
        snapshot
            .oracle_for_perp_market(market_index)
            .map(|oracle| oracle.price * self.liq_ratio_bps / 10_000)
            .ok_or_else(|| SourceError::NotFound(format!("perp market {market_index}")))
    }

    async fn health(&self, snapshot: &Snapshot) -> Result<u8, SourceError> {
        let lowest = snapshot
            .markets
            .oracle_price_data
            .values()
            .map(|oracle| oracle.price)
            .min()
            .unwrap_or(0);
        Ok(if lowest > self.healthy_above { 100 } else { 0 })
    }
}
