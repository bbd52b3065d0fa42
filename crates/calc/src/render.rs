use std::{
    collections::BTreeMap,
    error::Error as _,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use serde::Deserialize;
use snapshot::{OracleId, Snapshot, BASE_PRECISION, PRICE_PRECISION};
use thiserror::Error;
use whatif::{
    AdjustError, AdjustmentMode, CollateralOverride, MarketKind, OracleGroups, OverrideSet,
    PriceOverride,
};

use crate::{
    address::{AddressError, Authority},
    logging::{RenderLogEvent, RenderLogEventKind, RenderLogWriter},
    metrics::{FetchLatencyMetrics, LatencyPercentiles},
    page::{
        CollateralControl, Notice, Page, PageStatus, PerpRow, PriceControl, Severity, SpotRow,
    },
    session::{SessionState, WidgetKey},
    source::{AccountSource, RiskModel, SourceError},
};

/// Operator input for one pass. Widget inputs are read in the pass's mode and
/// only for widgets that exist on the resulting page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    pub authority: String,
    pub sub_account_id: Option<u16>,
    /// `None` keeps the session's current mode.
    pub mode: Option<AdjustmentMode>,
    pub price_inputs: BTreeMap<OracleId, f64>,
    pub balance_inputs: BTreeMap<u16, f64>,
}

impl RenderRequest {
    pub fn for_authority(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Please enter a valid authority address")]
    MalformedAddress(#[source] AddressError),
    #[error("Error fetching account. Please check the authority address.")]
    AccountNotFound(#[source] SourceError),
    #[error("Subaccount {requested} does not exist, this authority has {available}")]
    InvalidSubAccount { requested: u16, available: u16 },
    #[error("Invalid value for {widget}")]
    InvalidInput {
        widget: String,
        #[source]
        source: AdjustError,
    },
    #[error("Error fetching {stage}")]
    Fetch {
        stage: &'static str,
        #[source]
        source: SourceError,
    },
    #[error("Error computing {stage}")]
    Risk {
        stage: String,
        #[source]
        source: SourceError,
    },
}

impl RenderError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::MalformedAddress(_) | Self::InvalidSubAccount { .. } | Self::InvalidInput { .. } => {
                Severity::Warning
            }
            Self::AccountNotFound(_) | Self::Fetch { .. } | Self::Risk { .. } => Severity::Error,
        }
    }

    pub fn to_notice(&self) -> Notice {
        let mut chain = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        Notice {
            severity: self.severity(),
            message: self.to_string(),
            detail: (!chain.is_empty()).then(|| chain.join(": ")),
        }
    }

    fn into_page(self, mode: AdjustmentMode) -> Page {
        let status = match self.severity() {
            Severity::Warning => PageStatus::Warning,
            Severity::Info | Severity::Error => PageStatus::Error,
        };
        Page::empty(status, mode).with_notice(self.to_notice())
    }
}

/// Runs passes against the account gateway and the risk model.
#[derive(Clone)]
pub struct Calculator {
    source: Arc<dyn AccountSource>,
    risk: Arc<dyn RiskModel>,
    fetch_latency: Arc<Mutex<FetchLatencyMetrics>>,
}

impl Calculator {
    pub fn new(source: Arc<dyn AccountSource>, risk: Arc<dyn RiskModel>) -> Self {
        Self {
            source,
            risk,
            fetch_latency: Arc::default(),
        }
    }

    pub fn fetch_latency(&self) -> Option<LatencyPercentiles> {
        self.fetch_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .percentiles()
    }

    /// One top-to-bottom pass. Failures end the pass and come back as a page
    /// carrying the notice; the session stays usable.
    pub async fn render(
        &self,
        state: &mut SessionState,
        request: RenderRequest,
        log: &mut (dyn RenderLogWriter + Send),
    ) -> Page {
        let pass = state.begin_pass();
        log.write(RenderLogEvent::new(pass, RenderLogEventKind::PassStarted, None));

        match self.try_render(pass, state, request, log).await {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(pass, error = %err, detail = ?err.to_notice().detail, "render pass failed");
                log.write(RenderLogEvent::new(pass, RenderLogEventKind::PassFailed, None));
                err.into_page(state.mode())
            }
        }
    }

    async fn try_render(
        &self,
        pass: u64,
        state: &mut SessionState,
        request: RenderRequest,
        log: &mut (dyn RenderLogWriter + Send),
    ) -> Result<Page, RenderError> {
        if let Some(mode) = request.mode {
            state.set_mode(mode);
        }
        let mode = state.mode();

        let Some(authority) =
            Authority::parse(&request.authority).map_err(RenderError::MalformedAddress)?
        else {
            return Ok(Page::empty(PageStatus::AwaitingAddress, mode));
        };

        if state.select_authority(authority.as_str()) {
            tracing::info!(%authority, "target changed, cached snapshots dropped");
            log.write(RenderLogEvent::new(pass, RenderLogEventKind::TargetChanged, None));
        }

        if state.market_cache().is_none() {
            let started = Instant::now();
            let markets = self
                .source
                .fetch_market_cache()
                .await
                .map_err(|source| RenderError::Fetch {
                    stage: "market data",
                    source,
                })?;
            let micros = self.record_fetch(started);
            tracing::info!(
                spot_markets = markets.spot_markets.len(),
                perp_markets = markets.perp_markets.len(),
                oracles = markets.oracle_price_data.len(),
                "market data cached"
            );
            state.cache_markets(markets);
            log.write(RenderLogEvent::new(
                pass,
                RenderLogEventKind::MarketCacheFetched,
                Some(micros),
            ));
        }

        let stats = self
            .source
            .fetch_user_stats(&authority)
            .await
            .map_err(|source| match source {
                SourceError::NotFound(_) | SourceError::Decode(_) => {
                    RenderError::AccountNotFound(source)
                }
                SourceError::Network(_) => RenderError::Fetch {
                    stage: "account stats",
                    source,
                },
            })?;
        let available = stats.number_of_sub_accounts_created;
        let sub_accounts: Vec<u16> = (0..available).collect();
        if sub_accounts.is_empty() {
            return Ok(Page::empty(PageStatus::NoData, mode)
                .with_notice(Notice::info("This authority has no subaccounts")));
        }

        let requested = request
            .sub_account_id
            .or(state.sub_account_id())
            .unwrap_or(0);
        if requested >= available {
            return Err(RenderError::InvalidSubAccount {
                requested,
                available,
            });
        }
        if state.select_sub_account(requested) {
            log.write(RenderLogEvent::new(pass, RenderLogEventKind::SubAccountSelected, None));
        }

        if state.user().is_none() {
            let started = Instant::now();
            let fetched = match self.source.fetch_user(&authority, requested).await {
                Ok(user) => user,
                Err(SourceError::NotFound(_)) => None,
                Err(source) => {
                    return Err(RenderError::Fetch {
                        stage: "subaccount data",
                        source,
                    })
                }
            };
            let micros = self.record_fetch(started);
            let Some(user) = fetched else {
                return Ok(Page::empty(PageStatus::NoData, mode)
                    .with_sub_accounts(sub_accounts, Some(requested))
                    .with_notice(Notice::info("No data found for this subaccount")));
            };
            state.cache_user(user);
            log.write(RenderLogEvent::new(
                pass,
                RenderLogEventKind::UserSnapshotFetched,
                Some(micros),
            ));
        }

        let (Some(markets), Some(user)) = (state.market_cache(), state.user()) else {
            return Ok(Page::empty(PageStatus::NoData, mode)
                .with_sub_accounts(sub_accounts, Some(requested)));
        };
        let original = Snapshot::new(markets.clone(), user.clone());

        let spot_positions = original.active_spot_positions();
        let perp_positions = original.active_perp_positions();
        if spot_positions.is_empty() && perp_positions.is_empty() {
            return Ok(Page::empty(PageStatus::NoPositions, mode)
                .with_sub_accounts(sub_accounts, Some(requested))
                .with_notice(Notice::info("No active positions found for this account")));
        }

        let groups = OracleGroups::from_snapshot(&original);
        let price_controls = price_controls(state, &original, &groups, &request.price_inputs)?;
        let collateral_controls = collateral_controls(state, &original, &request.balance_inputs)?;

        let overrides = OverrideSet {
            prices: price_controls
                .iter()
                .filter(|control| control.target_price != control.original_price)
                .map(|control| PriceOverride {
                    oracle_id: control.oracle_id.clone(),
                    price: control.target_price,
                })
                .collect(),
            collateral: collateral_controls
                .iter()
                .filter(|control| control.target_balance != control.original_balance)
                .map(|control| CollateralOverride {
                    market_index: control.market_index,
                    tokens: control.target_balance,
                    decimals: control.decimals,
                })
                .collect(),
        };
        let (working, applied) = whatif::simulate(&original, &overrides);
        if !overrides.is_empty() {
            tracing::debug!(
                prices = applied.prices,
                collateral = applied.collateral,
                "overrides applied to working snapshot"
            );
        }
        log.write(RenderLogEvent::new(pass, RenderLogEventKind::OverridesApplied, None));

        let mut spot_rows = Vec::with_capacity(spot_positions.len());
        for position in &spot_positions {
            let index = position.market_index;
            let (Some(market), Some(oracle), Some(tokens)) = (
                working.spot_market(index),
                working.oracle_for_spot_market(index),
                working.token_amount_or_zero(index),
            ) else {
                continue;
            };
            let name = market.name();
            let price = from_price_precision(oracle.price);
            let balance = from_token_precision(tokens, market.decimals);
            let liquidation_price = self
                .risk
                .spot_liq_price(&working, index)
                .await
                .map_err(|source| RenderError::Risk {
                    stage: format!("liquidation price for {name}"),
                    source,
                })?;

            spot_rows.push(SpotRow {
                market_index: index,
                decimals: market.decimals,
                balance,
                net_value: balance * price,
                price,
                liquidation_price: from_price_precision(liquidation_price),
                name,
            });
        }

        let mut perp_rows = Vec::with_capacity(perp_positions.len());
        for position in &perp_positions {
            let index = position.market_index;
            let (Some(market), Some(oracle)) =
                (working.perp_market(index), working.oracle_for_perp_market(index))
            else {
                continue;
            };
            let name = market.name();
            let price = from_price_precision(oracle.price);
            let base_size = position.base_asset_amount as f64 / BASE_PRECISION as f64;
            let liquidation_price = self
                .risk
                .perp_liq_price(&working, index)
                .await
                .map_err(|source| RenderError::Risk {
                    stage: format!("liquidation price for {name}"),
                    source,
                })?;

            perp_rows.push(PerpRow {
                market_index: index,
                base_size,
                notional: base_size * price,
                price,
                liquidation_price: from_price_precision(liquidation_price),
                name,
            });
        }

        let health = self
            .risk
            .health(&working)
            .await
            .map_err(|source| RenderError::Risk {
                stage: "account health".to_string(),
                source,
            })?;
        log.write(RenderLogEvent::new(pass, RenderLogEventKind::ResultsComputed, None));

        Ok(Page {
            status: PageStatus::Ready,
            notice: None,
            sub_accounts,
            selected_sub_account: Some(requested),
            mode,
            price_controls,
            collateral_controls,
            spot_rows,
            perp_rows,
            max_spot_decimals: groups.max_spot_decimals(),
            health: Some(health),
        })
    }

    fn record_fetch(&self, started: Instant) -> u64 {
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.fetch_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record_latency_micros(micros);
        micros
    }
}

fn price_controls(
    state: &mut SessionState,
    original: &Snapshot,
    groups: &OracleGroups,
    inputs: &BTreeMap<OracleId, f64>,
) -> Result<Vec<PriceControl>, RenderError> {
    let mut controls = Vec::with_capacity(groups.len());
    for group in groups.iter() {
        let Some(lead) = group.members.first() else {
            continue;
        };
        let oracle = match lead.kind {
            MarketKind::Perp => original.oracle_for_perp_market(lead.market_index),
            MarketKind::Spot => original.oracle_for_spot_market(lead.market_index),
        };
        let Some(oracle) = oracle else {
            continue;
        };

        let label = group.label();
        let original_price = from_price_precision(oracle.price);
        let adjustment = state
            .resolve_widget(
                WidgetKey::Price(group.oracle_id.clone()),
                original_price,
                inputs.get(&group.oracle_id).copied(),
            )
            .map_err(|source| RenderError::InvalidInput {
                widget: format!("{label} price"),
                source,
            })?;

        controls.push(PriceControl {
            oracle_id: group.oracle_id,
            label,
            members: group.members,
            original_price,
            adjustment,
            target_price: adjustment.target(original_price),
        });
    }
    Ok(controls)
}

fn collateral_controls(
    state: &mut SessionState,
    original: &Snapshot,
    inputs: &BTreeMap<u16, f64>,
) -> Result<Vec<CollateralControl>, RenderError> {
    let mut controls = Vec::new();
    for position in original.active_spot_positions() {
        let index = position.market_index;
        let (Some(market), Some(tokens)) = (original.spot_market(index), original.token_amount(index))
        else {
            continue;
        };

        let label = market.name();
        let original_balance = from_token_precision(tokens, market.decimals);
        let adjustment = state
            .resolve_widget(
                WidgetKey::Balance(index),
                original_balance,
                inputs.get(&index).copied(),
            )
            .map_err(|source| RenderError::InvalidInput {
                widget: format!("{label} balance"),
                source,
            })?;

        controls.push(CollateralControl {
            market_index: index,
            label,
            decimals: market.decimals,
            original_balance,
            adjustment,
            target_balance: adjustment.target(original_balance),
        });
    }
    Ok(controls)
}

fn from_price_precision(price: i64) -> f64 {
    price as f64 / PRICE_PRECISION as f64
}

fn from_token_precision(tokens: i128, decimals: u32) -> f64 {
    tokens as f64 / 10_f64.powi(decimals as i32)
}
