use serde::Serialize;
use snapshot::OracleId;
use whatif::{Adjustment, AdjustmentMode, OracleMember};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    AwaitingAddress,
    NoData,
    NoPositions,
    Ready,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    /// Error chain, for debugging failed fetches.
    pub detail: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceControl {
    pub oracle_id: OracleId,
    pub label: String,
    pub members: Vec<OracleMember>,
    pub original_price: f64,
    pub adjustment: Adjustment,
    pub target_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollateralControl {
    pub market_index: u16,
    pub label: String,
    pub decimals: u32,
    pub original_balance: f64,
    pub adjustment: Adjustment,
    pub target_balance: f64,
}

/// One spot line, full precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotRow {
    pub market_index: u16,
    pub name: String,
    pub decimals: u32,
    pub balance: f64,
    pub net_value: f64,
    pub price: f64,
    pub liquidation_price: f64,
}

/// One perp line, full precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerpRow {
    pub market_index: u16,
    pub name: String,
    pub base_size: f64,
    pub notional: f64,
    pub price: f64,
    pub liquidation_price: f64,
}

/// The result of one pass: what the operator sees next.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub status: PageStatus,
    pub notice: Option<Notice>,
    pub sub_accounts: Vec<u16>,
    pub selected_sub_account: Option<u16>,
    pub mode: AdjustmentMode,
    pub price_controls: Vec<PriceControl>,
    pub collateral_controls: Vec<CollateralControl>,
    pub spot_rows: Vec<SpotRow>,
    pub perp_rows: Vec<PerpRow>,
    pub max_spot_decimals: u32,
    pub health: Option<u8>,
}

impl Page {
    pub fn empty(status: PageStatus, mode: AdjustmentMode) -> Self {
        Self {
            status,
            notice: None,
            sub_accounts: Vec::new(),
            selected_sub_account: None,
            mode,
            price_controls: Vec::new(),
            collateral_controls: Vec::new(),
            spot_rows: Vec::new(),
            perp_rows: Vec::new(),
            max_spot_decimals: 0,
            health: None,
        }
    }

    pub fn with_notice(mut self, notice: Notice) -> Self {
        self.notice = Some(notice);
        self
    }

    pub fn with_sub_accounts(mut self, sub_accounts: Vec<u16>, selected: Option<u16>) -> Self {
        self.sub_accounts = sub_accounts;
        self.selected_sub_account = selected;
        self
    }
}
