//! Wire shape of a rendered page, rounded for display.

use calc::{CollateralControl, Notice, Page, PageStatus, PerpRow, PriceControl, SpotRow};
use serde::Serialize;
use whatif::AdjustmentMode;

const USD_DECIMALS: u32 = 2;
const BASE_DECIMALS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderResponse {
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    pub sub_accounts: Vec<u16>,
    pub selected_sub_account: Option<u16>,
    pub mode: AdjustmentMode,
    pub price_controls: Vec<PriceControl>,
    pub collateral_controls: Vec<CollateralControl>,
    pub spot_rows: Vec<SpotRow>,
    pub perp_rows: Vec<PerpRow>,
    /// Step for collateral inputs, from the finest spot market on the page.
    pub balance_decimals: u32,
    pub health: Option<u8>,
}

impl From<Page> for RenderResponse {
    fn from(page: Page) -> Self {
        Self {
            status: page.status,
            notice: page.notice,
            sub_accounts: page.sub_accounts,
            selected_sub_account: page.selected_sub_account,
            mode: page.mode,
            price_controls: page.price_controls,
            collateral_controls: page.collateral_controls,
            spot_rows: page.spot_rows.into_iter().map(round_spot_row).collect(),
            perp_rows: page.perp_rows.into_iter().map(round_perp_row).collect(),
            balance_decimals: page.max_spot_decimals,
            health: page.health,
        }
    }
}

fn round_spot_row(row: SpotRow) -> SpotRow {
    SpotRow {
        balance: round_to(row.balance, row.decimals),
        net_value: round_to(row.net_value, USD_DECIMALS),
        price: round_to(row.price, USD_DECIMALS),
        liquidation_price: round_to(row.liquidation_price, USD_DECIMALS),
        ..row
    }
}

fn round_perp_row(row: PerpRow) -> PerpRow {
    PerpRow {
        base_size: round_to(row.base_size, BASE_DECIMALS),
        notional: round_to(row.notional, USD_DECIMALS),
        price: round_to(row.price, USD_DECIMALS),
        liquidation_price: round_to(row.liquidation_price, USD_DECIMALS),
        ..row
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10_f64.powi(decimals.min(15) as i32);
    (value * scale).round() / scale
}
