pub mod adjust;
pub mod grouping;
pub mod overrides;

pub use adjust::{
    clamp_percent, percent_to_value, value_to_percent, AdjustError, Adjustment, AdjustmentMode,
    MIN_PERCENT_CHANGE,
};
pub use grouping::{MarketKind, OracleGroup, OracleGroups, OracleMember};
pub use overrides::{
    apply_collateral_overrides, apply_price_overrides, rescale_scaled_balance, simulate,
    AppliedOverrides, CollateralOverride, OverrideSet, PriceOverride,
};
