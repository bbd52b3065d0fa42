use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A position cannot be worth less than nothing.
pub const MIN_PERCENT_CHANGE: f64 = -100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    #[default]
    Value,
    Percentage,
}

impl AdjustmentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Percentage => "percentage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdjustError {
    #[error("adjustment input must be a finite number")]
    NonFinite,
}

/// What the operator entered for one price or balance widget, in the mode it
/// was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "amount", rename_all = "snake_case")]
pub enum Adjustment {
    Value(f64),
    Percentage(f64),
}

impl Adjustment {
    /// Untouched widget: the original value, or no change.
    pub fn seed(mode: AdjustmentMode, original: f64) -> Self {
        match mode {
            AdjustmentMode::Value => Self::Value(original),
            AdjustmentMode::Percentage => Self::Percentage(0.0),
        }
    }

    /// Validates raw widget input for `mode`. Percentages below the floor
    /// are raised to it.
    pub fn from_input(mode: AdjustmentMode, raw: f64) -> Result<Self, AdjustError> {
        if !raw.is_finite() {
            return Err(AdjustError::NonFinite);
        }

        Ok(match mode {
            AdjustmentMode::Value => Self::Value(raw),
            AdjustmentMode::Percentage => Self::Percentage(clamp_percent(raw)),
        })
    }

    pub fn mode(self) -> AdjustmentMode {
        match self {
            Self::Value(_) => AdjustmentMode::Value,
            Self::Percentage(_) => AdjustmentMode::Percentage,
        }
    }

    /// The number shown in the widget.
    pub fn amount(self) -> f64 {
        match self {
            Self::Value(value) | Self::Percentage(value) => value,
        }
    }

    /// Re-expresses this adjustment in `mode` against `original`, so toggling
    /// modes keeps the simulated target where it was.
    pub fn in_mode(self, mode: AdjustmentMode, original: f64) -> Self {
        match (self, mode) {
            (Self::Value(value), AdjustmentMode::Percentage) => {
                Self::Percentage(clamp_percent(value_to_percent(original, value)))
            }
            (Self::Percentage(pct), AdjustmentMode::Value) => {
                Self::Value(percent_to_value(original, pct))
            }
            (same, _) => same,
        }
    }

    /// Absolute simulated value.
    pub fn target(self, original: f64) -> f64 {
        match self {
            Self::Value(value) => value,
            Self::Percentage(pct) => percent_to_value(original, pct),
        }
    }
}

pub fn percent_to_value(original: f64, pct: f64) -> f64 {
    original * (1.0 + pct / 100.0)
}

/// A zero original has no meaningful relative change and maps to 0 %.
pub fn value_to_percent(original: f64, value: f64) -> f64 {
    if original == 0.0 {
        return 0.0;
    }
    (value / original - 1.0) * 100.0
}

pub fn clamp_percent(pct: f64) -> f64 {
    pct.max(MIN_PERCENT_CHANGE)
}
