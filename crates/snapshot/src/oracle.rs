use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OracleSource {
    Pyth,
    Pyth1K,
    Pyth1M,
    PythPull,
    Pyth1KPull,
    Pyth1MPull,
    Switchboard,
    QuoteAsset,
    PythStableCoin,
    PythStableCoinPull,
    Prelaunch,
    SwitchboardOnDemand,
    PythLazer,
    PythLazer1K,
    PythLazer1M,
    PythLazerStableCoin,
}

impl OracleSource {
    const ALL: [Self; 16] = [
        Self::Pyth,
        Self::Pyth1K,
        Self::Pyth1M,
        Self::PythPull,
        Self::Pyth1KPull,
        Self::Pyth1MPull,
        Self::Switchboard,
        Self::QuoteAsset,
        Self::PythStableCoin,
        Self::PythStableCoinPull,
        Self::Prelaunch,
        Self::SwitchboardOnDemand,
        Self::PythLazer,
        Self::PythLazer1K,
        Self::PythLazer1M,
        Self::PythLazerStableCoin,
    ];

    /// Stable numeric id used when keying oracle records.
    pub fn as_num(self) -> u8 {
        match self {
            Self::Pyth => 0,
            Self::Pyth1K => 1,
            Self::Pyth1M => 2,
            Self::PythPull => 3,
            Self::Pyth1KPull => 4,
            Self::Pyth1MPull => 5,
            Self::Switchboard => 6,
            Self::QuoteAsset => 7,
            Self::PythStableCoin => 8,
            Self::PythStableCoinPull => 9,
            Self::Prelaunch => 10,
            Self::SwitchboardOnDemand => 11,
            Self::PythLazer => 12,
            Self::PythLazer1K => 13,
            Self::PythLazer1M => 14,
            Self::PythLazerStableCoin => 15,
        }
    }

    pub fn from_num(num: u8) -> Option<Self> {
        Self::ALL.get(usize::from(num)).copied()
    }
}

/// Identifies one price feed: the oracle account plus how it is read.
///
/// Several markets may point at the same feed, so overrides are keyed by this
/// rather than by market index. The string form is `"{address}-{source_num}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OracleId {
    address: String,
    source: OracleSource,
}

impl OracleId {
    pub fn new(address: impl Into<String>, source: OracleSource) -> Self {
        Self {
            address: address.into(),
            source,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn source(&self) -> OracleSource {
        self.source
    }
}

impl fmt::Display for OracleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.address, self.source.as_num())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseOracleIdError {
    #[error("oracle id must look like <address>-<source>")]
    MissingSeparator,
    #[error("oracle id has an empty address")]
    EmptyAddress,
    #[error("oracle id has an unknown source number")]
    InvalidSource,
}

impl FromStr for OracleId {
    type Err = ParseOracleIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (address, source) = value
            .rsplit_once('-')
            .ok_or(ParseOracleIdError::MissingSeparator)?;
        if address.is_empty() {
            return Err(ParseOracleIdError::EmptyAddress);
        }
        let source = source
            .parse::<u8>()
            .ok()
            .and_then(OracleSource::from_num)
            .ok_or(ParseOracleIdError::InvalidSource)?;

        Ok(Self::new(address, source))
    }
}

impl TryFrom<String> for OracleId {
    type Error = ParseOracleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OracleId> for String {
    fn from(value: OracleId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePriceData {
    pub price: i64,
    pub slot: u64,
    pub confidence: u64,
    pub has_sufficient_number_of_data_points: bool,
}

impl OraclePriceData {
    pub fn with_price(price: i64) -> Self {
        Self {
            price,
            slot: 0,
            confidence: 0,
            has_sufficient_number_of_data_points: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{OracleId, OracleSource, ParseOracleIdError};

    #[test]
    fn oracle_id_renders_address_and_source_number() {
        let id = OracleId::new("BAtFj4kQttZRVep3UZS2aZRDixkGYgWsbqTBVDbnSsPF", OracleSource::PythPull);

        assert_eq!(id.to_string(), "BAtFj4kQttZRVep3UZS2aZRDixkGYgWsbqTBVDbnSsPF-3");
    }

    #[test]
    fn oracle_id_parses_its_own_rendering() {
        let id = OracleId::new("3m6i4RFWEDw2Ft4tFHPJtYgmpPe21k56M3FHeWYrgGBz", OracleSource::QuoteAsset);

        let parsed: OracleId = id.to_string().parse().unwrap();

        assert_eq!(parsed, id);
    }

    #[test]
    fn oracle_id_rejects_unknown_source_number() {
        let err = "abc-99".parse::<OracleId>().unwrap_err();

        assert_eq!(err, ParseOracleIdError::InvalidSource);
    }

    #[test]
    fn oracle_id_rejects_missing_separator() {
        let err = "abc".parse::<OracleId>().unwrap_err();

        assert_eq!(err, ParseOracleIdError::MissingSeparator);
    }

    #[test]
    fn malformed_oracle_id_in_json_reports_the_reason() {
        let err = serde_json::from_value::<OracleId>(json!("-3")).unwrap_err();
        let boxed: Box<dyn std::error::Error> = Box::new(ParseOracleIdError::EmptyAddress);

        assert!(err.to_string().contains("oracle id has an empty address"));
        assert_eq!(boxed.to_string(), "oracle id has an empty address");
    }

    #[test]
    fn oracle_id_serializes_as_plain_string() {
        let id = OracleId::new("feed", OracleSource::Switchboard);

        assert_eq!(serde_json::to_value(&id).unwrap(), json!("feed-6"));
    }

    #[test]
    fn source_numbers_are_stable() {
        for num in 0..16 {
            let source = OracleSource::from_num(num).unwrap();
            assert_eq!(source.as_num(), num);
        }
        assert_eq!(OracleSource::from_num(16), None);
    }
}
