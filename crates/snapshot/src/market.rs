use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::oracle::{OracleId, OraclePriceData, OracleSource};

pub const MARKET_NAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotMarket {
    pub market_index: u16,
    pub name: [u8; MARKET_NAME_LEN],
    pub oracle: String,
    pub oracle_source: OracleSource,
    pub decimals: u32,
    pub cumulative_deposit_interest: u128,
    pub cumulative_borrow_interest: u128,
}

impl SpotMarket {
    pub fn name(&self) -> String {
        decode_name(&self.name)
    }

    pub fn oracle_id(&self) -> OracleId {
        OracleId::new(self.oracle.clone(), self.oracle_source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerpMarket {
    pub market_index: u16,
    pub name: [u8; MARKET_NAME_LEN],
    pub oracle: String,
    pub oracle_source: OracleSource,
}

impl PerpMarket {
    pub fn name(&self) -> String {
        decode_name(&self.name)
    }

    pub fn oracle_id(&self) -> OracleId {
        OracleId::new(self.oracle.clone(), self.oracle_source)
    }
}

/// Every market account and oracle record the calculator needs, as of one fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketCache {
    pub spot_markets: BTreeMap<u16, SpotMarket>,
    pub perp_markets: BTreeMap<u16, PerpMarket>,
    pub oracle_price_data: BTreeMap<OracleId, OraclePriceData>,
}

impl MarketCache {
    pub fn spot_market(&self, market_index: u16) -> Option<&SpotMarket> {
        self.spot_markets.get(&market_index)
    }

    pub fn perp_market(&self, market_index: u16) -> Option<&PerpMarket> {
        self.perp_markets.get(&market_index)
    }

    pub fn oracle_price(&self, oracle_id: &OracleId) -> Option<&OraclePriceData> {
        self.oracle_price_data.get(oracle_id)
    }

    pub fn oracle_price_mut(&mut self, oracle_id: &OracleId) -> Option<&mut OraclePriceData> {
        self.oracle_price_data.get_mut(oracle_id)
    }
}

/// Market names are stored on-chain as NUL padded fixed-width byte arrays.
pub fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

pub fn encode_name(name: &str) -> [u8; MARKET_NAME_LEN] {
    let mut raw = [b' '; MARKET_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MARKET_NAME_LEN);
    raw[..len].copy_from_slice(&bytes[..len]);
    raw
}
