pub mod fixtures;
mod market;
mod oracle;
mod snapshot;
mod user;

pub use market::{decode_name, encode_name, MarketCache, PerpMarket, SpotMarket, MARKET_NAME_LEN};
pub use oracle::{OracleId, OraclePriceData, OracleSource, ParseOracleIdError};
pub use snapshot::{
    signed_token_amount, Snapshot, BASE_PRECISION, PRICE_PRECISION, SPOT_BALANCE_PRECISION,
    SPOT_CUMULATIVE_INTEREST_PRECISION,
};
pub use user::{PerpPosition, SpotBalanceType, SpotPosition, UserAccount, UserStats};
