use std::{
    env,
    net::{AddrParseError, Ipv4Addr, SocketAddr},
};

use reqwest::Url;
use thiserror::Error;

const DEFAULT_LISTEN_PORT: u16 = 8080;
const LISTEN_ADDR_KEY: &str = "LIQCALC_SERVER_ADDR";
const GATEWAY_URL_KEY: &str = "LIQCALC_GATEWAY_URL";
const FALLBACK_GATEWAY_URL_KEY: &str = "ANCHOR_PROVIDER_URL";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub gateway_url: Url,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LIQCALC_SERVER_ADDR is not a valid socket address: {0}")]
    InvalidListenAddr(#[source] AddrParseError),
    #[error("LIQCALC_GATEWAY_URL (or ANCHOR_PROVIDER_URL) must be set")]
    MissingGatewayUrl,
    #[error("{key} is not a valid URL: {reason}")]
    InvalidGatewayUrl { key: &'static str, reason: String },
    #[error("{key} must use http or https, got {scheme}")]
    UnsupportedGatewayScheme { key: &'static str, scheme: String },
    #[error("LIQCALC_SERVER_ADDR contains non-unicode data")]
    NonUnicodeListenAddr,
    #[error("{0} contains non-unicode data")]
    NonUnicodeGatewayUrl(&'static str),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = match env::var(LISTEN_ADDR_KEY) {
            Ok(value) => value.parse().map_err(ConfigError::InvalidListenAddr)?,
            Err(env::VarError::NotPresent) => {
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT))
            }
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::NonUnicodeListenAddr);
            }
        };

        let (key, raw) = match read_optional(GATEWAY_URL_KEY)? {
            Some(value) => (GATEWAY_URL_KEY, value),
            None => match read_optional(FALLBACK_GATEWAY_URL_KEY)? {
                Some(value) => (FALLBACK_GATEWAY_URL_KEY, value),
                None => return Err(ConfigError::MissingGatewayUrl),
            },
        };
        let gateway_url = parse_gateway_url(key, &raw)?;

        Ok(Self {
            listen_addr,
            gateway_url,
        })
    }
}

fn read_optional(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicodeGatewayUrl(key)),
    }
}

fn parse_gateway_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidGatewayUrl {
        key,
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::UnsupportedGatewayScheme {
            key,
            scheme: scheme.to_owned(),
        }),
    }
}
