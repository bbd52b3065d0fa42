//! HTTP client for the account-data gateway. One base URL serves both the
//! account reads and the protocol risk functions.

use async_trait::async_trait;
use calc::{AccountSource, Authority, RiskModel, SourceError};
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snapshot::{MarketCache, Snapshot, UserAccount, UserStats};

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base: Url,
}

#[derive(Serialize)]
struct LiquidationPriceRequest<'a> {
    snapshot: &'a Snapshot,
    market_index: u16,
}

#[derive(Deserialize)]
struct LiquidationPriceResponse {
    price: i64,
}

#[derive(Serialize)]
struct HealthRequest<'a> {
    snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
struct HealthResponse {
    health: u8,
}

impl GatewayClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        tracing::debug!(%url, "gateway GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| SourceError::Network(format!("GET {url}: {err}")))?;
        read_json(&url, response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, SourceError> {
        tracing::debug!(%url, "gateway POST");
        let response = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|err| SourceError::Network(format!("POST {url}: {err}")))?;
        read_json(&url, response).await
    }

    async fn liquidation_price(
        &self,
        kind: &str,
        snapshot: &Snapshot,
        market_index: u16,
    ) -> Result<i64, SourceError> {
        let response: LiquidationPriceResponse = self
            .post(
                self.endpoint(&["risk", kind]),
                &LiquidationPriceRequest {
                    snapshot,
                    market_index,
                },
            )
            .await?;
        Ok(response.price)
    }
}

async fn read_json<T: DeserializeOwned>(
    url: &Url,
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| SourceError::Network(format!("reading body from {url}: {err}")))?;
    interpret(url, status, &body)
}

fn interpret<T: DeserializeOwned>(url: &Url, status: StatusCode, body: &str) -> Result<T, SourceError> {
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(url.path().to_owned()));
    }
    if !status.is_success() {
        return Err(SourceError::Network(format!(
            "http request failed, status: {status}, body: {body}"
        )));
    }
    serde_json::from_str(body)
        .map_err(|err| SourceError::Decode(format!("{err}, body: {body}")))
}

#[async_trait]
impl AccountSource for GatewayClient {
    async fn fetch_market_cache(&self) -> Result<MarketCache, SourceError> {
        self.get(self.endpoint(&["markets"])).await
    }

    async fn fetch_user_stats(&self, authority: &Authority) -> Result<UserStats, SourceError> {
        self.get(self.endpoint(&["user-stats", authority.as_str()]))
            .await
    }

    async fn fetch_user(
        &self,
        authority: &Authority,
        sub_account_id: u16,
    ) -> Result<Option<UserAccount>, SourceError> {
        let sub_account = sub_account_id.to_string();
        match self
            .get(self.endpoint(&["users", authority.as_str(), &sub_account]))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl RiskModel for GatewayClient {
    async fn spot_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError> {
        self.liquidation_price("spot-liquidation-price", snapshot, market_index)
            .await
    }

    async fn perp_liq_price(&self, snapshot: &Snapshot, market_index: u16) -> Result<i64, SourceError> {
        self.liquidation_price("perp-liquidation-price", snapshot, market_index)
            .await
    }

    async fn health(&self, snapshot: &Snapshot) -> Result<u8, SourceError> {
        let response: HealthResponse = self
            .post(self.endpoint(&["risk", "health"]), &HealthRequest { snapshot })
            .await?;
        Ok(response.health.min(100))
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use calc::{AccountSource, Authority, RiskModel, SourceError};
    use reqwest::Url;
    use serde_json::{json, Value};
    use snapshot::{
        fixtures::{self, MarketCacheExt},
        MarketCache, Snapshot, UserStats,
    };
    use tokio::net::TcpListener;

    use super::{interpret, GatewayClient};

    const ALICE: &str = "4rmhwM5xjMnY5pGzVkk8MXRQYHg5jjgLqdM4Q8TGwvBW";

    fn client(base: &str) -> GatewayClient {
        GatewayClient::new(Url::parse(base).unwrap())
    }

    fn markets() -> MarketCache {
        MarketCache::default()
            .with_perp(fixtures::perp_market(0, "SOL-PERP", "sol-feed"))
            .with_price("sol-feed", 100.0)
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn fake_gateway() -> Router {
        Router::new()
            .route("/markets", get(|| async { Json(markets()) }))
            .route(
                "/user-stats/:authority",
                get(|Path(authority): Path<String>| async move {
                    if authority == ALICE {
                        Ok(Json(UserStats {
                            authority,
                            number_of_sub_accounts_created: 2,
                        }))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/users/:authority/:sub_account_id",
                get(|Path((authority, sub_account_id)): Path<(String, u16)>| async move {
                    if sub_account_id == 0 {
                        Ok(Json(fixtures::user(&authority, 0)))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/risk/perp-liquidation-price",
                post(|Json(body): Json<Value>| async move {
                    let snapshot: Snapshot = serde_json::from_value(body["snapshot"].clone()).unwrap();
                    let index = body["market_index"].as_u64().unwrap() as u16;
                    let price = snapshot.oracle_for_perp_market(index).unwrap().price / 2;
                    Json(json!({ "price": price }))
                }),
            )
            .route(
                "/risk/health",
                post(|| async { Json(json!({ "health": 250 })) }),
            )
            .route(
                "/risk/spot-liquidation-price",
                post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "risk engine down") }),
            )
    }

    #[test]
    fn endpoint_appends_segments_to_base_path() {
        assert_eq!(
            client("http://gateway.local").endpoint(&["markets"]).as_str(),
            "http://gateway.local/markets"
        );
        assert_eq!(
            client("http://gateway.local/api/").endpoint(&["users", "abc", "0"]).as_str(),
            "http://gateway.local/api/users/abc/0"
        );
        assert_eq!(
            client("http://gateway.local/api").endpoint(&["risk", "health"]).as_str(),
            "http://gateway.local/api/risk/health"
        );
    }

    #[test]
    fn status_and_body_map_to_source_errors() {
        let url = Url::parse("http://gateway.local/markets").unwrap();

        let not_found = interpret::<Value>(&url, StatusCode::NOT_FOUND, "").unwrap_err();
        let failed = interpret::<Value>(&url, StatusCode::BAD_GATEWAY, "upstream").unwrap_err();
        let garbled = interpret::<MarketCache>(&url, StatusCode::OK, "{").unwrap_err();
        let ok: Value = interpret(&url, StatusCode::OK, "{\"a\":1}").unwrap();

        assert_eq!(not_found, SourceError::NotFound("/markets".to_string()));
        assert!(matches!(failed, SourceError::Network(message) if message.contains("upstream")));
        assert!(matches!(garbled, SourceError::Decode(_)));
        assert_eq!(ok, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn reads_accounts_from_gateway() {
        let addr = serve(fake_gateway()).await;
        let gateway = client(&format!("http://{addr}"));
        let alice = Authority::parse(ALICE).unwrap().unwrap();

        let cache = gateway.fetch_market_cache().await.unwrap();
        let stats = gateway.fetch_user_stats(&alice).await.unwrap();
        let user = gateway.fetch_user(&alice, 0).await.unwrap();
        let missing = gateway.fetch_user(&alice, 1).await.unwrap();

        assert_eq!(cache, markets());
        assert_eq!(stats.number_of_sub_accounts_created, 2);
        assert_eq!(user.unwrap().authority, ALICE);
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unknown_authority_is_not_found() {
        let addr = serve(fake_gateway()).await;
        let gateway = client(&format!("http://{addr}"));
        let bob = Authority::parse("11111111111111111111111111111111").unwrap().unwrap();

        let err = gateway.fetch_user_stats(&bob).await.unwrap_err();

        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn risk_calls_send_the_working_snapshot() {
        let addr = serve(fake_gateway()).await;
        let gateway = client(&format!("http://{addr}"));
        let mut snapshot = Snapshot::new(markets(), fixtures::user(ALICE, 0));
        snapshot.user.perp_positions.push(fixtures::perp_position(0, 1.0));
        let overridden = markets().with_price("sol-feed", 80.0);
        snapshot.markets = overridden;

        let price = gateway.perp_liq_price(&snapshot, 0).await.unwrap();
        let health = gateway.health(&snapshot).await.unwrap();
        let spot = gateway.spot_liq_price(&snapshot, 1).await.unwrap_err();

        assert_eq!(price, 40_000_000);
        assert_eq!(health, 100);
        assert!(matches!(spot, SourceError::Network(message) if message.contains("risk engine down")));
    }
}
