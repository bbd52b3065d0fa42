use std::sync::Arc;

use axum::{routing::get, Router};
use calc::Calculator;

use crate::{config::Config, gateway::GatewayClient};

pub fn calculator(config: &Config) -> Calculator {
    let gateway = Arc::new(GatewayClient::new(config.gateway_url.clone()));
    Calculator::new(gateway.clone(), gateway)
}

pub fn build_app(calculator: Calculator) -> Router {
    api::app(calculator).route("/health", get(healthcheck))
}

async fn healthcheck() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use calc::{
        testing::{InMemorySource, RatioRiskModel},
        Calculator,
    };
    use reqwest::Url;
    use snapshot::MarketCache;
    use tower::ServiceExt;

    use crate::config::Config;

    #[tokio::test]
    async fn server_healthcheck_responds_ok() {
        let calculator = Calculator::new(
            Arc::new(InMemorySource::new(MarketCache::default())),
            Arc::new(RatioRiskModel::default()),
        );
        let app = super::build_app(calculator);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gateway_backed_app_serves_ui_without_contacting_gateway() {
        let config = Config {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            gateway_url: Url::parse("http://127.0.0.1:9").unwrap(),
        };
        let app = super::build_app(super::calculator(&config));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
