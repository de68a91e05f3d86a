//! reqwest-backed [`LedgerGateway`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use bwallet_core::LedgerGateway;
use bwallet_core::coin::Coin;
use bwallet_core::error::GatewayError;
use bwallet_core::types::{
    BroadcastReceipt, SignatureSet, Subchain, TxRequest, UnsignedTransaction, WalletDetails,
    wallet_name_from_mpub,
};

use crate::config::GatewayConfig;
use crate::wire::{
    NewTx, RegisterHdWallet, RegisteredWallet, WalletAddrs, error_message, parse_broadcast,
    parse_skeleton, signed_skeleton,
};

pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

fn transport_error(step: &'static str, e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(step.to_string())
    } else if e.is_decode() {
        GatewayError::Decode(format!("{step}: {e}"))
    } else {
        GatewayError::Network(format!("{step}: {e}"))
    }
}

fn status_error(status: StatusCode, body: String) -> GatewayError {
    let code = status.as_u16();
    if status.is_client_error() && code != 429 {
        if let Some(msg) = error_message(&body) {
            return GatewayError::Rejected(msg);
        }
    }
    GatewayError::Http { status: code, body }
}

fn decode<T: serde::de::DeserializeOwned>(step: &'static str, body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(format!("{step}: {e}")))
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("build http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn url(&self, coin: Coin, path: &str) -> String {
        format!("{}{}{}", self.config.base_url, coin.api_path(), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.query(&[("token", token)]),
            None => request,
        }
    }

    /// Send a request and read the whole body. Non-2xx statuses are returned, not raised.
    async fn exchange(
        &self,
        step: &'static str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), GatewayError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(step, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(step, e))?;
        tracing::debug!(step, status = status.as_u16(), bytes = body.len(), "gateway response");
        Ok((status, body))
    }

    async fn exchange_ok(&self, step: &'static str, request: RequestBuilder) -> Result<String, GatewayError> {
        let (status, body) = self.exchange(step, request).await?;
        if !status.is_success() {
            return Err(status_error(status, body));
        }
        Ok(body)
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn register_wallet(
        &self,
        coin: Coin,
        master_public_key: &str,
        subchains: &[Subchain],
    ) -> Result<String, GatewayError> {
        let name = wallet_name_from_mpub(master_public_key, subchains);
        let body = RegisterHdWallet {
            name: &name,
            extended_public_key: master_public_key,
            subchain_indexes: subchains.iter().map(|s| s.index()).collect(),
        };
        let request = self.client.post(self.url(coin, "/wallets/hd")).json(&body);
        let (status, text) = self.exchange("register wallet", request).await?;

        if status.is_success() {
            let registered: RegisteredWallet = decode("register wallet", &text)?;
            return Ok(registered.name);
        }
        let exists = status == StatusCode::CONFLICT
            || error_message(&text).is_some_and(|m| m.contains("already exists"));
        if exists {
            tracing::debug!(wallet = %name, "wallet already registered");
            return Ok(name);
        }
        Err(status_error(status, text))
    }

    async fn wallet_details(
        &self,
        coin: Coin,
        wallet_name: &str,
    ) -> Result<WalletDetails, GatewayError> {
        let request = self.client.get(self.url(coin, &format!("/addrs/{wallet_name}")));
        let body = self.exchange_ok("wallet details", request).await?;
        let addrs: WalletAddrs = decode("wallet details", &body)?;
        Ok(addrs.into_details(wallet_name))
    }

    async fn build_unsigned_tx(
        &self,
        request: &TxRequest,
    ) -> Result<UnsignedTransaction, GatewayError> {
        let body = NewTx::from_request(request, self.config.api_token.as_deref());
        let http = self
            .client
            .post(self.url(request.coin, "/txs/new"))
            .query(&[("includeToSignTx", "true")])
            .json(&body);
        let text = self.exchange_ok("build unsigned tx", http).await?;
        parse_skeleton(decode("build unsigned tx", &text)?)
    }

    async fn broadcast_signed_tx(
        &self,
        coin: Coin,
        unsigned: &UnsignedTransaction,
        signatures: &SignatureSet,
    ) -> Result<BroadcastReceipt, GatewayError> {
        let request = self
            .client
            .post(self.url(coin, "/txs/send"))
            .json(&signed_skeleton(unsigned, signatures));
        let text = self.exchange_ok("broadcast", request).await?;
        let raw: Value = decode("broadcast", &text)?;
        parse_broadcast(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    type Registered = Arc<Mutex<HashSet<String>>>;

    async fn register(
        State(registered): State<Registered>,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        let name = body["name"].as_str().unwrap_or_default().to_string();
        if registered.lock().unwrap().insert(name.clone()) {
            (AxumStatus::CREATED, Json(json!({"name": name})))
        } else {
            (AxumStatus::CONFLICT, Json(json!({"error": format!("Wallet {name} already exists")})))
        }
    }

    async fn addrs(
        Path(name): Path<String>,
        Query(query): Query<HashMap<String, String>>,
    ) -> (AxumStatus, Json<Value>) {
        if query.get("token").map(String::as_str) != Some("tok") {
            return (AxumStatus::UNAUTHORIZED, Json(json!({"error": "missing token"})));
        }
        (
            AxumStatus::OK,
            Json(json!({"wallet": {"name": name, "addresses": ["1a"]}, "balance": 42})),
        )
    }

    async fn slow_send() -> Json<Value> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!({"tx": {"hash": "0".repeat(64)}}))
    }

    async fn broken_new() -> (AxumStatus, String) {
        (AxumStatus::SERVICE_UNAVAILABLE, "maintenance".to_string())
    }

    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/v1/btc/main/wallets/hd", post(register))
            .route("/v1/btc/main/addrs/:name", get(addrs))
            .route("/v1/btc/main/txs/send", post(slow_send))
            .route("/v1/btc/main/txs/new", post(broken_new))
            .with_state(Registered::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn gateway(base: &str) -> HttpGateway {
        let config = GatewayConfig::new(base)
            .with_token(Some("tok".into()))
            .with_timeout(Duration::from_millis(300));
        HttpGateway::new(config).unwrap()
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let gw = gateway(&spawn_stub().await);
        let first = gw.register_wallet(Coin::Btc, "xpub-demo", &Subchain::ALL).await.unwrap();
        let second = gw.register_wallet(Coin::Btc, "xpub-demo", &Subchain::ALL).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, wallet_name_from_mpub("xpub-demo", &Subchain::ALL));
    }

    #[tokio::test]
    async fn details_send_token() {
        let gw = gateway(&spawn_stub().await);
        let details = gw.wallet_details(Coin::Btc, "Xabc").await.unwrap();
        assert_eq!(details.balance, 42);
        assert!(details.used_addresses.contains("1a"));
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let base = spawn_stub().await;
        let gw = HttpGateway::new(GatewayConfig::new(&base)).unwrap();
        let err = gw.wallet_details(Coin::Btc, "Xabc").await.unwrap_err();
        assert_eq!(err, GatewayError::Rejected("missing token".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn slow_gateway_times_out() {
        let gw = gateway(&spawn_stub().await);
        let unsigned = UnsignedTransaction {
            skeleton: json!({"tx": {}}),
            input_addresses: vec![],
            outputs: vec![],
            to_sign: vec![],
            to_sign_tx: vec![],
        };
        let err = gw
            .broadcast_signed_tx(Coin::Btc, &unsigned, &SignatureSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let gw = gateway(&spawn_stub().await);
        let request = TxRequest {
            coin: Coin::Btc,
            inputs: vec![],
            outputs: vec![],
            change_address: None,
        };
        let err = gw.build_unsigned_tx(&request).await.unwrap_err();
        assert_eq!(err, GatewayError::Http { status: 503, body: "maintenance".into() });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_network_error() {
        let gw = gateway("http://127.0.0.1:1");
        let err = gw.wallet_details(Coin::Btc, "Xabc").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
