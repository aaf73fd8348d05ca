use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::domain::WalletIdentity;
use crate::error::LegError;

pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// The aggregator as seen by a leg: quote a pair, then turn the quote into an
/// unsigned transaction for a wallet.
#[async_trait]
pub trait SwapVenue: Send + Sync {
    async fn get_quote(&self, req: QuoteRequest) -> Result<SwapQuote, LegError>;

    async fn build_swap_transaction(
        &self,
        quote: &SwapQuote,
        wallet: &WalletIdentity,
        opts: SwapOptions,
    ) -> Result<SwapResponse, LegError>;
}

/// Wallet options for one swap build. Unset fields use the configured value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapOptions {
    #[serde(rename = "wrapAndUnwrapSol", default)]
    pub wrap_and_unwrap_sol: Option<bool>,
    #[serde(rename = "useSharedAccounts", default)]
    pub use_shared_accounts: Option<bool>,
}

#[derive(Clone)]
pub struct JupiterClient {
    base_url: String,
    http: Client,
    fee_account: Option<String>,
    wrap_and_unwrap_sol: bool,
    use_shared_accounts: bool,
}

impl JupiterClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: cfg.jupiter_base_url.trim_end_matches('/').to_string(),
            http,
            fee_account: cfg.fee_account.clone(),
            wrap_and_unwrap_sol: cfg.wrap_and_unwrap_sol,
            use_shared_accounts: cfg.use_shared_accounts,
        })
    }

    pub async fn quote(&self, req: QuoteRequest) -> Result<SwapQuote, LegError> {
        let url = format!("{}/quote", self.base_url);
        debug!(input = %req.input_mint, output = %req.output_mint, amount = %req.amount, slippage_bps = req.slippage_bps, "jupiter.quote");
        let resp = self
            .http
            .get(url)
            .query(&req)
            .send()
            .await
            .map_err(|e| LegError::quote(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LegError::quote(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            return Err(LegError::quote(Some(status.as_u16()), body));
        }
        parse_quote_body(&body).map_err(|msg| LegError::quote(Some(status.as_u16()), msg))
    }

    pub async fn swap(&self, req: SwapRequest) -> Result<SwapResponse, LegError> {
        let url = format!("{}/swap", self.base_url);
        debug!(user = %req.user_public_key, "jupiter.swap");
        let resp = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| LegError::swap(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LegError::swap(Some(status.as_u16()), e.to_string()))?;
        if !status.is_success() {
            return Err(LegError::swap(Some(status.as_u16()), body));
        }
        parse_swap_body(&body).map_err(|msg| LegError::swap(Some(status.as_u16()), msg))
    }

    /// Swap request for `quote`; options left unset in `opts` take the
    /// configured value.
    pub fn swap_request(&self, quote: &SwapQuote, wallet: &WalletIdentity, opts: SwapOptions) -> SwapRequest {
        SwapRequest {
            quote_response: quote.clone(),
            user_public_key: wallet.to_string(),
            wrap_and_unwrap_sol: Some(opts.wrap_and_unwrap_sol.unwrap_or(self.wrap_and_unwrap_sol)),
            use_shared_accounts: Some(opts.use_shared_accounts.unwrap_or(self.use_shared_accounts)),
            fee_account: self.fee_account.clone(),
        }
    }
}

#[async_trait]
impl SwapVenue for JupiterClient {
    async fn get_quote(&self, req: QuoteRequest) -> Result<SwapQuote, LegError> {
        self.quote(req).await
    }

    async fn build_swap_transaction(
        &self,
        quote: &SwapQuote,
        wallet: &WalletIdentity,
        opts: SwapOptions,
    ) -> Result<SwapResponse, LegError> {
        self.swap(self.swap_request(quote, wallet, opts)).await
    }
}

fn parse_quote_body(body: &str) -> std::result::Result<SwapQuote, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("malformed quote body: {e}"))?;
    if let Some(err) = value.get("error") {
        return Err(error_text(err));
    }
    serde_json::from_value(value).map_err(|e| format!("malformed quote body: {e}"))
}

fn parse_swap_body(body: &str) -> std::result::Result<SwapResponse, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("malformed swap body: {e}"))?;
    if let Some(err) = value.get("error") {
        return Err(error_text(err));
    }
    let swap: SwapResponse =
        serde_json::from_value(value).map_err(|e| format!("malformed swap body: {e}"))?;
    if swap.swap_transaction.is_empty() {
        return Err("swap transaction is empty".to_string());
    }
    base64::engine::general_purpose::STANDARD
        .decode(&swap.swap_transaction)
        .map_err(|e| format!("swap transaction is not base64: {e}"))?;
    Ok(swap)
}

fn error_text(err: &serde_json::Value) -> String {
    err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    /// Amount in the input mint's minor units
    pub amount: String,
    #[serde(rename = "slippageBps")]
    pub slippage_bps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapQuote {
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "outAmount")]
    pub out_amount: String,
    #[serde(rename = "slippageBps")]
    pub slippage_bps: u64,
    #[serde(rename = "priceImpactPct", default)]
    pub price_impact_pct: String,

    /// Route plan and the rest. Kept verbatim so the swap endpoint gets back
    /// exactly what it quoted.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl SwapQuote {
    /// `priceImpactPct` is a fraction; this is the percentage.
    pub fn price_impact_percent(&self) -> f64 {
        self.price_impact_pct.trim().parse::<f64>().unwrap_or(0.0) * 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    #[serde(rename = "quoteResponse")]
    pub quote_response: SwapQuote,

    #[serde(rename = "userPublicKey")]
    pub user_public_key: String,

    #[serde(rename = "wrapAndUnwrapSol", skip_serializing_if = "Option::is_none")]
    pub wrap_and_unwrap_sol: Option<bool>,

    #[serde(rename = "useSharedAccounts", skip_serializing_if = "Option::is_none")]
    pub use_shared_accounts: Option<bool>,

    /// Integrator fee account, if any.
    #[serde(rename = "feeAccount", skip_serializing_if = "Option::is_none")]
    pub fee_account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapResponse {
    /// base64 encoded unsigned VersionedTransaction
    #[serde(rename = "swapTransaction")]
    pub swap_transaction: String,

    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

pub fn ensure_slippage_bounds(slippage_bps: u64, max_slippage_bps: u64) -> Result<()> {
    if slippage_bps == 0 {
        return Err(anyhow!("slippage_bps cannot be 0"));
    }
    if slippage_bps > max_slippage_bps {
        return Err(anyhow!(
            "slippage_bps ({slippage_bps}) exceeds max_slippage_bps ({max_slippage_bps})"
        ));
    }
    Ok(())
}

/// Base58 string that decodes to a 32-byte public key.
pub fn is_valid_solana_address(address: &str) -> bool {
    if !(32..=44).contains(&address.len()) {
        return false;
    }
    matches!(bs58::decode(address).into_vec(), Ok(bytes) if bytes.len() == 32)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    const QUOTE_BODY: &str = r#"{
        "inputMint": "So11111111111111111111111111111111111111112",
        "inAmount": "600000000000",
        "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        "outAmount": "91234567",
        "otherAmountThreshold": "90778394",
        "swapMode": "ExactIn",
        "slippageBps": 50,
        "platformFee": null,
        "priceImpactPct": "0.0012",
        "routePlan": [{"percent": 100}]
    }"#;

    #[test]
    fn quote_body_keeps_route_plan_for_swap() {
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        assert_eq!(quote.out_amount, "91234567");
        assert_eq!(quote.slippage_bps, 50);
        assert!(quote.rest.contains_key("routePlan"));

        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["otherAmountThreshold"], "90778394");
        assert_eq!(json["swapMode"], "ExactIn");
    }

    #[test]
    fn price_impact_is_scaled_to_percent() {
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        assert!((quote.price_impact_percent() - 0.12).abs() < 1e-9);
    }

    #[test]
    fn quote_body_with_error_field_is_rejected() {
        let err = parse_quote_body(r#"{"error":"Could not find any route"}"#).unwrap_err();
        assert_eq!(err, "Could not find any route");
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(parse_quote_body("<html>").is_err());
        assert!(parse_swap_body(r#"{"swapTransaction":""}"#).is_err());
        assert!(parse_swap_body(r#"{"swapTransaction":"not base64!!"}"#).is_err());
        assert!(parse_swap_body(r#"{"swapTransaction":"AQID"}"#).is_ok());
    }

    #[test]
    fn swap_request_carries_configured_options() {
        let cfg = Config {
            jupiter_base_url: "https://example.invalid/v6/".into(),
            fee_account: Some("FeeAcct".into()),
            ..Config::default()
        };
        let client = JupiterClient::from_config(&cfg).unwrap();
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        let req = client.swap_request(&quote, &WalletIdentity::new("Wallet"), SwapOptions::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["userPublicKey"], "Wallet");
        assert_eq!(json["wrapAndUnwrapSol"], true);
        assert_eq!(json["useSharedAccounts"], true);
        assert_eq!(json["feeAccount"], "FeeAcct");
        assert_eq!(json["quoteResponse"]["routePlan"][0]["percent"], 100);
        assert_eq!(client.base_url, "https://example.invalid/v6");
    }

    #[test]
    fn caller_options_override_configured_ones() {
        let client = JupiterClient::from_config(&Config::default()).unwrap();
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        let opts = SwapOptions {
            wrap_and_unwrap_sol: Some(false),
            use_shared_accounts: None,
        };
        let req = client.swap_request(&quote, &WalletIdentity::new("Wallet"), opts);
        assert_eq!(req.wrap_and_unwrap_sol, Some(false));
        assert_eq!(req.use_shared_accounts, Some(true));
    }

    /// Local stand-in for the aggregator. `/quote` and `/swap` answer with
    /// `status` and `body`; swap request bodies are recorded.
    async fn upstream(status: u16, body: &'static str) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let status = StatusCode::from_u16(status).unwrap();
        let app = Router::new()
            .route("/quote", get(move || async move { (status, body) }))
            .route(
                "/swap",
                post({
                    let seen = seen.clone();
                    move |Json(req): Json<serde_json::Value>| async move {
                        seen.lock().unwrap().push(req);
                        (status, body)
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), seen)
    }

    fn client_for(base_url: String) -> JupiterClient {
        JupiterClient::from_config(&Config { jupiter_base_url: base_url, ..Config::default() }).unwrap()
    }

    fn quote_request() -> QuoteRequest {
        QuoteRequest {
            input_mint: WRAPPED_SOL_MINT.into(),
            output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".into(),
            amount: "1000".into(),
            slippage_bps: 50,
        }
    }

    #[tokio::test]
    async fn upstream_error_status_and_body_reach_quote_error() {
        let (base, _) = upstream(503, "upstream overloaded").await;
        let err = client_for(base).quote(quote_request()).await.unwrap_err();
        assert_eq!(
            err,
            LegError::QuoteUnavailable {
                status: Some(503),
                message: "upstream overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn upstream_error_status_and_body_reach_swap_error() {
        let (base, _) = upstream(503, "upstream overloaded").await;
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        let err = client_for(base)
            .build_swap_transaction(&quote, &WalletIdentity::new("Wallet"), SwapOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LegError::SwapBuild {
                status: Some(503),
                message: "upstream overloaded".into()
            }
        );
    }

    #[tokio::test]
    async fn swap_sends_caller_options_upstream() {
        let (base, seen) = upstream(200, r#"{"swapTransaction":"AQID","lastValidBlockHeight":1}"#).await;
        let quote = parse_quote_body(QUOTE_BODY).unwrap();
        let opts = SwapOptions {
            wrap_and_unwrap_sol: Some(false),
            use_shared_accounts: Some(false),
        };
        let swap = client_for(base)
            .build_swap_transaction(&quote, &WalletIdentity::new("Wallet"), opts)
            .await
            .unwrap();
        assert_eq!(swap.swap_transaction, "AQID");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["wrapAndUnwrapSol"], false);
        assert_eq!(seen[0]["useSharedAccounts"], false);
        assert_eq!(seen[0]["userPublicKey"], "Wallet");
    }

    #[test]
    fn slippage_bounds() {
        assert!(ensure_slippage_bounds(0, 100).is_err());
        assert!(ensure_slippage_bounds(150, 100).is_err());
        assert!(ensure_slippage_bounds(50, 100).is_ok());
    }

    #[test]
    fn solana_address_validation() {
        assert!(is_valid_solana_address(WRAPPED_SOL_MINT));
        assert!(is_valid_solana_address("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        assert!(!is_valid_solana_address("YourSolanaWalletPublicKeyHere"));
        assert!(!is_valid_solana_address("0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl0OIl"));
    }
}
