use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::domain::{BasketSwapReport, BasketSwapRequest, RetryFailedLegsRequest, WalletIdentity};
use crate::engine::BasketSwapOrchestrator;
use crate::error::OrchestrationError;
use crate::jupiter::{QuoteRequest, SwapOptions, SwapQuote, SwapVenue};
use crate::risk::{optimal_slippage_bps, risk_level, DEFAULT_SLIPPAGE_BPS};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: BasketSwapOrchestrator,
    pub venue: Arc<dyn SwapVenue>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/jupiter/quote", get(quote_proxy))
        .route("/api/risk", get(risk_profile))
        .route("/api/jupiter/swap", post(swap_proxy).put(basket_swap))
        .route("/api/jupiter/swap/retry", post(retry_failed_legs))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "server.listen");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server.stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "server.signal.failed");
    }
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

impl IntoResponse for OrchestrationError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            OrchestrationError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.to_string())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// PUT /api/jupiter/swap: buy every token of a basket. 200 whenever the
/// request is well formed, even if some legs failed.
pub async fn basket_swap(
    State(state): State<AppState>,
    body: Result<Json<BasketSwapRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", rej.body_text())),
    };

    report_response("basket_swap", state.orchestrator.execute_basket_swap(req).await)
}

/// POST /api/jupiter/swap/retry: re-run the failed legs of a previous basket
/// swap. Takes the original request plus `previous`, the report it produced.
pub async fn retry_failed_legs(
    State(state): State<AppState>,
    body: Result<Json<RetryFailedLegsRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", rej.body_text())),
    };
    report_response("retry_failed_legs", state.orchestrator.execute_failed_legs(req).await)
}

fn report_response(route: &'static str, result: Result<BasketSwapReport, OrchestrationError>) -> Response {
    match result {
        Ok(report) => {
            if !report.success {
                warn!(route, failed = ?report.failed_tokens(), "server.basket_swap.partial");
            }
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                warn!(route, error = %e, "server.basket_swap.rejected");
            } else {
                error!(route, error = %e, "server.basket_swap.failed");
            }
            e.into_response()
        }
    }
}

/// GET /api/risk?change24h=: slippage and risk badge for the dashboard.
pub async fn risk_profile(Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(change) = params.get("change24h").and_then(|v| v.trim().parse::<f64>().ok()) else {
        return error_response(StatusCode::BAD_REQUEST, "change24h must be a number");
    };
    let level = risk_level(change);
    Json(json!({
        "change24h": change,
        "slippageBps": optimal_slippage_bps(change),
        "level": level.label(),
        "color": level.color(),
    }))
    .into_response()
}

/// GET /api/jupiter/quote: pass-through quote for a single pair.
pub async fn quote_proxy(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let get = |k: &str| params.get(k).map(|v| v.trim()).filter(|v| !v.is_empty());
    let (Some(input_mint), Some(output_mint), Some(amount)) = (get("inputMint"), get("outputMint"), get("amount")) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required parameters: inputMint, outputMint, amount",
        );
    };
    if amount.parse::<u64>().is_err() {
        return error_response(StatusCode::BAD_REQUEST, "amount must be a non-negative integer in minor units");
    }
    let slippage_bps = match get("slippageBps").map(str::parse::<u64>) {
        None => DEFAULT_SLIPPAGE_BPS,
        Some(Ok(bps)) => bps,
        Some(Err(_)) => return error_response(StatusCode::BAD_REQUEST, "slippageBps must be an integer"),
    };

    let req = QuoteRequest {
        input_mint: input_mint.to_string(),
        output_mint: output_mint.to_string(),
        amount: amount.to_string(),
        slippage_bps,
    };
    match state.venue.get_quote(req).await {
        Ok(quote) => Json(quote).into_response(),
        Err(e) => {
            error!(error = %e, "server.quote.failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch quote")
        }
    }
}

/// Optional boolean body field; `Err` names the field when it has another type.
fn optional_bool(body: &Value, key: &'static str) -> Result<Option<bool>, Response> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(error_response(StatusCode::BAD_REQUEST, format!("{key} must be a boolean"))),
    }
}

/// POST /api/jupiter/swap: pass-through swap transaction for one quote.
/// `wrapAndUnwrapSol` and `useSharedAccounts` from the body win over config.
pub async fn swap_proxy(State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>) -> Response {
    let Ok(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
    };
    let quote = body.get("quoteResponse").filter(|v| !v.is_null());
    let user = body
        .get("userPublicKey")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty());
    let (Some(quote), Some(user)) = (quote, user) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required parameters: quoteResponse, userPublicKey",
        );
    };
    let quote: SwapQuote = match serde_json::from_value(quote.clone()) {
        Ok(q) => q,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid quoteResponse: {e}")),
    };
    let opts = match (optional_bool(&body, "wrapAndUnwrapSol"), optional_bool(&body, "useSharedAccounts")) {
        (Ok(wrap_and_unwrap_sol), Ok(use_shared_accounts)) => SwapOptions {
            wrap_and_unwrap_sol,
            use_shared_accounts,
        },
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match state
        .venue
        .build_swap_transaction(&quote, &WalletIdentity::new(user.trim()), opts)
        .await
    {
        Ok(swap) => Json(swap).into_response(),
        Err(e) => {
            error!(error = %e, "server.swap.failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to execute swap")
        }
    }
}
