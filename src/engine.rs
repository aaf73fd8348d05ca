use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use tracing::{info, warn};

use crate::allocation::{self, LegTarget};
use crate::config::Config;
use crate::domain::{Basket, BasketSwapReport, BasketSwapRequest, LegOutcome, RetryFailedLegsRequest, WalletIdentity};
use crate::error::OrchestrationError;
use crate::jupiter::{is_valid_solana_address, SwapVenue};
use crate::leg::{LegExecutor, LegSettings};

#[derive(Clone)]
pub struct BasketSwapOrchestrator {
    legs: LegExecutor,
    /// Max legs in flight at once; 1 runs them sequentially.
    concurrency: usize,
    deadline: Option<Duration>,
}

impl BasketSwapOrchestrator {
    pub fn new(legs: LegExecutor, concurrency: usize, deadline: Option<Duration>) -> Self {
        Self {
            legs,
            concurrency: concurrency.max(1),
            deadline,
        }
    }

    pub fn from_config(venue: Arc<dyn SwapVenue>, cfg: &Config) -> Self {
        Self::new(
            LegExecutor::new(venue, LegSettings::from_config(cfg)),
            cfg.leg_concurrency,
            cfg.basket_deadline_ms.map(Duration::from_millis),
        )
    }

    /// Validate -> split -> fan out one leg per token -> report in basket order.
    ///
    /// Leg failures are data in the report. Only validation, cancellation and
    /// internal faults come back as `Err`.
    pub async fn execute_basket_swap(&self, req: BasketSwapRequest) -> Result<BasketSwapReport, OrchestrationError> {
        let (basket, wallet, total_amount) = validate_request(req)?;
        self.execute_within_deadline(&basket, total_amount, &wallet).await
    }

    /// Same as `execute_basket_swap` on already-validated inputs, abandoning
    /// every in-flight leg as soon as `cancel` resolves. A cancelled run
    /// yields no partial report.
    pub async fn execute_with_cancel<C>(
        &self,
        basket: &Basket,
        total_amount: f64,
        wallet: &WalletIdentity,
        cancel: C,
    ) -> Result<BasketSwapReport, OrchestrationError>
    where
        C: Future<Output = ()>,
    {
        let targets = allocation::split(basket, total_amount)?;
        info!(
            basket = %basket.name,
            legs = targets.len(),
            total_amount,
            concurrency = self.concurrency,
            "engine.basket.start"
        );

        tokio::select! {
            report = self.run_legs(&targets, wallet) => {
                let report = report?;
                let failed = report.results.iter().filter(|r| !r.success).count();
                info!(
                    basket = %basket.name,
                    success = report.success,
                    succeeded = report.results.len() - failed,
                    failed,
                    "engine.basket.done"
                );
                Ok(report)
            }
            _ = cancel => {
                warn!(basket = %basket.name, "engine.basket.cancelled");
                Err(OrchestrationError::Cancelled)
            }
        }
    }

    /// Re-runs only the legs that failed in `req.previous`. Amounts are
    /// derived from the original basket and total, so each retried leg gets
    /// the same target as before. A report with no failures yields
    /// `InvalidBasket`.
    pub async fn execute_failed_legs(&self, req: RetryFailedLegsRequest) -> Result<BasketSwapReport, OrchestrationError> {
        let previous = req.previous.ok_or(OrchestrationError::MissingParameter("previous"))?;
        let (basket, wallet, total_amount) = validate_request(req.swap)?;

        let retry = basket.retain_tokens(&previous.failed_tokens());
        if retry.tokens.is_empty() {
            return Err(OrchestrationError::InvalidBasket(format!(
                "basket '{}' has no failed legs to retry",
                basket.name
            )));
        }
        info!(basket = %basket.name, legs = retry.tokens.len(), "engine.basket.retry_failed");
        self.execute_within_deadline(&retry, total_amount, &wallet).await
    }

    async fn execute_within_deadline(
        &self,
        basket: &Basket,
        total_amount: f64,
        wallet: &WalletIdentity,
    ) -> Result<BasketSwapReport, OrchestrationError> {
        match self.deadline {
            Some(d) => {
                self.execute_with_cancel(basket, total_amount, wallet, tokio::time::sleep(d))
                    .await
            }
            None => {
                self.execute_with_cancel(basket, total_amount, wallet, futures::future::pending::<()>())
                    .await
            }
        }
    }

    async fn run_legs(&self, targets: &[LegTarget], wallet: &WalletIdentity) -> Result<BasketSwapReport, OrchestrationError> {
        // Owned boxed futures keep the handler future `Send`.
        let legs: Vec<BoxFuture<'_, Result<LegOutcome, String>>> = targets
            .iter()
            .map(|t| {
                let symbol = t.allocation.symbol.clone();
                AssertUnwindSafe(self.legs.execute_leg(t, wallet))
                    .catch_unwind()
                    .map(move |r| r.map_err(|p| format!("leg {symbol} panicked: {}", panic_message(&*p))))
                    .boxed()
            })
            .collect();

        // `buffered` yields in input order whatever the completion order.
        let results: Vec<Result<LegOutcome, String>> = stream::iter(legs).buffered(self.concurrency).collect().await;

        let outcomes = results
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(OrchestrationError::Internal)?;

        if outcomes.len() != targets.len() {
            return Err(OrchestrationError::Internal(format!(
                "expected {} leg outcomes, got {}",
                targets.len(),
                outcomes.len()
            )));
        }
        Ok(BasketSwapReport::from_outcomes(outcomes))
    }
}

fn validate_request(req: BasketSwapRequest) -> Result<(Basket, WalletIdentity, f64), OrchestrationError> {
    let basket = req.basket.ok_or(OrchestrationError::MissingParameter("basket"))?;

    let pubkey = req
        .user_public_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(OrchestrationError::MissingParameter("userPublicKey"))?;
    if !is_valid_solana_address(&pubkey) {
        return Err(OrchestrationError::InvalidParameter {
            name: "userPublicKey",
            reason: "not a base58 encoded 32-byte public key".to_string(),
        });
    }

    let total_amount = req
        .total_amount
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or(OrchestrationError::MissingParameter("totalAmount"))?;

    if basket.tokens.is_empty() {
        return Err(OrchestrationError::InvalidBasket(format!("basket '{}' has no tokens", basket.name)));
    }

    Ok((basket, WalletIdentity::new(pubkey), total_amount))
}

fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
