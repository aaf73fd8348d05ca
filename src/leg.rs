use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::allocation::{from_minor_units, to_minor_units, LegTarget, MAX_DECIMALS};
use crate::config::Config;
use crate::domain::{LegOutcome, WalletIdentity};
use crate::error::LegError;
use crate::jupiter::{QuoteRequest, SwapOptions, SwapVenue};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::risk::{risk_level, SlippagePolicy};

#[derive(Debug, Clone)]
pub struct LegSettings {
    /// Mint every leg pays with.
    pub input_mint: String,
    pub default_decimals: u32,
    pub slippage: SlippagePolicy,
    pub call_timeout: Duration,
    /// Wraps each quote and swap call when set.
    pub retry: Option<RetryPolicy>,
}

impl LegSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            input_mint: cfg.input_mint.clone(),
            default_decimals: cfg.default_decimals,
            slippage: SlippagePolicy {
                default_bps: cfg.slippage_bps,
                max_bps: cfg.max_slippage_bps,
            },
            call_timeout: Duration::from_millis(cfg.request_timeout_ms),
            retry: cfg.retry_enabled.then(|| RetryPolicy::from_config(cfg)),
        }
    }
}

/// Drives quote then swap for one basket entry. Every failure comes back as a
/// failed `LegOutcome`; nothing escapes to sibling legs.
#[derive(Clone)]
pub struct LegExecutor {
    venue: Arc<dyn SwapVenue>,
    settings: LegSettings,
}

impl LegExecutor {
    pub fn new(venue: Arc<dyn SwapVenue>, settings: LegSettings) -> Self {
        Self { venue, settings }
    }

    pub async fn execute_leg(&self, target: &LegTarget, wallet: &WalletIdentity) -> LegOutcome {
        let token = &target.allocation;
        let amount = target.target_amount;
        let slippage_bps = self.settings.slippage.bps_for(token.change_24h);
        let decimals = token.decimals.unwrap_or(self.settings.default_decimals);

        if decimals > MAX_DECIMALS {
            warn!(token = %token.symbol, decimals, "leg.decimals.invalid");
            return LegOutcome::failed(
                &token.symbol,
                amount,
                format!("Invalid decimals for {}: {decimals} exceeds {MAX_DECIMALS}", token.symbol),
            );
        }
        let Some(minor) = to_minor_units(amount, decimals) else {
            warn!(token = %token.symbol, amount, "leg.amount.invalid");
            return LegOutcome::failed(&token.symbol, amount, format!("Invalid amount for {}: {amount}", token.symbol));
        };

        let req = QuoteRequest {
            input_mint: self.settings.input_mint.clone(),
            output_mint: token.address.clone(),
            amount: minor.to_string(),
            slippage_bps,
        };

        let quote = match self.call("quote", || self.venue.get_quote(req.clone())).await {
            Ok(q) => q,
            Err(e) => {
                warn!(token = %token.symbol, status = ?e.status(), error = %e, "leg.quote.failed");
                return LegOutcome::failed(&token.symbol, amount, format!("Quote error for {}: {e}", token.symbol));
            }
        };

        let swap = match self
            .call("swap", || self.venue.build_swap_transaction(&quote, wallet, SwapOptions::default()))
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(token = %token.symbol, status = ?e.status(), error = %e, "leg.swap.failed");
                return LegOutcome::failed(&token.symbol, amount, format!("Swap error for {}: {e}", token.symbol));
            }
        };

        info!(
            token = %token.symbol,
            amount,
            quoted_in = quote.in_amount.parse::<u64>().map(|m| from_minor_units(m, decimals)).unwrap_or(amount),
            risk = token.change_24h.map(|c| risk_level(c).label()).unwrap_or("unknown"),
            out_amount = %quote.out_amount,
            slippage_bps,
            price_impact_pct = quote.price_impact_percent(),
            "leg.ok"
        );
        LegOutcome::succeeded(&token.symbol, amount, swap.swap_transaction)
    }

    /// One venue call under the per-call timeout, retried when configured.
    /// A timeout counts as an ordinary failure.
    async fn call<T, F, Fut>(&self, stage: &'static str, mut op: F) -> Result<T, LegError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LegError>>,
    {
        let limit = self.settings.call_timeout;
        let timed = || {
            let fut = op();
            async move {
                match tokio::time::timeout(limit, fut).await {
                    Ok(res) => res,
                    Err(_) => Err(LegError::Timeout {
                        stage,
                        after_ms: limit.as_millis() as u64,
                    }),
                }
            }
        };

        match &self.settings.retry {
            Some(policy) => retry_with_backoff(policy, stage, timed).await,
            None => {
                let mut timed = timed;
                timed().await
            }
        }
    }
}
