//! In-memory `SwapVenue` for leg, engine and server tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::domain::WalletIdentity;
use crate::error::LegError;
use crate::jupiter::{QuoteRequest, SwapOptions, SwapQuote, SwapResponse, SwapVenue};

pub const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

#[derive(Default)]
pub struct FakeVenue {
    quote_failures: HashMap<String, LegError>,
    swap_failures: HashMap<String, LegError>,
    delays: HashMap<String, Duration>,
    swap_delays: HashMap<String, Duration>,
    flaky_quotes: Mutex<HashMap<String, u32>>,
    seen: Mutex<Vec<QuoteRequest>>,
    swap_options: Mutex<Vec<SwapOptions>>,
    quote_calls: AtomicU32,
    swap_calls: AtomicU32,
}

impl FakeVenue {
    pub fn fail_quote(mut self, mint: &str, err: LegError) -> Self {
        self.quote_failures.insert(mint.to_string(), err);
        self
    }

    pub fn fail_swap(mut self, mint: &str, err: LegError) -> Self {
        self.swap_failures.insert(mint.to_string(), err);
        self
    }

    /// Quotes for `mint` take `d` to answer.
    pub fn delay(mut self, mint: &str, d: Duration) -> Self {
        self.delays.insert(mint.to_string(), d);
        self
    }

    /// Swap builds for `mint` take `d` to answer.
    pub fn delay_swap(mut self, mint: &str, d: Duration) -> Self {
        self.swap_delays.insert(mint.to_string(), d);
        self
    }

    /// The first `times` quotes for `mint` fail with a 503.
    pub fn flaky_quote(self, mint: &str, times: u32) -> Self {
        self.flaky_quotes.lock().unwrap().insert(mint.to_string(), times);
        self
    }

    pub fn quotes_seen(&self) -> Vec<QuoteRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn swap_options_seen(&self) -> Vec<SwapOptions> {
        self.swap_options.lock().unwrap().clone()
    }

    pub fn quote_calls(&self) -> u32 {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn swap_calls(&self) -> u32 {
        self.swap_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapVenue for FakeVenue {
    async fn get_quote(&self, req: QuoteRequest) -> Result<SwapQuote, LegError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.clone());

        if let Some(d) = self.delays.get(&req.output_mint) {
            tokio::time::sleep(*d).await;
        }
        {
            let mut flaky = self.flaky_quotes.lock().unwrap();
            if let Some(left) = flaky.get_mut(&req.output_mint) {
                if *left > 0 {
                    *left -= 1;
                    return Err(LegError::quote(Some(503), "Service Unavailable"));
                }
            }
        }
        if let Some(err) = self.quote_failures.get(&req.output_mint) {
            return Err(err.clone());
        }

        Ok(SwapQuote {
            input_mint: req.input_mint,
            in_amount: req.amount.clone(),
            output_mint: req.output_mint,
            out_amount: req.amount,
            slippage_bps: req.slippage_bps,
            price_impact_pct: "0.001".to_string(),
            rest: serde_json::Map::new(),
        })
    }

    async fn build_swap_transaction(
        &self,
        quote: &SwapQuote,
        wallet: &WalletIdentity,
        opts: SwapOptions,
    ) -> Result<SwapResponse, LegError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        self.swap_options.lock().unwrap().push(opts);

        if let Some(d) = self.swap_delays.get(&quote.output_mint) {
            tokio::time::sleep(*d).await;
        }
        if let Some(err) = self.swap_failures.get(&quote.output_mint) {
            return Err(err.clone());
        }
        let raw = format!("tx:{}:{}", quote.output_mint, wallet);
        Ok(SwapResponse {
            swap_transaction: base64::engine::general_purpose::STANDARD.encode(raw),
            rest: serde_json::Map::new(),
        })
    }
}
