use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::allocation::MAX_DECIMALS;
use crate::jupiter::{ensure_slippage_bounds, WRAPPED_SOL_MINT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Aggregator
    pub jupiter_base_url: String,
    pub fee_account: Option<String>,
    pub wrap_and_unwrap_sol: bool,
    pub use_shared_accounts: bool,

    // Legs
    pub input_mint: String,
    pub default_decimals: u32,
    pub slippage_bps: u64,
    pub max_slippage_bps: u64,
    pub request_timeout_ms: u64,

    // Retry decorator (off unless enabled)
    pub retry_enabled: bool,
    pub retry_max: u32,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_pct: u8,

    // Orchestration
    pub leg_concurrency: usize,
    pub basket_deadline_ms: Option<u64>,

    // Runtime
    pub bind_addr: String,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jupiter_base_url: "https://quote-api.jup.ag/v6".to_string(),
            fee_account: None,
            wrap_and_unwrap_sol: true,
            use_shared_accounts: true,
            input_mint: WRAPPED_SOL_MINT.to_string(),
            default_decimals: 9,
            slippage_bps: 50,
            max_slippage_bps: 300,
            request_timeout_ms: 15_000,
            retry_enabled: false,
            retry_max: 3,
            retry_base_delay_ms: 1_000,
            retry_jitter_pct: 0,
            leg_concurrency: 4,
            basket_deadline_ms: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            log_json: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        let jupiter_base_url = env_non_empty("JUPITER_BASE_URL").unwrap_or(d.jupiter_base_url);
        let fee_account = env_non_empty("JUPITER_FEE_ACCOUNT");
        let wrap_and_unwrap_sol = env_bool("BASKET_WRAP_UNWRAP_SOL", d.wrap_and_unwrap_sol);
        let use_shared_accounts = env_bool("BASKET_USE_SHARED_ACCOUNTS", d.use_shared_accounts);

        let input_mint = env_non_empty("BASKET_INPUT_MINT").unwrap_or(d.input_mint);
        let default_decimals = env_parse::<u32>("BASKET_DEFAULT_DECIMALS").unwrap_or(d.default_decimals);
        let slippage_bps = env_parse::<u64>("BASKET_SLIPPAGE_BPS").unwrap_or(d.slippage_bps);
        let max_slippage_bps = env_parse::<u64>("BASKET_MAX_SLIPPAGE_BPS").unwrap_or(d.max_slippage_bps);
        let request_timeout_ms = env_parse::<u64>("BASKET_REQUEST_TIMEOUT_MS").unwrap_or(d.request_timeout_ms);

        let retry_enabled = env_bool("BASKET_RETRY_ENABLED", d.retry_enabled);
        let retry_max = env_parse::<u32>("BASKET_RETRY_MAX").unwrap_or(d.retry_max);
        let retry_base_delay_ms = env_parse::<u64>("BASKET_RETRY_BASE_DELAY_MS").unwrap_or(d.retry_base_delay_ms);
        let retry_jitter_pct = env_parse::<u8>("BASKET_RETRY_JITTER_PCT").unwrap_or(d.retry_jitter_pct);

        let leg_concurrency = env_parse::<usize>("BASKET_LEG_CONCURRENCY").unwrap_or(d.leg_concurrency);
        let basket_deadline_ms = env_parse::<u64>("BASKET_DEADLINE_MS");

        let bind_addr = env_non_empty("BIND_ADDR").unwrap_or(d.bind_addr);
        let log_json = env_non_empty("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(d.log_json);

        let cfg = Self {
            jupiter_base_url,
            fee_account,
            wrap_and_unwrap_sol,
            use_shared_accounts,
            input_mint,
            default_decimals,
            slippage_bps,
            max_slippage_bps,
            request_timeout_ms,
            retry_enabled,
            retry_max,
            retry_base_delay_ms,
            retry_jitter_pct,
            leg_concurrency,
            basket_deadline_ms,
            bind_addr,
            log_json,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_slippage_bounds(self.slippage_bps, self.max_slippage_bps)
            .map_err(|e| anyhow!("BASKET_SLIPPAGE_BPS: {e}"))?;
        if self.leg_concurrency == 0 {
            return Err(anyhow!("BASKET_LEG_CONCURRENCY must be at least 1"));
        }
        if self.retry_max == 0 {
            return Err(anyhow!("BASKET_RETRY_MAX must be at least 1"));
        }
        if self.retry_jitter_pct > 100 {
            return Err(anyhow!("BASKET_RETRY_JITTER_PCT cannot exceed 100"));
        }
        if self.request_timeout_ms == 0 {
            return Err(anyhow!("BASKET_REQUEST_TIMEOUT_MS must be positive"));
        }
        if self.default_decimals > MAX_DECIMALS {
            return Err(anyhow!("BASKET_DEFAULT_DECIMALS cannot exceed 18"));
        }
        Ok(())
    }
}
