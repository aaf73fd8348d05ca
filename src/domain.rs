use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenAllocation {
    pub symbol: String,
    /// Output mint the leg buys.
    pub address: String,
    /// Share of the basket in percent, 0..=100.
    #[serde(rename = "allocation", alias = "allocationPercent")]
    pub allocation_percent: f64,
    /// Minor-unit scale; the configured default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
    /// 24h price change in percent, used to pick slippage.
    #[serde(default, rename = "change24h", skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<f64>,
}

impl TokenAllocation {
    #[cfg(test)]
    pub fn new(symbol: impl Into<String>, address: impl Into<String>, allocation_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            address: address.into(),
            allocation_percent,
            decimals: None,
            change_24h: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Basket {
    pub name: String,
    #[serde(default)]
    pub tokens: Vec<TokenAllocation>,
}

impl Basket {
    pub fn total_allocation_percent(&self) -> f64 {
        self.tokens.iter().map(|t| t.allocation_percent).sum()
    }

    /// Keeps only the named tokens, in their original order. Used to rebuild a
    /// basket from the failed legs of a previous report.
    pub fn retain_tokens(&self, symbols: &[String]) -> Basket {
        Basket {
            name: self.name.clone(),
            tokens: self
                .tokens
                .iter()
                .filter(|t| symbols.iter().any(|s| s == &t.symbol))
                .cloned()
                .collect(),
        }
    }
}

/// Public key of the wallet that will sign the returned transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletIdentity(String);

impl WalletIdentity {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self(pubkey.into())
    }
}

impl std::fmt::Display for WalletIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of the basket entry point. Every field is optional on the wire so a
/// missing one maps to a 400 instead of a deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasketSwapRequest {
    #[serde(default)]
    pub basket: Option<Basket>,
    #[serde(default, rename = "userPublicKey")]
    pub user_public_key: Option<String>,
    #[serde(default, rename = "totalAmount")]
    pub total_amount: Option<f64>,
}

/// Body of the failed-leg retry route: the original request plus the report
/// it produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryFailedLegsRequest {
    #[serde(flatten)]
    pub swap: BasketSwapRequest,
    #[serde(default)]
    pub previous: Option<BasketSwapReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LegOutcome {
    pub token: String,
    pub success: bool,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LegOutcome {
    pub fn succeeded(token: impl Into<String>, amount: f64, transaction: String) -> Self {
        Self {
            token: token.into(),
            success: true,
            amount,
            transaction: Some(transaction),
            error: None,
        }
    }

    pub fn failed(token: impl Into<String>, amount: f64, error: impl ToString) -> Self {
        Self {
            token: token.into(),
            success: false,
            amount,
            transaction: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketSwapReport {
    pub success: bool,
    pub results: Vec<LegOutcome>,
    #[serde(rename = "executedAt", default = "Utc::now")]
    pub executed_at: DateTime<Utc>,
}

impl BasketSwapReport {
    pub fn from_outcomes(results: Vec<LegOutcome>) -> Self {
        Self {
            success: results.iter().all(|r| r.success),
            results,
            executed_at: Utc::now(),
        }
    }

    pub fn failed_tokens(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.token.clone())
            .collect()
    }
}
