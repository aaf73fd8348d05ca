use serde::{Deserialize, Serialize};

pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }

    /// Display token for the dashboard; carries no meaning here.
    pub fn color(self) -> &'static str {
        match self {
            RiskLevel::Low => "bg-green-500",
            RiskLevel::Medium => "bg-yellow-500",
            RiskLevel::High => "bg-orange-500",
            RiskLevel::VeryHigh => "bg-red-500",
        }
    }
}

/// Volatility bucket from the magnitude of a 24h change in percent.
pub fn risk_level(change_24h: f64) -> RiskLevel {
    let abs = change_24h.abs();
    if abs > 20.0 {
        RiskLevel::VeryHigh
    } else if abs > 10.0 {
        RiskLevel::High
    } else if abs > 5.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Slippage widens with volatility: 0.5% base, up to 2%.
pub fn optimal_slippage_bps(change_24h: f64) -> u64 {
    match risk_level(change_24h) {
        RiskLevel::VeryHigh => 200,
        RiskLevel::High => 100,
        RiskLevel::Medium => 75,
        RiskLevel::Low => DEFAULT_SLIPPAGE_BPS,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlippagePolicy {
    pub default_bps: u64,
    pub max_bps: u64,
}

impl Default for SlippagePolicy {
    fn default() -> Self {
        Self { default_bps: DEFAULT_SLIPPAGE_BPS, max_bps: 300 }
    }
}

impl SlippagePolicy {
    /// Volatility-derived slippage when the change is known, else the
    /// default. Never exceeds `max_bps`.
    pub fn bps_for(&self, change_24h: Option<f64>) -> u64 {
        change_24h
            .filter(|c| c.is_finite())
            .map(optimal_slippage_bps)
            .unwrap_or(self.default_bps)
            .min(self.max_bps)
    }
}
