use thiserror::Error;

/// Failure of a single quote or swap call. Never crosses the leg boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LegError {
    #[error("quote unavailable (status {status:?}): {message}")]
    QuoteUnavailable { status: Option<u16>, message: String },
    #[error("swap build failed (status {status:?}): {message}")]
    SwapBuild { status: Option<u16>, message: String },
    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: &'static str, after_ms: u64 },
}

impl LegError {
    pub fn quote(status: Option<u16>, message: impl Into<String>) -> Self {
        LegError::QuoteUnavailable { status, message: message.into() }
    }

    pub fn swap(status: Option<u16>, message: impl Into<String>) -> Self {
        LegError::SwapBuild { status, message: message.into() }
    }

    /// Upstream HTTP status, when the aggregator answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            LegError::QuoteUnavailable { status, .. } | LegError::SwapBuild { status, .. } => *status,
            LegError::Timeout { .. } => None,
        }
    }
}

/// Terminal failures of a whole basket execution. No report is produced.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid basket: {0}")]
    InvalidBasket(String),
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Basket swap cancelled before all legs completed")]
    Cancelled,
    #[error("Internal orchestration error: {0}")]
    Internal(String),
}

impl OrchestrationError {
    /// Validation failures are the caller's fault; the rest are ours.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestrationError::MissingParameter(_)
                | OrchestrationError::InvalidBasket(_)
                | OrchestrationError::InvalidParameter { .. }
        )
    }
}
