mod allocation;
mod config;
mod domain;
mod engine;
mod error;
mod jupiter;
mod leg;
mod logger;
mod retry;
mod risk;
mod server;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::engine::BasketSwapOrchestrator;
use crate::jupiter::{JupiterClient, SwapVenue};
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::from_env()?;
    logger::init_tracing(cfg.log_json);
    info!(?cfg, "boot");

    let venue: Arc<dyn SwapVenue> = Arc::new(JupiterClient::from_config(&cfg)?);
    let state = AppState {
        orchestrator: BasketSwapOrchestrator::from_config(venue.clone(), &cfg),
        venue,
    };

    server::serve(&cfg.bind_addr, state).await
}
