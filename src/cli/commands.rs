//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::controls::{Controls, TradeMode};
use crate::data::DataAccess;
use crate::engine::Engine;
use crate::execution::{PaperExecutor, PortalExecutor, SwapExecutor};
use crate::model::ScoringModel;
use crate::position::PositionManager;
use crate::providers::{
    BirdeyeProvider, FailoverController, GeckoProvider, MarketDataProvider,
};
use crate::selector::CandidateSelector;
use crate::state::{EngineState, StateStore};

/// Start the scout engine
pub async fn start(config: &Config, paper: bool) -> Result<()> {
    let mode = if paper { TradeMode::Paper } else { TradeMode::Live };

    // Missing live credentials are fatal at startup, not at first trade.
    let portal = PortalExecutor::new(config.execution.clone());
    let live_available = portal.is_configured();
    if mode == TradeMode::Live && !live_available {
        anyhow::bail!(
            "live mode requires execution.portal_api_key; run with --paper or configure the key"
        );
    }
    if mode == TradeMode::Paper {
        warn!("running in PAPER mode - no real trades will be executed");
    }

    info!(
        buy_amount_sol = config.trading.buy_amount_sol,
        max_open = config.engine.max_open_positions,
        "starting token scout"
    );

    // Shared request executor: one pacing clock per provider.
    let access = Arc::new(DataAccess::new());
    let birdeye = Arc::new(BirdeyeProvider::new(
        config.providers.birdeye.clone(),
        access.clone(),
    ));
    let gecko = Arc::new(GeckoProvider::new(
        config.providers.gecko.clone(),
        access.clone(),
    ));
    let failover = Arc::new(FailoverController::new(
        birdeye,
        gecko,
        Duration::from_secs(config.providers.failover_cooldown_secs),
    ));

    let model = config
        .model
        .path
        .as_deref()
        .and_then(|path| ScoringModel::load(std::path::Path::new(path)));
    if model.is_none() && config.model.path.is_some() {
        warn!("scoring model unavailable, staying rule-based");
    }

    let selector = CandidateSelector::new(
        config.filters.clone(),
        config.signals.clone(),
        config.trading.clone(),
        config.engine.scan_limit,
        model,
    )?;

    info!("loading engine state...");
    let state_path = PathBuf::from(&config.state.path);
    let state = EngineState::load(&state_path).await;
    let manager = PositionManager::from_state(
        config.exits.clone(),
        config.trading.clone(),
        config.engine.max_open_positions,
        config.engine.cooldown_minutes,
        config.engine.account_floor_sol,
        config.engine.paper_starting_sol,
        state,
    );

    let portal: Arc<dyn SwapExecutor> = Arc::new(portal);
    let paper_executor: Arc<dyn SwapExecutor> = Arc::new(PaperExecutor::new(portal.clone()));
    let live_executor = if live_available { Some(portal) } else { None };

    let state_store = StateStore::spawn(
        state_path,
        Duration::from_millis(config.state.debounce_ms),
    );
    let controls = Controls::new(mode, live_available);

    let mut engine = Engine::new(
        config.clone(),
        failover,
        selector,
        manager,
        live_executor,
        paper_executor,
        state_store,
        controls,
    );

    tokio::select! {
        result = engine.run() => {
            if let Err(e) = result {
                error!(error = %e, "engine loop ended");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, exiting");
        }
    }

    Ok(())
}

/// Show persisted positions and cooldown
pub async fn status(config: &Config) -> Result<()> {
    let state = EngineState::load(std::path::Path::new(&config.state.path)).await;

    println!("Open positions: {}", state.positions.len());
    for position in &state.positions {
        println!(
            "  {} {} entry {:.4} SOL at {} (sig {})",
            position.id, position.name, position.entry_sol, position.entry_time_ms,
            position.signature
        );
    }
    println!("Last trade:     {}", state.last_trade_time_ms);
    println!("Last exit:      {}", state.last_exit_time_ms);
    println!("Sim balance:    {:.4} SOL", state.sim_balance_sol);

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check provider reachability
pub async fn health(config: &Config) -> Result<()> {
    let access = Arc::new(DataAccess::new());

    let birdeye = BirdeyeProvider::new(config.providers.birdeye.clone(), access.clone());
    if birdeye.is_configured() {
        report_provider(&birdeye).await;
    } else {
        println!("birdeye: skipped (no API key)");
    }

    let gecko = GeckoProvider::new(config.providers.gecko.clone(), access);
    report_provider(&gecko).await;

    Ok(())
}

async fn report_provider(provider: &dyn MarketDataProvider) {
    match provider.discover(1).await {
        Ok(seeds) => println!("{}: ok ({} seed token)", provider.name(), seeds.len()),
        Err(e) => println!("{}: FAILED ({})", provider.name(), e),
    }
}
