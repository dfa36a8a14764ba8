//! Engine tick loop
//!
//! One cooperative loop drives everything: consume queued controls, value
//! the wallet, update held positions (exits first), then attempt a new
//! entry if capacity and cooldown allow. A tick-level error boundary turns
//! any failure into a logged recoverable event; the loop never dies over a
//! trading decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::controls::{Controls, TradeMode};
use crate::error::{Error, Result};
use crate::execution::{sol_to_lamports, SwapExecutor, SOL_MINT};
use crate::position::{EntrySnapshot, Position, PositionManager};
use crate::providers::{FailoverController, MarketDataProvider};
use crate::selector::CandidateSelector;
use crate::snapshot::{
    CooldownView, EngineSnapshot, PositionView, SnapshotPublisher, TradeEvent,
};
use crate::state::StateStore;

/// Fallback token decimals when no source reports them
const DEFAULT_TOKEN_DECIMALS: u8 = 9;

pub struct Engine {
    config: Config,
    failover: Arc<FailoverController>,
    selector: CandidateSelector,
    manager: PositionManager,
    live_executor: Option<Arc<dyn SwapExecutor>>,
    paper_executor: Arc<dyn SwapExecutor>,
    state_store: StateStore,
    controls: Controls,
    publisher: SnapshotPublisher,
    last_wallet_balance_sol: f64,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        failover: Arc<FailoverController>,
        selector: CandidateSelector,
        manager: PositionManager,
        live_executor: Option<Arc<dyn SwapExecutor>>,
        paper_executor: Arc<dyn SwapExecutor>,
        state_store: StateStore,
        controls: Controls,
    ) -> Self {
        Self {
            config,
            failover,
            selector,
            manager,
            live_executor,
            paper_executor,
            state_store,
            controls,
            publisher: SnapshotPublisher::new(),
            last_wallet_balance_sol: 0.0,
        }
    }

    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.publisher.subscribe()
    }

    /// Run ticks forever at the configured poll interval
    pub async fn run(&mut self) -> Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.engine.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.engine.poll_interval_secs,
            mode = %self.controls.mode(),
            "engine loop started"
        );

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!(error = %e, "tick failed, continuing next interval");
            }
        }
    }

    /// One full engine iteration
    pub async fn tick(&mut self) -> Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        let mode = self.controls.mode();
        let executor = self.executor_for(mode);

        if self.controls.take_cooldown_reset() {
            // Re-validated here: a position may have opened since the
            // request was accepted.
            if self.manager.open_count() == 0 {
                self.manager.reset_cooldown();
                self.persist();
            } else {
                warn!("cooldown reset ignored, a position opened since the request");
            }
        }

        let manual_requested = self.controls.take_exit_request();

        let wallet_balance_sol = self.wallet_balance(mode, executor.as_ref()).await;

        // All held positions are evaluated for exit before any new entry.
        let provider = self.failover.active();
        let (events, valuations) = self
            .manager
            .update_positions(
                executor.as_ref(),
                provider.as_ref(),
                &self.config.signals,
                mode,
                manual_requested,
                wallet_balance_sol,
                now_ms,
            )
            .await;

        if !events.is_empty() {
            for event in events {
                self.publisher.record_event(event);
            }
            self.persist();
        }

        if self.manager.can_enter(now_ms) {
            let provider = self.failover.active();
            match self
                .try_enter(executor.as_ref(), provider.as_ref(), mode, now_ms)
                .await
            {
                Ok(true) => self.persist(),
                Ok(false) => {}
                Err(e) if e.is_quota_exhausted() => {
                    self.failover.report_quota_exhausted(provider.name());
                }
                Err(e) => warn!(error = %e, "entry attempt failed"),
            }
        }

        self.controls.set_open_positions(self.manager.open_count());
        self.publish(mode, wallet_balance_sol, &valuations, now_ms);

        Ok(())
    }

    fn executor_for(&self, mode: TradeMode) -> Arc<dyn SwapExecutor> {
        match mode {
            TradeMode::Paper => self.paper_executor.clone(),
            TradeMode::Live => self
                .live_executor
                .clone()
                .unwrap_or_else(|| {
                    // Mode switching guards against this, but never trade
                    // live through a missing executor.
                    warn!("live executor unavailable, falling back to paper");
                    self.paper_executor.clone()
                }),
        }
    }

    async fn wallet_balance(&mut self, mode: TradeMode, executor: &dyn SwapExecutor) -> f64 {
        match mode {
            TradeMode::Paper => self.manager.sim_balance_sol(),
            TradeMode::Live => match executor.wallet_balance_sol().await {
                Ok(balance) => {
                    self.last_wallet_balance_sol = balance;
                    balance
                }
                Err(e) => {
                    // A failed lookup must not trip the account stop; reuse
                    // the last known balance.
                    warn!(error = %e, "balance lookup failed, using last known");
                    self.last_wallet_balance_sol
                }
            },
        }
    }

    /// Scan for a candidate and open a position. Returns whether an entry
    /// happened.
    async fn try_enter(
        &mut self,
        executor: &dyn SwapExecutor,
        provider: &dyn MarketDataProvider,
        mode: TradeMode,
        now_ms: i64,
    ) -> Result<bool> {
        let (candidate, _report) = self.selector.select(provider, executor).await?;
        let Some(candidate) = candidate else {
            return Ok(false);
        };

        let buy_amount_sol = self.config.trading.buy_amount_sol;
        let quote = executor
            .quote(
                SOL_MINT,
                &candidate.address,
                sol_to_lamports(buy_amount_sol),
                self.config.trading.max_slippage_pct,
            )
            .await?;
        let tx = executor.swap(&quote).await?;
        if !executor.confirm(&tx).await? {
            return Err(Error::Confirm(format!(
                "entry transaction {} failed on-chain",
                tx.signature
            )));
        }

        let position = Position {
            id: Uuid::new_v4(),
            mint: candidate.address.clone(),
            name: candidate.name.clone(),
            entry_time_ms: now_ms,
            entry_sol: buy_amount_sol,
            token_amount: quote.out_amount,
            token_decimals: candidate.decimals.unwrap_or(DEFAULT_TOKEN_DECIMALS),
            signature: tx.signature.clone(),
            entry_snapshot: EntrySnapshot {
                score: candidate.score,
                tier: candidate.tier.as_str().to_string(),
                price_impact_pct: candidate.price_impact_pct,
                rug_score: candidate.risk.score,
            },
        };

        if mode == TradeMode::Paper {
            self.manager.debit_sim(buy_amount_sol);
        }

        self.publisher.record_event(TradeEvent::entry(
            &position.mint,
            &position.name,
            buy_amount_sol,
            &position.signature,
            now_ms,
        ));
        self.manager.record_entry(position, now_ms);

        Ok(true)
    }

    fn persist(&self) {
        self.state_store.save(self.manager.to_state());
    }

    fn publish(
        &self,
        mode: TradeMode,
        wallet_balance_sol: f64,
        valuations: &HashMap<Uuid, f64>,
        now_ms: i64,
    ) {
        let positions = self
            .manager
            .positions()
            .iter()
            .map(|p| PositionView::from_position(p, valuations.get(&p.id).copied(), now_ms))
            .collect();

        self.publisher.publish(EngineSnapshot {
            status: "running".to_string(),
            mode,
            wallet_balance_sol,
            sim_balance_sol: self.manager.sim_balance_sol(),
            positions,
            cooldown: CooldownView::from_state(self.manager.cooldown(), now_ms),
            recent_events: vec![],
            updated_at_ms: now_ms,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SignalConfig, SignalMode};
    use crate::execution::{lamports_to_sol, Quote, TxHandle};
    use crate::providers::types::{Candle, SeedToken, TokenMetrics, TokenSecurity};
    use crate::snapshot::TradeEventKind;
    use crate::state::EngineState;
    use async_trait::async_trait;

    struct OneTokenProvider;

    fn rising_candles() -> Vec<Candle> {
        (0..40)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.25;
                Candle {
                    timestamp: i * 900,
                    open: close,
                    high: close + 0.1,
                    low: close - 0.1,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    #[async_trait]
    impl MarketDataProvider for OneTokenProvider {
        fn name(&self) -> &'static str {
            "one"
        }

        async fn discover(&self, _limit: usize) -> Result<Vec<SeedToken>> {
            Ok(vec![SeedToken {
                address: "MintAAA".to_string(),
                name: "Alpha".to_string(),
                symbol: "ALP".to_string(),
                decimals: Some(6),
            }])
        }

        async fn fetch_metrics(&self, _address: &str) -> Result<TokenMetrics> {
            Ok(TokenMetrics {
                liquidity_usd: Some(100_000.0),
                vol24h_usd: Some(500_000.0),
                vol15m_usd: Some(1_000.0),
                holders_pct: Some(10.0),
                security: TokenSecurity::default(),
                candles: rising_candles(),
                ..TokenMetrics::new()
            })
        }

        async fn recent_candles(&self, _address: &str, _bars: usize) -> Result<Vec<Candle>> {
            Ok(rising_candles())
        }
    }

    struct FlatExecutor;

    #[async_trait]
    impl SwapExecutor for FlatExecutor {
        async fn quote(
            &self,
            input_mint: &str,
            output_mint: &str,
            amount: u64,
            max_slippage_pct: f64,
        ) -> Result<Quote> {
            Ok(Quote {
                input_mint: input_mint.to_string(),
                output_mint: output_mint.to_string(),
                in_amount: amount,
                out_amount: amount,
                price_impact_pct: Some(1.0),
                max_slippage_pct,
            })
        }

        async fn swap(&self, _quote: &Quote) -> Result<TxHandle> {
            Ok(TxHandle {
                signature: "flat-sig".to_string(),
            })
        }

        async fn confirm(&self, _tx: &TxHandle) -> Result<bool> {
            Ok(true)
        }

        async fn wallet_balance_sol(&self) -> Result<f64> {
            Ok(2.0)
        }
    }

    fn test_engine(dir: &tempfile::TempDir) -> Engine {
        let mut config = Config::default();
        config.signals.mode = SignalMode::Momentum;
        config.signals.momentum_min_short_pct = 0.0;
        config.signals.momentum_min_long_pct = 0.0;
        config.state.path = dir
            .path()
            .join("engine_state.json")
            .to_string_lossy()
            .to_string();

        let failover = Arc::new(FailoverController::new(
            Arc::new(OneTokenProvider),
            Arc::new(OneTokenProvider),
            Duration::from_secs(60),
        ));
        let selector = CandidateSelector::new(
            config.filters.clone(),
            config.signals.clone(),
            config.trading.clone(),
            config.engine.scan_limit,
            None,
        )
        .unwrap();
        let manager = PositionManager::from_state(
            config.exits.clone(),
            config.trading.clone(),
            config.engine.max_open_positions,
            config.engine.cooldown_minutes,
            config.engine.account_floor_sol,
            config.engine.paper_starting_sol,
            EngineState::default(),
        );
        let state_store = StateStore::spawn(
            std::path::PathBuf::from(&config.state.path),
            Duration::from_millis(10),
        );
        let controls = Controls::new(TradeMode::Paper, false);

        Engine::new(
            config,
            failover,
            selector,
            manager,
            None,
            Arc::new(FlatExecutor),
            state_store,
            controls,
        )
    }

    #[tokio::test]
    async fn test_tick_opens_a_position_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = test_engine(&dir);
        let rx = engine.subscribe();

        engine.tick().await.unwrap();

        assert_eq!(engine.manager.open_count(), 1);
        let position = &engine.manager.positions()[0];
        assert_eq!(position.mint, "MintAAA");
        // Quote is flat SOL-for-token here, so the raw amounts match.
        assert_eq!(
            lamports_to_sol(position.token_amount),
            engine.config.trading.buy_amount_sol
        );

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.status, "running");
        assert_eq!(snapshot.positions.len(), 1);
        assert_eq!(snapshot.recent_events.len(), 1);
        assert_eq!(snapshot.recent_events[0].kind, TradeEventKind::Entry);
        // Paper balance debited by the entry size.
        assert!(
            (snapshot.sim_balance_sol
                - (engine.config.engine.paper_starting_sol
                    - engine.config.trading.buy_amount_sol))
                .abs()
                < 1e-9
        );
    }

    #[tokio::test]
    async fn test_second_tick_respects_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = test_engine(&dir);

        engine.tick().await.unwrap();
        assert_eq!(engine.manager.open_count(), 1);

        // Cooldown just started: the next tick must not open another.
        engine.tick().await.unwrap();
        assert_eq!(engine.manager.open_count(), 1);
    }

    #[tokio::test]
    async fn test_manual_exit_flag_consumed_by_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = test_engine(&dir);

        engine.tick().await.unwrap();
        assert_eq!(engine.manager.open_count(), 1);

        let controls = engine.controls();
        assert!(controls.request_exit().ok);

        engine.tick().await.unwrap();
        assert_eq!(engine.manager.open_count(), 0);
    }
}
