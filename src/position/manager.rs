//! Position lifecycle management
//!
//! Owns the set of open positions. Each tick the engine asks the manager to
//! value every holding, walk the exit-rule table in priority order and
//! execute the first matching exit per position. Entries are paced by the
//! cooldown and capped by the concurrent-position limit.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ExitConfig, SignalConfig, TradingConfig};
use crate::controls::TradeMode;
use crate::error::{Error, Result};
use crate::execution::{lamports_to_sol, SwapExecutor, SOL_MINT};
use crate::providers::MarketDataProvider;
use crate::signals::indicators::trend_ok;
use crate::snapshot::TradeEvent;
use crate::state::EngineState;

use super::exit::{self, ExitContext};
use super::{CooldownState, ExitReason, Position};

/// Bars fetched for the soft-stop trend re-check; enough to seed the slow
/// EMA and observe its last step
fn trend_recheck_bars(signals: &SignalConfig) -> usize {
    signals.ema_slow * 3
}

pub struct PositionManager {
    exit_config: ExitConfig,
    trading: TradingConfig,
    max_open_positions: usize,
    account_floor_sol: f64,
    positions: Vec<Position>,
    cooldown: CooldownState,
    last_exit_time_ms: i64,
    sim_balance_sol: f64,
}

impl PositionManager {
    pub fn from_state(
        exit_config: ExitConfig,
        trading: TradingConfig,
        max_open_positions: usize,
        cooldown_minutes: u64,
        account_floor_sol: f64,
        paper_starting_sol: f64,
        state: EngineState,
    ) -> Self {
        let sim_balance_sol = if state.sim_balance_sol > 0.0 || !state.positions.is_empty() {
            state.sim_balance_sol
        } else {
            paper_starting_sol
        };
        Self {
            exit_config,
            trading,
            max_open_positions,
            account_floor_sol,
            positions: state.positions,
            cooldown: CooldownState::new(state.last_trade_time_ms, cooldown_minutes),
            last_exit_time_ms: state.last_exit_time_ms,
            sim_balance_sol,
        }
    }

    /// Snapshot of the persisted fields
    pub fn to_state(&self) -> EngineState {
        EngineState {
            positions: self.positions.clone(),
            last_trade_time_ms: self.cooldown.last_trade_time_ms,
            last_exit_time_ms: self.last_exit_time_ms,
            sim_balance_sol: self.sim_balance_sol,
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn cooldown(&self) -> &CooldownState {
        &self.cooldown
    }

    pub fn reset_cooldown(&mut self) {
        self.cooldown.reset();
        info!("entry cooldown reset");
    }

    pub fn sim_balance_sol(&self) -> f64 {
        self.sim_balance_sol
    }

    pub fn debit_sim(&mut self, sol: f64) {
        self.sim_balance_sol -= sol;
    }

    /// Entry is allowed only below the position cap and with the cooldown
    /// fully elapsed.
    pub fn can_enter(&self, now_ms: i64) -> bool {
        self.positions.len() < self.max_open_positions && self.cooldown.remaining_secs(now_ms) == 0
    }

    /// Record a successful entry and restart the cooldown clock
    pub fn record_entry(&mut self, position: Position, now_ms: i64) {
        info!(
            mint = %position.mint,
            name = %position.name,
            sol = position.entry_sol,
            signature = %position.signature,
            "position opened"
        );
        self.positions.push(position);
        self.cooldown.mark_trade(now_ms);
    }

    /// Value the held positions without mutating anything; used for
    /// snapshots and the account-stop calculation. Quotes are issued
    /// concurrently and joined before any state is touched.
    pub async fn value_positions(&self, executor: &dyn SwapExecutor) -> HashMap<Uuid, f64> {
        let quotes = join_all(self.positions.iter().map(|position| async move {
            let quote = executor
                .quote(
                    &position.mint,
                    SOL_MINT,
                    position.token_amount,
                    self.trading.max_slippage_pct,
                )
                .await;
            (position.id, position.mint.as_str(), quote)
        }))
        .await;

        let mut valuations = HashMap::new();
        for (id, mint, result) in quotes {
            match result {
                Ok(quote) => {
                    valuations.insert(id, lamports_to_sol(quote.out_amount));
                }
                Err(e) => {
                    // Unvalued positions are skipped this tick and retried
                    // on the next one.
                    warn!(mint, error = %e, "position valuation failed");
                }
            }
        }
        valuations
    }

    /// Evaluate every held position against the exit-rule table and execute
    /// the first matching exit per position. Returns realized trade events.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_positions(
        &mut self,
        executor: &dyn SwapExecutor,
        provider: &dyn MarketDataProvider,
        signals: &SignalConfig,
        mode: TradeMode,
        manual_requested: bool,
        wallet_balance_sol: f64,
        now_ms: i64,
    ) -> (Vec<TradeEvent>, HashMap<Uuid, f64>) {
        let valuations = self.value_positions(executor).await;
        let account_value_sol: f64 = wallet_balance_sol + valuations.values().sum::<f64>();

        let mut events = Vec::new();
        let ids: Vec<Uuid> = self.positions.iter().map(|p| p.id).collect();

        for id in ids {
            let Some(&current_value_sol) = valuations.get(&id) else {
                continue;
            };
            let Some(position) = self.positions.iter().find(|p| p.id == id).cloned() else {
                continue;
            };

            let pnl_sol = current_value_sol - position.entry_sol;
            let pnl_pct = position.pnl_pct(current_value_sol);
            let held_minutes = position.held_minutes(now_ms);

            let trend_extension = self
                .check_trend_extension(provider, signals, &position, pnl_pct, held_minutes)
                .await;

            let ctx = ExitContext {
                pnl_pct,
                pnl_sol,
                held_minutes,
                manual_requested,
                account_value_sol,
                account_floor_sol: self.account_floor_sol,
                trend_extension,
            };

            let Some(reason) = exit::evaluate(&self.exit_config, &ctx) else {
                debug!(
                    mint = %position.mint,
                    pnl_pct,
                    held_minutes,
                    "holding"
                );
                continue;
            };

            match self
                .execute_exit(executor, &position, reason, mode, pnl_pct, now_ms)
                .await
            {
                Ok(event) => events.push(event),
                Err(e) => {
                    // Execution failure is not fatal: the position stays
                    // open and the exit is retried next tick.
                    warn!(
                        mint = %position.mint,
                        reason = %reason,
                        error = %e,
                        "exit execution failed, retrying next tick"
                    );
                }
            }
        }

        (events, valuations)
    }

    /// A soft stop may be deferred one tick when the position is profitable
    /// enough and a fresh candle fetch still shows an intact trend.
    async fn check_trend_extension(
        &self,
        provider: &dyn MarketDataProvider,
        signals: &SignalConfig,
        position: &Position,
        pnl_pct: f64,
        held_minutes: f64,
    ) -> bool {
        let soft = self.exit_config.exit_soft_minutes as f64;
        let hard = self.exit_config.exit_hard_minutes as f64;
        if held_minutes < soft || held_minutes >= hard {
            return false;
        }
        if pnl_pct < self.exit_config.min_pnl_to_extend_pct {
            return false;
        }

        match provider
            .recent_candles(&position.mint, trend_recheck_bars(signals))
            .await
        {
            Ok(candles) => {
                let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
                let holds = trend_ok(&closes, signals.ema_fast, signals.ema_slow);
                if holds {
                    info!(mint = %position.mint, pnl_pct, "soft stop deferred, trend intact");
                }
                holds
            }
            Err(e) => {
                debug!(mint = %position.mint, error = %e, "trend re-check failed, not extending");
                false
            }
        }
    }

    async fn execute_exit(
        &mut self,
        executor: &dyn SwapExecutor,
        position: &Position,
        reason: ExitReason,
        mode: TradeMode,
        pnl_pct: f64,
        now_ms: i64,
    ) -> Result<TradeEvent> {
        let quote = executor
            .quote(
                &position.mint,
                SOL_MINT,
                position.token_amount,
                self.trading.max_slippage_pct,
            )
            .await?;
        let tx = executor.swap(&quote).await?;
        if !executor.confirm(&tx).await? {
            return Err(Error::Confirm(format!(
                "exit transaction {} failed on-chain",
                tx.signature
            )));
        }

        let received_sol = lamports_to_sol(quote.out_amount);
        let pnl_sol = received_sol - position.entry_sol;
        let held_minutes = position.held_minutes(now_ms);

        self.positions.retain(|p| p.id != position.id);
        if mode == TradeMode::Paper {
            self.sim_balance_sol += received_sol;
        }
        self.last_exit_time_ms = now_ms;

        info!(
            mint = %position.mint,
            reason = %reason,
            pnl_sol,
            pnl_pct,
            held_minutes,
            signature = %tx.signature,
            "position closed"
        );

        Ok(TradeEvent::exit(
            &position.mint,
            &position.name,
            received_sol,
            pnl_sol,
            pnl_pct,
            reason.as_str(),
            held_minutes,
            &tx.signature,
            now_ms,
        ))
    }
}
