//! Exit condition table
//!
//! The exit priority contract is a first-class artifact: an ordered list of
//! (reason, predicate) pairs evaluated top to bottom, first match wins.
//! Every position is evaluated independently against the same table each
//! tick.

use crate::config::ExitConfig;

use super::ExitReason;

/// Everything a predicate may look at for one position on one tick
#[derive(Debug, Clone, Copy)]
pub struct ExitContext {
    /// Unrealized PnL, percent of entry
    pub pnl_pct: f64,
    /// Unrealized PnL in SOL
    pub pnl_sol: f64,
    /// Minutes since entry
    pub held_minutes: f64,
    /// Level-triggered manual exit flag, consumed this tick
    pub manual_requested: bool,
    /// Wallet + all open positions, in SOL
    pub account_value_sol: f64,
    /// Account value at or below this liquidates everything
    pub account_floor_sol: f64,
    /// True when profit and a fresh trend re-check justify deferring the
    /// soft time stop one more tick
    pub trend_extension: bool,
}

/// One row of the priority table
pub struct ExitRule {
    pub reason: ExitReason,
    pub triggered: fn(&ExitConfig, &ExitContext) -> bool,
}

fn manual(_config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.manual_requested
}

fn account_stop(_config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.account_value_sol <= ctx.account_floor_sol
}

fn stop_loss(config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.pnl_pct <= -config.stop_loss_pct * 100.0
}

fn take_profit(config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.pnl_pct >= config.take_profit_pct || ctx.pnl_sol >= config.take_profit_quote_sol
}

fn hard_time(config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.held_minutes >= config.exit_hard_minutes as f64
}

fn soft_time(config: &ExitConfig, ctx: &ExitContext) -> bool {
    ctx.held_minutes >= config.exit_soft_minutes as f64 && !ctx.trend_extension
}

/// Priority order is the array order; do not reorder without revisiting
/// every caller's expectations.
pub static EXIT_RULES: &[ExitRule] = &[
    ExitRule {
        reason: ExitReason::Manual,
        triggered: manual,
    },
    ExitRule {
        reason: ExitReason::AccountStop,
        triggered: account_stop,
    },
    ExitRule {
        reason: ExitReason::StopLoss,
        triggered: stop_loss,
    },
    ExitRule {
        reason: ExitReason::TakeProfit,
        triggered: take_profit,
    },
    ExitRule {
        reason: ExitReason::HardTime,
        triggered: hard_time,
    },
    ExitRule {
        reason: ExitReason::SoftTime,
        triggered: soft_time,
    },
];

/// First matching rule, or `None` to keep holding
pub fn evaluate(config: &ExitConfig, ctx: &ExitContext) -> Option<ExitReason> {
    EXIT_RULES
        .iter()
        .find(|rule| (rule.triggered)(config, ctx))
        .map(|rule| rule.reason)
}
