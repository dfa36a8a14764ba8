//! Position data model and entry pacing

pub mod exit;
pub mod manager;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use exit::{ExitContext, ExitRule, EXIT_RULES};
pub use manager::PositionManager;

/// One open holding, owned exclusively by the position manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Unique for the lifetime of the position; targets exits among
    /// several concurrently open holdings
    pub id: Uuid,
    /// Token mint address
    pub mint: String,
    pub name: String,
    /// Entry timestamp, Unix milliseconds
    pub entry_time_ms: i64,
    /// SOL spent to open
    pub entry_sol: f64,
    /// Raw token amount held
    pub token_amount: u64,
    pub token_decimals: u8,
    /// Entry transaction signature
    pub signature: String,
    pub entry_snapshot: EntrySnapshot,
}

/// Selection context frozen at entry time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub score: f64,
    pub tier: String,
    pub price_impact_pct: Option<f64>,
    pub rug_score: f64,
}

impl Position {
    pub fn held_minutes(&self, now_ms: i64) -> f64 {
        (now_ms - self.entry_time_ms).max(0) as f64 / 60_000.0
    }

    pub fn ui_amount(&self) -> f64 {
        self.token_amount as f64 / 10f64.powi(self.token_decimals as i32)
    }

    /// PnL percent for a given current value in SOL
    pub fn pnl_pct(&self, current_value_sol: f64) -> f64 {
        if self.entry_sol <= 0.0 {
            return 0.0;
        }
        (current_value_sol / self.entry_sol - 1.0) * 100.0
    }
}

/// Why a position was closed, in evaluation priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Manual,
    AccountStop,
    StopLoss,
    TakeProfit,
    HardTime,
    SoftTime,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Manual => "manual",
            ExitReason::AccountStop => "account_stop",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::HardTime => "hard_time",
            ExitReason::SoftTime => "soft_time",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry pacing: no new entry while `remaining_secs > 0`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CooldownState {
    pub last_trade_time_ms: i64,
    pub cooldown_minutes: u64,
}

impl CooldownState {
    pub fn new(last_trade_time_ms: i64, cooldown_minutes: u64) -> Self {
        Self {
            last_trade_time_ms,
            cooldown_minutes,
        }
    }

    pub fn next_entry_ms(&self) -> i64 {
        if self.last_trade_time_ms <= 0 {
            return 0;
        }
        self.last_trade_time_ms + (self.cooldown_minutes * 60_000) as i64
    }

    pub fn remaining_secs(&self, now_ms: i64) -> u64 {
        let remaining_ms = self.next_entry_ms() - now_ms;
        if remaining_ms <= 0 {
            0
        } else {
            // Round up so a 1ms remainder still blocks entry.
            ((remaining_ms + 999) / 1000) as u64
        }
    }

    pub fn mark_trade(&mut self, now_ms: i64) {
        self.last_trade_time_ms = now_ms;
    }

    pub fn reset(&mut self) {
        self.last_trade_time_ms = 0;
    }
}
