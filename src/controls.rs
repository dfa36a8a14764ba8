//! Manual control surface
//!
//! External callers (dashboard, bot) request actions here; the engine
//! consumes the queued flags at the next tick boundary so all state
//! mutation stays on the single scheduling loop.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Live vs simulated execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeMode {
    Live,
    #[serde(alias = "simulated")]
    Paper,
}

impl TradeMode {
    fn to_u8(self) -> u8 {
        match self {
            TradeMode::Live => 0,
            TradeMode::Paper => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        if value == 0 {
            TradeMode::Live
        } else {
            TradeMode::Paper
        }
    }
}

impl std::fmt::Display for TradeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeMode::Live => f.write_str("live"),
            TradeMode::Paper => f.write_str("paper"),
        }
    }
}

/// Explicit outcome of a control request
#[derive(Debug, Clone, Serialize)]
pub struct ControlResult {
    pub ok: bool,
    pub changed: bool,
    pub message: String,
}

impl ControlResult {
    fn accepted(changed: bool, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            changed,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            changed: false,
            message: message.into(),
        }
    }
}

struct ControlShared {
    exit_requested: AtomicBool,
    cooldown_reset_requested: AtomicBool,
    mode: AtomicU8,
    /// Mirror of the manager's open-position count, for request validation
    open_positions: AtomicUsize,
    live_available: bool,
}

/// Cloneable handle shared between the engine and external callers
#[derive(Clone)]
pub struct Controls {
    inner: Arc<ControlShared>,
}

impl Controls {
    pub fn new(initial_mode: TradeMode, live_available: bool) -> Self {
        Self {
            inner: Arc::new(ControlShared {
                exit_requested: AtomicBool::new(false),
                cooldown_reset_requested: AtomicBool::new(false),
                mode: AtomicU8::new(initial_mode.to_u8()),
                open_positions: AtomicUsize::new(0),
                live_available,
            }),
        }
    }

    /// Queue an exit of all open positions; idempotent while queued
    pub fn request_exit(&self) -> ControlResult {
        let already = self.inner.exit_requested.swap(true, Ordering::SeqCst);
        if already {
            ControlResult::accepted(false, "exit already queued")
        } else {
            ControlResult::accepted(true, "exit queued for next tick")
        }
    }

    /// Clear the entry cooldown; rejected while any position is open
    pub fn request_cooldown_reset(&self) -> ControlResult {
        let open = self.inner.open_positions.load(Ordering::SeqCst);
        if open > 0 {
            return ControlResult::rejected(format!(
                "cannot reset cooldown with {} open position(s)",
                open
            ));
        }
        self.inner
            .cooldown_reset_requested
            .store(true, Ordering::SeqCst);
        ControlResult::accepted(true, "cooldown reset queued")
    }

    /// Switch between live and paper execution
    pub fn request_mode_change(&self, mode: TradeMode) -> ControlResult {
        if mode == TradeMode::Live && !self.inner.live_available {
            return ControlResult::rejected("live execution is not configured");
        }
        let previous = TradeMode::from_u8(self.inner.mode.swap(mode.to_u8(), Ordering::SeqCst));
        if previous == mode {
            ControlResult::accepted(false, format!("mode already {}", mode))
        } else {
            ControlResult::accepted(true, format!("mode changed {} -> {}", previous, mode))
        }
    }

    pub fn mode(&self) -> TradeMode {
        TradeMode::from_u8(self.inner.mode.load(Ordering::SeqCst))
    }

    // Engine-side consumption.

    /// Take the level-triggered exit flag, clearing it
    pub fn take_exit_request(&self) -> bool {
        self.inner.exit_requested.swap(false, Ordering::SeqCst)
    }

    pub fn take_cooldown_reset(&self) -> bool {
        self.inner
            .cooldown_reset_requested
            .swap(false, Ordering::SeqCst)
    }

    /// Keep the open-position mirror current after each tick
    pub fn set_open_positions(&self, count: usize) {
        self.inner.open_positions.store(count, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_request_idempotent_while_queued() {
        let controls = Controls::new(TradeMode::Paper, false);

        let first = controls.request_exit();
        assert!(first.ok && first.changed);

        let second = controls.request_exit();
        assert!(second.ok);
        assert!(!second.changed);

        // Consumed once, then a new request queues again.
        assert!(controls.take_exit_request());
        assert!(!controls.take_exit_request());
        assert!(controls.request_exit().changed);
    }

    #[test]
    fn test_cooldown_reset_rejected_with_open_positions() {
        let controls = Controls::new(TradeMode::Paper, false);
        controls.set_open_positions(2);

        let result = controls.request_cooldown_reset();
        assert!(!result.ok);
        // The queued flag must not have been set.
        assert!(!controls.take_cooldown_reset());
    }

    #[test]
    fn test_cooldown_reset_accepted_when_flat() {
        let controls = Controls::new(TradeMode::Paper, false);
        controls.set_open_positions(0);

        assert!(controls.request_cooldown_reset().ok);
        assert!(controls.take_cooldown_reset());
    }

    #[test]
    fn test_mode_change_noop_when_unchanged() {
        let controls = Controls::new(TradeMode::Paper, true);

        let result = controls.request_mode_change(TradeMode::Paper);
        assert!(result.ok);
        assert!(!result.changed);

        let result = controls.request_mode_change(TradeMode::Live);
        assert!(result.ok && result.changed);
        assert_eq!(controls.mode(), TradeMode::Live);
    }

    #[test]
    fn test_live_mode_rejected_without_credentials() {
        let controls = Controls::new(TradeMode::Paper, false);
        let result = controls.request_mode_change(TradeMode::Live);
        assert!(!result.ok);
        assert_eq!(controls.mode(), TradeMode::Paper);
    }

    #[test]
    fn test_simulated_alias_deserializes() {
        let mode: TradeMode = serde_json::from_str(r#""simulated""#).unwrap();
        assert_eq!(mode, TradeMode::Paper);
    }
}
