//! Published engine snapshots
//!
//! After every state change the engine publishes a serializable snapshot on
//! a watch channel for external consumers (dashboard, chat bot). The
//! publisher also keeps a bounded ring of recent trade events.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::watch;

use crate::controls::TradeMode;
use crate::position::{CooldownState, Position};

/// Trade events retained for consumers
const RECENT_EVENTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeEventKind {
    Entry,
    Exit,
}

/// One realized entry or exit
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    pub kind: TradeEventKind,
    pub mint: String,
    pub name: String,
    /// SOL spent (entry) or received (exit)
    pub sol: f64,
    pub pnl_sol: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub reason: Option<String>,
    pub held_minutes: Option<f64>,
    pub signature: String,
    pub time_ms: i64,
}

impl TradeEvent {
    pub fn entry(mint: &str, name: &str, sol: f64, signature: &str, time_ms: i64) -> Self {
        Self {
            kind: TradeEventKind::Entry,
            mint: mint.to_string(),
            name: name.to_string(),
            sol,
            pnl_sol: None,
            pnl_pct: None,
            reason: None,
            held_minutes: None,
            signature: signature.to_string(),
            time_ms,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn exit(
        mint: &str,
        name: &str,
        received_sol: f64,
        pnl_sol: f64,
        pnl_pct: f64,
        reason: &str,
        held_minutes: f64,
        signature: &str,
        time_ms: i64,
    ) -> Self {
        Self {
            kind: TradeEventKind::Exit,
            mint: mint.to_string(),
            name: name.to_string(),
            sol: received_sol,
            pnl_sol: Some(pnl_sol),
            pnl_pct: Some(pnl_pct),
            reason: Some(reason.to_string()),
            held_minutes: Some(held_minutes),
            signature: signature.to_string(),
            time_ms,
        }
    }
}

/// Read-only view of one open position
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub id: String,
    pub mint: String,
    pub name: String,
    pub entry_sol: f64,
    pub current_value_sol: Option<f64>,
    pub pnl_pct: Option<f64>,
    pub held_minutes: f64,
}

impl PositionView {
    pub fn from_position(
        position: &Position,
        current_value_sol: Option<f64>,
        now_ms: i64,
    ) -> Self {
        Self {
            id: position.id.to_string(),
            mint: position.mint.clone(),
            name: position.name.clone(),
            entry_sol: position.entry_sol,
            current_value_sol,
            pnl_pct: current_value_sol.map(|v| position.pnl_pct(v)),
            held_minutes: position.held_minutes(now_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CooldownView {
    pub remaining_secs: u64,
    pub next_entry_ms: i64,
}

impl CooldownView {
    pub fn from_state(cooldown: &CooldownState, now_ms: i64) -> Self {
        Self {
            remaining_secs: cooldown.remaining_secs(now_ms),
            next_entry_ms: cooldown.next_entry_ms(),
        }
    }
}

/// Full engine state published to external consumers
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub status: String,
    pub mode: TradeMode,
    pub wallet_balance_sol: f64,
    pub sim_balance_sol: f64,
    pub positions: Vec<PositionView>,
    pub cooldown: CooldownView,
    pub recent_events: Vec<TradeEvent>,
    pub updated_at_ms: i64,
}

impl EngineSnapshot {
    fn idle() -> Self {
        Self {
            status: "starting".to_string(),
            mode: TradeMode::Paper,
            wallet_balance_sol: 0.0,
            sim_balance_sol: 0.0,
            positions: vec![],
            cooldown: CooldownView {
                remaining_secs: 0,
                next_entry_ms: 0,
            },
            recent_events: vec![],
            updated_at_ms: 0,
        }
    }
}

/// Owns the watch channel and the event ring
pub struct SnapshotPublisher {
    tx: watch::Sender<EngineSnapshot>,
    events: VecDeque<TradeEvent>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(EngineSnapshot::idle());
        Self {
            tx,
            events: VecDeque::with_capacity(RECENT_EVENTS),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.tx.subscribe()
    }

    pub fn record_event(&mut self, event: TradeEvent) {
        if self.events.len() == RECENT_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn recent_events(&self) -> Vec<TradeEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn publish(&self, mut snapshot: EngineSnapshot) {
        snapshot.recent_events = self.recent_events();
        // Send only fails with no receivers, which is fine: the snapshot is
        // advisory output.
        let _ = self.tx.send(snapshot);
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ring_is_bounded() {
        let mut publisher = SnapshotPublisher::new();
        for i in 0..(RECENT_EVENTS + 10) {
            publisher.record_event(TradeEvent::entry("m", "n", 0.1, "sig", i as i64));
        }
        let events = publisher.recent_events();
        assert_eq!(events.len(), RECENT_EVENTS);
        // Oldest entries were evicted first.
        assert_eq!(events[0].time_ms, 10);
    }

    #[test]
    fn test_publish_reaches_subscribers() {
        let mut publisher = SnapshotPublisher::new();
        let rx = publisher.subscribe();

        publisher.record_event(TradeEvent::entry("m", "n", 0.1, "sig", 7));
        let mut snapshot = EngineSnapshot::idle();
        snapshot.status = "running".to_string();
        publisher.publish(snapshot);

        let seen = rx.borrow();
        assert_eq!(seen.status, "running");
        assert_eq!(seen.recent_events.len(), 1);
    }
}
