//! Persisted engine state
//!
//! A single JSON record holding the open-position list, pacing timestamps
//! and the simulated balance. Loaded tolerantly at startup (absence or
//! corruption falls back to defaults) and rewritten after every
//! position-lifecycle transition through a debounced single-writer task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::position::Position;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub last_trade_time_ms: i64,
    #[serde(default)]
    pub last_exit_time_ms: i64,
    #[serde(default)]
    pub sim_balance_sol: f64,
}

impl EngineState {
    /// Load from disk; a missing or malformed file yields the default state
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_json::from_str::<EngineState>(&raw) {
                Ok(state) => {
                    info!(
                        path = %path.display(),
                        positions = state.positions.len(),
                        "loaded engine state"
                    );
                    state
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "state file malformed, starting from defaults"
                    );
                    EngineState::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no state file, starting fresh");
                EngineState::default()
            }
        }
    }
}

/// Write the state via a temp file so a crash mid-write never corrupts it
pub async fn write_atomic(path: &Path, state: &EngineState) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::StatePersistence(e.to_string()))?;
    }

    let raw = serde_json::to_string_pretty(state)
        .map_err(|e| Error::StatePersistence(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, raw)
        .await
        .map_err(|e| Error::StatePersistence(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::StatePersistence(e.to_string()))?;

    debug!(path = %path.display(), positions = state.positions.len(), "state persisted");
    Ok(())
}

/// Debounced single-writer handle
///
/// Saves enqueue the full state; a background task coalesces bursts inside
/// the debounce window and writes the latest version, preserving ordering.
#[derive(Clone)]
pub struct StateStore {
    tx: mpsc::UnboundedSender<EngineState>,
}

impl StateStore {
    pub fn spawn(path: PathBuf, debounce: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineState>();

        tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                // Coalesce writes arriving within the debounce window.
                loop {
                    match tokio::time::timeout(debounce, rx.recv()).await {
                        Ok(Some(next)) => latest = next,
                        Ok(None) => {
                            if let Err(e) = write_atomic(&path, &latest).await {
                                error!(error = %e, "final state write failed");
                            }
                            return;
                        }
                        Err(_) => break,
                    }
                }
                if let Err(e) = write_atomic(&path, &latest).await {
                    error!(error = %e, "state write failed");
                }
            }
        });

        Self { tx }
    }

    pub fn save(&self, state: EngineState) {
        if self.tx.send(state).is_err() {
            error!("state writer task is gone, state not persisted");
        }
    }
}
