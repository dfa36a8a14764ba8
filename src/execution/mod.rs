//! Swap execution boundary
//!
//! Trading is consumed through three narrow operations: quote a trade,
//! submit the swap, confirm the transaction. Wallet custody and signing
//! live behind the hosted trade API; nothing in this crate touches keys.

pub mod paper;
pub mod portal;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use paper::PaperExecutor;
pub use portal::PortalExecutor;

/// Wrapped-SOL mint, the quote currency for every trade
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL).round() as u64
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

/// A priced trade ready for submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    /// Raw input amount (lamports for SOL, base units for tokens)
    pub in_amount: u64,
    /// Raw output amount the aggregator expects
    pub out_amount: u64,
    /// Estimated slippage against current liquidity, percent
    pub price_impact_pct: Option<f64>,
    pub max_slippage_pct: f64,
}

impl Quote {
    pub fn is_buy(&self) -> bool {
        self.input_mint == SOL_MINT
    }
}

/// Handle for a submitted transaction
#[derive(Debug, Clone)]
pub struct TxHandle {
    pub signature: String,
}

/// The external trading collaborator
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// Price a trade of `amount` raw units of `input_mint` into `output_mint`
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        max_slippage_pct: f64,
    ) -> Result<Quote>;

    /// Submit the swap; returns a handle for confirmation
    async fn swap(&self, quote: &Quote) -> Result<TxHandle>;

    /// Await transaction confirmation; `Ok(false)` means it landed and failed
    async fn confirm(&self, tx: &TxHandle) -> Result<bool>;

    /// Current wallet balance in SOL
    async fn wallet_balance_sol(&self) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lamport_conversion_round_trip() {
        assert_eq!(sol_to_lamports(1.5), 1_500_000_000);
        assert!((lamports_to_sol(1_500_000_000) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_quote_direction() {
        let quote = Quote {
            input_mint: SOL_MINT.to_string(),
            output_mint: "Mint111".to_string(),
            in_amount: 1,
            out_amount: 2,
            price_impact_pct: None,
            max_slippage_pct: 5.0,
        };
        assert!(quote.is_buy());
    }
}
