//! Paper-trading executor
//!
//! Quotes are real (delegated to the live quote path) so prices, impact and
//! fills track the actual market; swaps never leave the process. Fills get
//! a synthetic signature and confirmation always succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::error::Result;

use super::{lamports_to_sol, Quote, SwapExecutor, TxHandle};

const PAPER_SIGNATURE_LEN: usize = 32;

pub struct PaperExecutor {
    quoter: Arc<dyn SwapExecutor>,
}

impl PaperExecutor {
    /// Wrap a live executor, reusing its quote and balance paths
    pub fn new(quoter: Arc<dyn SwapExecutor>) -> Self {
        Self { quoter }
    }

    fn synthetic_signature() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(PAPER_SIGNATURE_LEN)
            .map(char::from)
            .collect();
        format!("paper-{}", suffix)
    }
}

#[async_trait]
impl SwapExecutor for PaperExecutor {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        max_slippage_pct: f64,
    ) -> Result<Quote> {
        self.quoter
            .quote(input_mint, output_mint, amount, max_slippage_pct)
            .await
    }

    async fn swap(&self, quote: &Quote) -> Result<TxHandle> {
        let signature = Self::synthetic_signature();
        info!(
            action = if quote.is_buy() { "buy" } else { "sell" },
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            sol = lamports_to_sol(if quote.is_buy() {
                quote.in_amount
            } else {
                quote.out_amount
            }),
            signature = %signature,
            "paper fill"
        );
        Ok(TxHandle { signature })
    }

    async fn confirm(&self, _tx: &TxHandle) -> Result<bool> {
        Ok(true)
    }

    async fn wallet_balance_sol(&self) -> Result<f64> {
        // The engine tracks the simulated balance itself; this path is only
        // hit if a caller asks the executor directly.
        self.quoter.wallet_balance_sol().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::execution::SOL_MINT;

    struct StaticQuoter;

    #[async_trait]
    impl SwapExecutor for StaticQuoter {
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
                out_amount: amount * 2,
                price_impact_pct: Some(1.0),
                max_slippage_pct,
            })
        }

        async fn swap(&self, _quote: &Quote) -> Result<TxHandle> {
            Err(Error::Swap("static quoter cannot trade".to_string()))
        }

        async fn confirm(&self, _tx: &TxHandle) -> Result<bool> {
            Ok(false)
        }

        async fn wallet_balance_sol(&self) -> Result<f64> {
            Ok(0.0)
        }
    }

    #[tokio::test]
    async fn test_paper_fill_round_trip() {
        let paper = PaperExecutor::new(Arc::new(StaticQuoter));

        let quote = paper
            .quote(SOL_MINT, "Mint111", 1_000_000, 5.0)
            .await
            .unwrap();
        assert_eq!(quote.out_amount, 2_000_000);

        let tx = paper.swap(&quote).await.unwrap();
        assert!(tx.signature.starts_with("paper-"));
        assert!(paper.confirm(&tx).await.unwrap());
    }

    #[test]
    fn test_synthetic_signatures_unique() {
        let a = PaperExecutor::synthetic_signature();
        let b = PaperExecutor::synthetic_signature();
        assert_ne!(a, b);
        assert_eq!(a.len(), "paper-".len() + PAPER_SIGNATURE_LEN);
    }
}
