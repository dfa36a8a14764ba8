//! Live swap execution over HTTP
//!
//! Quotes come from the aggregator quote API; swaps go through the hosted
//! trade API, which signs server-side against the API key's wallet; the
//! confirmation poll and balance lookup use plain JSON-RPC.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};

use super::{lamports_to_sol, Quote, SwapExecutor, TxHandle};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: String,
    price_impact_pct: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TradeResponse {
    signature: Option<String>,
    error: Option<String>,
}

pub struct PortalExecutor {
    http: reqwest::Client,
    config: ExecutionConfig,
}

impl PortalExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.portal_api_key.is_empty()
    }

    async fn rpc_call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = resp.json().await?;
        if let Some(err) = value.get("error") {
            return Err(Error::Provider(format!("RPC error: {}", err)));
        }
        Ok(value.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl SwapExecutor for PortalExecutor {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        max_slippage_pct: f64,
    ) -> Result<Quote> {
        let slippage_bps = (max_slippage_pct * 100.0).round() as u32;
        let url = format!(
            "{}?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.config.quote_url, input_mint, output_mint, amount, slippage_bps
        );

        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Quote(format!("HTTP {}: {}", status, body)));
        }
        let parsed: QuoteResponse = resp.json().await?;

        let out_amount = parsed
            .out_amount
            .parse::<u64>()
            .map_err(|e| Error::Quote(format!("bad outAmount: {}", e)))?;
        let price_impact_pct = parsed
            .price_impact_pct
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok());

        debug!(
            input_mint,
            output_mint, amount, out_amount, ?price_impact_pct, "quote received"
        );

        Ok(Quote {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            in_amount: amount,
            out_amount,
            price_impact_pct,
            max_slippage_pct,
        })
    }

    async fn swap(&self, quote: &Quote) -> Result<TxHandle> {
        let (action, mint, amount, denominated_in_sol) = if quote.is_buy() {
            (
                "buy",
                quote.output_mint.clone(),
                lamports_to_sol(quote.in_amount).to_string(),
                "true",
            )
        } else {
            (
                "sell",
                quote.input_mint.clone(),
                quote.in_amount.to_string(),
                "false",
            )
        };

        let body = json!({
            "action": action,
            "mint": mint,
            "amount": amount,
            "denominatedInSol": denominated_in_sol,
            "slippage": quote.max_slippage_pct,
            "priorityFee": 0.0005,
            "pool": "auto",
        });

        let url = format!("{}?api-key={}", self.config.trade_url, self.config.portal_api_key);
        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Swap(format!("HTTP {}: {}", status, text)));
        }
        let parsed: TradeResponse = resp.json().await?;

        if let Some(err) = parsed.error {
            return Err(Error::Swap(err));
        }
        let signature = parsed
            .signature
            .ok_or_else(|| Error::Swap("no signature in trade response".to_string()))?;

        info!(action, mint = %mint, signature = %signature, "swap submitted");
        Ok(TxHandle { signature })
    }

    async fn confirm(&self, tx: &TxHandle) -> Result<bool> {
        for attempt in 0..self.config.confirm_attempts {
            let result = self
                .rpc_call(
                    "getSignatureStatuses",
                    json!([[tx.signature], {"searchTransactionHistory": true}]),
                )
                .await?;

            let status = result
                .get("value")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .cloned()
                .unwrap_or(serde_json::Value::Null);

            if !status.is_null() {
                if status.get("err").map(|e| !e.is_null()).unwrap_or(false) {
                    warn!(signature = %tx.signature, "transaction landed with error");
                    return Ok(false);
                }
                let confirmation = status
                    .get("confirmationStatus")
                    .and_then(|c| c.as_str())
                    .unwrap_or("");
                if confirmation == "confirmed" || confirmation == "finalized" {
                    return Ok(true);
                }
            }

            debug!(signature = %tx.signature, attempt, "awaiting confirmation");
            tokio::time::sleep(std::time::Duration::from_millis(
                self.config.confirm_poll_ms,
            ))
            .await;
        }

        Err(Error::Confirm(format!(
            "transaction {} not confirmed after {} attempts",
            tx.signature, self.config.confirm_attempts
        )))
    }

    async fn wallet_balance_sol(&self) -> Result<f64> {
        if self.config.wallet_address.is_empty() {
            return Err(Error::MissingCredential(
                "wallet_address required for balance lookups".to_string(),
            ));
        }
        let result = self
            .rpc_call("getBalance", json!([self.config.wallet_address]))
            .await?;
        let lamports = result
            .get("value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::Provider("malformed getBalance response".to_string()))?;
        Ok(lamports_to_sol(lamports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_response_parsing() {
        let raw = r#"{"outAmount": "123456", "priceImpactPct": "1.25", "routePlan": []}"#;
        let parsed: QuoteResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.out_amount, "123456");
        assert_eq!(parsed.price_impact_pct.as_deref(), Some("1.25"));
    }

    #[test]
    fn test_trade_response_parsing() {
        let ok: TradeResponse =
            serde_json::from_str(r#"{"signature": "5abc"}"#).unwrap();
        assert_eq!(ok.signature.as_deref(), Some("5abc"));

        let failed: TradeResponse =
            serde_json::from_str(r#"{"error": "insufficient balance"}"#).unwrap();
        assert!(failed.signature.is_none());
        assert_eq!(failed.error.as_deref(), Some("insufficient balance"));
    }
}
