//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub exits: ExitConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// Tick loop and portfolio pacing
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Seconds between engine ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Maximum number of concurrently open positions
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Minimum minutes between position entries
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// Maximum seed tokens evaluated per scan
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    /// Combined wallet + positions value at which everything is liquidated
    #[serde(default = "default_account_floor_sol")]
    pub account_floor_sol: f64,
    /// Starting balance for paper trading
    #[serde(default = "default_paper_starting_sol")]
    pub paper_starting_sol: f64,
}

fn default_poll_interval_secs() -> u64 { 30 }
fn default_max_open_positions() -> usize { 2 }
fn default_cooldown_minutes() -> u64 { 10 }
fn default_scan_limit() -> usize { 12 }
fn default_account_floor_sol() -> f64 { 0.05 }
fn default_paper_starting_sol() -> f64 { 1.0 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_open_positions: default_max_open_positions(),
            cooldown_minutes: default_cooldown_minutes(),
            scan_limit: default_scan_limit(),
            account_floor_sol: default_account_floor_sol(),
            paper_starting_sol: default_paper_starting_sol(),
        }
    }
}

/// Market-data provider endpoints and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Seconds a quota-exhausted provider stays blocked before retry
    #[serde(default = "default_failover_cooldown_secs")]
    pub failover_cooldown_secs: u64,
    #[serde(default)]
    pub birdeye: BirdeyeConfig,
    #[serde(default)]
    pub gecko: GeckoConfig,
}

fn default_failover_cooldown_secs() -> u64 { 900 }

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            failover_cooldown_secs: default_failover_cooldown_secs(),
            birdeye: BirdeyeConfig::default(),
            gecko: GeckoConfig::default(),
        }
    }
}

/// Primary (credentialed) market-data provider
#[derive(Debug, Clone, Deserialize)]
pub struct BirdeyeConfig {
    /// API key; empty means the provider is not configured and is skipped
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_birdeye_base_url")]
    pub base_url: String,
    #[serde(default = "default_birdeye_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_birdeye_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

fn default_birdeye_base_url() -> String { "https://public-api.birdeye.so".to_string() }
fn default_birdeye_min_interval_ms() -> u64 { 500 }
fn default_birdeye_cache_ttl_ms() -> u64 { 15_000 }
fn default_provider_max_retries() -> u32 { 3 }

impl Default for BirdeyeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_birdeye_base_url(),
            min_interval_ms: default_birdeye_min_interval_ms(),
            cache_ttl_ms: default_birdeye_cache_ttl_ms(),
            max_retries: default_provider_max_retries(),
        }
    }
}

/// Alternate (keyless) market-data provider
#[derive(Debug, Clone, Deserialize)]
pub struct GeckoConfig {
    #[serde(default = "default_gecko_base_url")]
    pub base_url: String,
    /// Free tier allows ~30 calls/min
    #[serde(default = "default_gecko_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_gecko_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

fn default_gecko_base_url() -> String { "https://api.geckoterminal.com/api/v2".to_string() }
fn default_gecko_min_interval_ms() -> u64 { 2_000 }
fn default_gecko_cache_ttl_ms() -> u64 { 30_000 }

impl Default for GeckoConfig {
    fn default() -> Self {
        Self {
            base_url: default_gecko_base_url(),
            min_interval_ms: default_gecko_min_interval_ms(),
            cache_ttl_ms: default_gecko_cache_ttl_ms(),
            max_retries: default_provider_max_retries(),
        }
    }
}

/// Trade sizing
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
    /// Maximum slippage tolerated on execution, percent
    #[serde(default = "default_max_slippage_pct")]
    pub max_slippage_pct: f64,
    /// Maximum quoted price impact accepted at entry, percent
    #[serde(default = "default_max_price_impact_pct")]
    pub max_price_impact_pct: f64,
}

fn default_buy_amount_sol() -> f64 { 0.05 }
fn default_max_slippage_pct() -> f64 { 5.0 }
fn default_max_price_impact_pct() -> f64 { 8.0 }

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            buy_amount_sol: default_buy_amount_sol(),
            max_slippage_pct: default_max_slippage_pct(),
            max_price_impact_pct: default_max_price_impact_pct(),
        }
    }
}

/// Candidate filter gates
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_min_vol24h_usd")]
    pub min_vol24h_usd: f64,
    /// Minimum traded volume in the most recent 15-minute bar
    #[serde(default = "default_min_vol15m_usd")]
    pub min_vol15m_usd: f64,
    /// Maximum top-holder share of supply, percent
    #[serde(default = "default_max_holder_pct")]
    pub max_holder_pct: f64,
    /// Minimum candle history required to compute signals
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    /// Regex deny-list applied to token names
    #[serde(default)]
    pub blocked_name_patterns: Vec<String>,
    /// Rug-risk acceptance ceiling; negative disables the gate
    #[serde(default = "default_max_rug_score")]
    pub max_rug_score: f64,
}

fn default_min_liquidity_usd() -> f64 { 20_000.0 }
fn default_min_vol24h_usd() -> f64 { 50_000.0 }
fn default_min_vol15m_usd() -> f64 { 500.0 }
fn default_max_holder_pct() -> f64 { 30.0 }
fn default_min_candles() -> usize { 30 }
fn default_max_rug_score() -> f64 { 6.0 }

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: default_min_liquidity_usd(),
            min_vol24h_usd: default_min_vol24h_usd(),
            min_vol15m_usd: default_min_vol15m_usd(),
            max_holder_pct: default_max_holder_pct(),
            min_candles: default_min_candles(),
            blocked_name_patterns: vec![],
            max_rug_score: default_max_rug_score(),
        }
    }
}

/// Which signal family drives entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalMode {
    Indicator,
    Momentum,
}

/// Technical signal parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_signal_mode")]
    pub mode: SignalMode,
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    /// RSI below this marks an oversold valley
    #[serde(default = "default_rsi_low")]
    pub rsi_low: f64,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_std_mult")]
    pub bollinger_std_mult: f64,
    /// Volume must exceed the 10-bar average by this factor to count as a spike
    #[serde(default = "default_volume_spike_mult")]
    pub volume_spike_mult: f64,
    /// Momentum short lookback, in bars
    #[serde(default = "default_momentum_short_bars")]
    pub momentum_short_bars: usize,
    /// Momentum long lookback, in bars
    #[serde(default = "default_momentum_long_bars")]
    pub momentum_long_bars: usize,
    /// Minimum short-window percent change; zero leaves it unconstrained
    #[serde(default = "default_momentum_min_short_pct")]
    pub momentum_min_short_pct: f64,
    /// Minimum long-window percent change; zero leaves it unconstrained
    #[serde(default)]
    pub momentum_min_long_pct: f64,
    /// Window for range/chop volatility, in bars
    #[serde(default = "default_volatility_bars")]
    pub volatility_bars: usize,
    /// Minimum high-low range over the volatility window, percent
    #[serde(default = "default_min_range_pct")]
    pub min_range_pct: f64,
    /// Weight of range percent in the composite score
    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,
    /// Weight subtracting rug-risk score from the composite score
    #[serde(default = "default_risk_weight")]
    pub risk_weight: f64,
}

fn default_signal_mode() -> SignalMode { SignalMode::Indicator }
fn default_ema_fast() -> usize { 9 }
fn default_ema_slow() -> usize { 21 }
fn default_rsi_period() -> usize { 14 }
fn default_rsi_low() -> f64 { 35.0 }
fn default_bollinger_period() -> usize { 20 }
fn default_bollinger_std_mult() -> f64 { 2.0 }
fn default_volume_spike_mult() -> f64 { 1.5 }
fn default_momentum_short_bars() -> usize { 5 }
fn default_momentum_long_bars() -> usize { 30 }
fn default_momentum_min_short_pct() -> f64 { 1.0 }
fn default_volatility_bars() -> usize { 20 }
fn default_min_range_pct() -> f64 { 3.0 }
fn default_volatility_weight() -> f64 { 0.5 }
fn default_risk_weight() -> f64 { 0.75 }

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            mode: default_signal_mode(),
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            rsi_period: default_rsi_period(),
            rsi_low: default_rsi_low(),
            bollinger_period: default_bollinger_period(),
            bollinger_std_mult: default_bollinger_std_mult(),
            volume_spike_mult: default_volume_spike_mult(),
            momentum_short_bars: default_momentum_short_bars(),
            momentum_long_bars: default_momentum_long_bars(),
            momentum_min_short_pct: default_momentum_min_short_pct(),
            momentum_min_long_pct: 0.0,
            volatility_bars: default_volatility_bars(),
            min_range_pct: default_min_range_pct(),
            volatility_weight: default_volatility_weight(),
            risk_weight: default_risk_weight(),
        }
    }
}

/// Exit state-machine thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct ExitConfig {
    /// Stop loss as a fraction of entry; 0.2 exits at -20% PnL
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    /// Take profit trigger in PnL percent
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    /// Take profit trigger in absolute SOL profit
    #[serde(default = "default_take_profit_quote_sol")]
    pub take_profit_quote_sol: f64,
    /// Unconditional time stop, minutes
    #[serde(default = "default_exit_hard_minutes")]
    pub exit_hard_minutes: u64,
    /// Soft time stop, minutes; deferrable when the trend still holds
    #[serde(default = "default_exit_soft_minutes")]
    pub exit_soft_minutes: u64,
    /// Minimum PnL percent required before a soft stop may be deferred
    #[serde(default = "default_min_pnl_to_extend_pct")]
    pub min_pnl_to_extend_pct: f64,
}

fn default_stop_loss_pct() -> f64 { 0.2 }
fn default_take_profit_pct() -> f64 { 25.0 }
fn default_take_profit_quote_sol() -> f64 { 0.5 }
fn default_exit_hard_minutes() -> u64 { 240 }
fn default_exit_soft_minutes() -> u64 { 60 }
fn default_min_pnl_to_extend_pct() -> f64 { 5.0 }

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            take_profit_quote_sol: default_take_profit_quote_sol(),
            exit_hard_minutes: default_exit_hard_minutes(),
            exit_soft_minutes: default_exit_soft_minutes(),
            min_pnl_to_extend_pct: default_min_pnl_to_extend_pct(),
        }
    }
}

/// Swap execution endpoints (quote aggregator + hosted trade API)
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// API key for the hosted trade API; required for live mode only
    #[serde(default)]
    pub portal_api_key: String,
    /// Wallet address tied to the API key, used for balance lookups
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default = "default_quote_url")]
    pub quote_url: String,
    #[serde(default = "default_trade_url")]
    pub trade_url: String,
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Attempts when polling for transaction confirmation
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,
    /// Delay between confirmation polls, milliseconds
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

fn default_quote_url() -> String { "https://quote-api.jup.ag/v6/quote".to_string() }
fn default_trade_url() -> String { "https://pumpportal.fun/api/trade".to_string() }
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_confirm_attempts() -> u32 { 10 }
fn default_confirm_poll_ms() -> u64 { 1_500 }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            portal_api_key: String::new(),
            wallet_address: String::new(),
            quote_url: default_quote_url(),
            trade_url: default_trade_url(),
            rpc_url: default_rpc_url(),
            confirm_attempts: default_confirm_attempts(),
            confirm_poll_ms: default_confirm_poll_ms(),
        }
    }
}

/// Optional pre-trained scoring model
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Path to the exported model weights; absent means rule-based scoring only
    #[serde(default)]
    pub path: Option<String>,
}

/// Persisted engine state
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: String,
    /// Debounce window batching bursts of state writes, milliseconds
    #[serde(default = "default_state_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_state_path() -> String { "state/engine_state.json".to_string() }
fn default_state_debounce_ms() -> u64 { 250 }

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            debounce_ms: default_state_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SCOUT_)
            .add_source(
                config::Environment::with_prefix("SCOUT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }

        if self.engine.max_open_positions == 0 {
            anyhow::bail!("max_open_positions must be at least 1");
        }

        if self.trading.buy_amount_sol <= 0.0 {
            anyhow::bail!("buy_amount_sol must be positive");
        }

        if self.trading.max_slippage_pct <= 0.0 || self.trading.max_slippage_pct > 100.0 {
            anyhow::bail!("max_slippage_pct must be between 0 and 100");
        }

        if self.exits.stop_loss_pct <= 0.0 || self.exits.stop_loss_pct >= 1.0 {
            anyhow::bail!("stop_loss_pct must be a fraction between 0 and 1");
        }

        if self.exits.take_profit_pct <= 0.0 {
            anyhow::bail!("take_profit_pct must be positive");
        }

        if self.exits.exit_soft_minutes > self.exits.exit_hard_minutes {
            anyhow::bail!(
                "exit_soft_minutes ({}) cannot exceed exit_hard_minutes ({})",
                self.exits.exit_soft_minutes,
                self.exits.exit_hard_minutes
            );
        }

        if self.signals.ema_fast >= self.signals.ema_slow {
            anyhow::bail!(
                "ema_fast ({}) must be shorter than ema_slow ({})",
                self.signals.ema_fast,
                self.signals.ema_slow
            );
        }

        if self.signals.momentum_short_bars >= self.signals.momentum_long_bars {
            anyhow::bail!("momentum_short_bars must be shorter than momentum_long_bars");
        }

        // Validate filter patterns (compile regex to check)
        for pattern in &self.filters.blocked_name_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid blocked_name_pattern regex: {}", pattern))?;
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Engine:
    poll_interval: {}s
    max_open_positions: {}
    cooldown: {}min
    scan_limit: {}
    account_floor: {} SOL
  Providers:
    birdeye: {} (key {})
    gecko: {}
    failover_cooldown: {}s
  Trading:
    buy_amount: {} SOL
    max_slippage: {}%
    max_price_impact: {}%
  Filters:
    min_liquidity: ${}
    min_vol24h: ${}
    max_holder: {}%
    max_rug_score: {}
  Signals:
    mode: {:?}
    ema: {}/{}
    rsi: {} (low {})
  Exits:
    stop_loss: -{}%
    take_profit: {}% or {} SOL
    time_stops: soft {}min / hard {}min
  Model:
    path: {}
  State:
    path: {}
"#,
            self.engine.poll_interval_secs,
            self.engine.max_open_positions,
            self.engine.cooldown_minutes,
            self.engine.scan_limit,
            self.engine.account_floor_sol,
            mask_url(&self.providers.birdeye.base_url),
            if self.providers.birdeye.api_key.is_empty() {
                "not set"
            } else {
                "***"
            },
            mask_url(&self.providers.gecko.base_url),
            self.providers.failover_cooldown_secs,
            self.trading.buy_amount_sol,
            self.trading.max_slippage_pct,
            self.trading.max_price_impact_pct,
            self.filters.min_liquidity_usd,
            self.filters.min_vol24h_usd,
            self.filters.max_holder_pct,
            self.filters.max_rug_score,
            self.signals.mode,
            self.signals.ema_fast,
            self.signals.ema_slow,
            self.signals.rsi_period,
            self.signals.rsi_low,
            self.exits.stop_loss_pct * 100.0,
            self.exits.take_profit_pct,
            self.exits.take_profit_quote_sol,
            self.exits.exit_soft_minutes,
            self.exits.exit_hard_minutes,
            self.model.path.as_deref().unwrap_or("(none)"),
            self.state.path,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            providers: ProvidersConfig::default(),
            trading: TradingConfig::default(),
            filters: FilterConfig::default(),
            signals: SignalConfig::default(),
            exits: ExitConfig::default(),
            execution: ExecutionConfig::default(),
            model: ModelConfig::default(),
            state: StateConfig::default(),
        }
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
