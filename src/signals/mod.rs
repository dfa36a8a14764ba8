//! Technical and risk signal computation
//!
//! Pure functions over candle history; nothing here touches the network.

pub mod indicators;
pub mod momentum;
pub mod risk;
pub mod volatility;

pub use indicators::IndicatorSnapshot;
pub use momentum::MomentumSnapshot;
pub use risk::{RiskAssessment, RiskScorer};
pub use volatility::VolatilitySnapshot;
