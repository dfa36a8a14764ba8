//! Pre-trained scoring model interface
//!
//! The engine consumes the external training pipeline only through
//! `score(features) -> {probability, threshold}`. The exported weights file
//! is a flat JSON object; a missing or invalid file simply disables the
//! model and scoring stays rule-based.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

/// Feature names shared with the training pipeline; unknown features are
/// ignored, missing ones default to zero.
pub const FEATURE_COLUMNS: &[&str] = &[
    "score",
    "rug_risk_score",
    "rug_holders_pct",
    "rug_liquidity_usd",
    "rug_vol24h_usd",
    "price_impact_pct",
    "volatility_range_pct",
    "volatility_chop_pct",
    "signal_score",
    "momentum_score",
    "momentum_pct_short",
    "momentum_pct_long",
];

#[derive(Debug, Clone, Deserialize)]
struct ModelFile {
    weights: HashMap<String, f64>,
    #[serde(default)]
    bias: f64,
    threshold: f64,
}

/// Output of one model evaluation
#[derive(Debug, Clone, Copy)]
pub struct ModelScore {
    pub probability: f64,
    pub threshold: f64,
}

impl ModelScore {
    /// The model vetoes a candidate whose probability reaches the threshold
    pub fn is_veto(&self) -> bool {
        self.probability >= self.threshold
    }
}

pub struct ScoringModel {
    weights: HashMap<String, f64>,
    bias: f64,
    threshold: f64,
}

impl ScoringModel {
    /// Load the exported weights; any failure logs and returns `None` so the
    /// caller falls back to rule-based scoring.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model file unreadable, rule-based scoring only");
                return None;
            }
        };
        let file: ModelFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "model file invalid, rule-based scoring only");
                return None;
            }
        };
        if !(0.0..=1.0).contains(&file.threshold) {
            warn!(
                threshold = file.threshold,
                "model threshold out of range, rule-based scoring only"
            );
            return None;
        }

        info!(
            path = %path.display(),
            features = file.weights.len(),
            threshold = file.threshold,
            "scoring model loaded"
        );
        Some(Self {
            weights: file.weights,
            bias: file.bias,
            threshold: file.threshold,
        })
    }

    /// Logistic score over the named numeric features
    pub fn score(&self, features: &HashMap<String, f64>) -> ModelScore {
        let mut z = self.bias;
        for (name, weight) in &self.weights {
            let value = features.get(name.as_str()).copied().unwrap_or(0.0);
            z += weight * value;
        }
        ModelScore {
            probability: sigmoid(z),
            threshold: self.threshold,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_model(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_and_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            r#"{"weights": {"rug_risk_score": 0.8, "score": -0.2}, "bias": -1.0, "threshold": 0.6}"#,
        );

        let model = ScoringModel::load(&path).unwrap();

        let mut features = HashMap::new();
        features.insert("rug_risk_score".to_string(), 5.0);
        features.insert("score".to_string(), 2.0);
        // z = -1.0 + 0.8*5 - 0.2*2 = 2.6
        let result = model.score(&features);
        assert!((result.probability - sigmoid(2.6)).abs() < 1e-12);
        assert!(result.is_veto());
    }

    #[test]
    fn test_missing_features_default_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            r#"{"weights": {"momentum_score": 1.0}, "threshold": 0.5}"#,
        );

        let model = ScoringModel::load(&path).unwrap();
        let result = model.score(&HashMap::new());
        // Bias defaults to zero too, so the logit is zero.
        assert!((result.probability - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_file_disables_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "not json");
        assert!(ScoringModel::load(&path).is_none());
    }

    #[test]
    fn test_missing_file_disables_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScoringModel::load(&dir.path().join("absent.json")).is_none());
    }

    #[test]
    fn test_out_of_range_threshold_disables_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, r#"{"weights": {}, "threshold": 3.0}"#);
        assert!(ScoringModel::load(&path).is_none());
    }
}
