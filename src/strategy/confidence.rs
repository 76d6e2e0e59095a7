//! Confidence scoring for detected gaps.
//!
//! Two variants, fixed at construction: a liquidity/gap heuristic, or a
//! learned model fed `[gap, liquidity_a, liquidity_b, volume_a, volume_b]`.
//! The model's positive-class probability is used as-is.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::types::MarketQuote;

/// Combined liquidity at which the liquidity term saturates.
const LIQUIDITY_CAP: f64 = 200_000.0;
/// Gap (points) at which the gap term saturates.
const GAP_CAP: f64 = 10.0;
const LIQUIDITY_WEIGHT: f64 = 0.4;
const GAP_WEIGHT: f64 = 0.6;
/// Heuristic scores never fall below this.
const HEURISTIC_FLOOR: f64 = 0.5;

/// Number of features a learned model consumes.
pub const FEATURE_COUNT: usize = 5;

/// A trained binary classifier.
pub trait ConfidenceModel: Send + Sync {
    /// Probability of the positive class ("gap is genuine").
    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> f64;
}

/// Logistic regression over the raw feature vector.
///
/// Artifact format: `{"weights": [w0, w1, w2, w3, w4], "bias": b}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub weights: [f64; FEATURE_COUNT],
    pub bias: f64,
}

impl LogisticModel {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model file {}", path.display()))
    }
}

impl ConfidenceModel for LogisticModel {
    fn predict_proba(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self
            .weights
            .iter()
            .zip(features)
            .fold(self.bias, |acc, (w, x)| acc + w * x);
        1.0 / (1.0 + (-z).exp())
    }
}

pub enum ConfidenceEstimator {
    Heuristic,
    Learned(Box<dyn ConfidenceModel>),
}

impl ConfidenceEstimator {
    /// Learned model if the artifact loads, heuristic otherwise.
    pub fn from_model_path(path: Option<&str>) -> Self {
        let Some(path) = path else {
            info!("No confidence model configured; using heuristic confidence");
            return ConfidenceEstimator::Heuristic;
        };

        let path = Path::new(path);
        if !path.exists() {
            info!(path = %path.display(), "Model file not found; using heuristic confidence");
            return ConfidenceEstimator::Heuristic;
        }

        match LogisticModel::load(path) {
            Ok(model) => {
                info!(path = %path.display(), "Loaded confidence model");
                ConfidenceEstimator::Learned(Box::new(model))
            }
            Err(e) => {
                warn!(error = %e, "Failed to load model; using heuristic confidence");
                ConfidenceEstimator::Heuristic
            }
        }
    }

    pub fn is_learned(&self) -> bool {
        matches!(self, ConfidenceEstimator::Learned(_))
    }

    /// Score a gap between two quotes for the same market.
    pub fn score(&self, a: &MarketQuote, b: &MarketQuote, gap: f64) -> f64 {
        match self {
            ConfidenceEstimator::Heuristic => heuristic(a.liquidity + b.liquidity, gap),
            ConfidenceEstimator::Learned(model) => model.predict_proba(&[
                gap,
                a.liquidity,
                b.liquidity,
                a.volume_24h,
                b.volume_24h,
            ]),
        }
    }
}

/// Blend of depth and gap size, floored, rounded to 4 dp.
fn heuristic(total_liquidity: f64, gap: f64) -> f64 {
    let liquidity_score = (total_liquidity / LIQUIDITY_CAP).min(1.0);
    let gap_score = (gap / GAP_CAP).min(1.0);
    let blended = LIQUIDITY_WEIGHT * liquidity_score + GAP_WEIGHT * gap_score;
    (blended.max(HEURISTIC_FLOOR) * 10_000.0).round() / 10_000.0
}
