//! Embedding distances used to rank candidate answers.
//!
//! Lower distance means a closer match.

use serde::{Deserialize, Serialize};

/// Scores candidate embeddings against one reference embedding.
///
/// Returns exactly one distance per candidate, in candidate order.
pub trait DistanceScorer: Send + Sync {
    fn distances(&self, reference: &[f64], candidates: &[Vec<f64>]) -> Vec<f64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`.
    #[default]
    Cosine,
    /// Manhattan.
    L1,
    /// Euclidean.
    L2,
    /// Chebyshev.
    Linf,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Cosine => 1.0 - cosine_similarity(a, b),
            Self::L1 => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            Self::Linf => a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max),
        }
    }
}

impl DistanceScorer for DistanceMetric {
    fn distances(&self, reference: &[f64], candidates: &[Vec<f64>]) -> Vec<f64> {
        candidates.iter().map(|c| self.distance(reference, c)).collect()
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero-norm vectors.
///
/// A zero-norm vector therefore has cosine distance 1.0 rather than NaN as in
/// scipy-based scorers. Callers check dimensions before scoring.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    dot / denom
}
