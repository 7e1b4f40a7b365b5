// ============================================================
// Layer 4 — Masking Replacement Policy
// ============================================================
// Once a position has been selected for masking, one of three
// things happens to its token:
//
//   Mask     → replaced with the [MASK] id      (default 80%)
//   Random   → replaced with a random vocab id  (default 10%)
//   Original → left unchanged                   (default 10%)
//
// The outcome is a single categorical draw per position, not
// three independent coin flips, so exactly one branch is ever
// taken and float comparisons between thresholds never enter
// into it.
//
// Reference: Devlin et al. (2019) BERT §3.1

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// Allowed deviation of the three weights' sum from 1.0
const SPLIT_TOLERANCE: f64 = 1e-6;

/// The three-way split. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskingReplacementConfig {
    pub replace_with_mask:     f64,
    pub replace_with_random:   f64,
    pub replace_with_original: f64,
}

impl MaskingReplacementConfig {
    /// Build a split, failing fast when it is not a distribution.
    pub fn new(mask: f64, random: f64, original: f64) -> Result<Self> {
        let config = Self {
            replace_with_mask:     mask,
            replace_with_random:   random,
            replace_with_original: original,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let weights = self.weights();
        let sum: f64 = weights.iter().sum();
        let all_valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0);

        if !all_valid || (sum - 1.0).abs() > SPLIT_TOLERANCE {
            return Err(DataError::InvalidReplacementSplit {
                mask:     self.replace_with_mask,
                random:   self.replace_with_random,
                original: self.replace_with_original,
                sum,
            });
        }
        Ok(())
    }

    /// Weights in outcome order: mask, random, original
    pub fn weights(&self) -> [f64; 3] {
        [
            self.replace_with_mask,
            self.replace_with_random,
            self.replace_with_original,
        ]
    }
}

impl Default for MaskingReplacementConfig {
    fn default() -> Self {
        Self {
            replace_with_mask:     0.8,
            replace_with_random:   0.1,
            replace_with_original: 0.1,
        }
    }
}

/// What happens to one selected position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Replacement {
    Mask,
    Random,
    Original,
}

impl Replacement {
    const OUTCOMES: [Replacement; 3] = [
        Replacement::Mask,
        Replacement::Random,
        Replacement::Original,
    ];
}

/// Categorical sampler over [`Replacement`] outcomes.
#[derive(Debug, Clone)]
pub struct MaskingReplacementPolicy {
    outcome: WeightedIndex<f64>,
}

impl MaskingReplacementPolicy {
    pub fn new(config: MaskingReplacementConfig) -> Result<Self> {
        config.validate()?;
        let outcome = WeightedIndex::new(config.weights())
            .map_err(|e| DataError::InvalidConfig(format!("replacement weights: {e}")))?;
        Ok(Self { outcome })
    }

    /// Draw the outcome for one position.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Replacement {
        Replacement::OUTCOMES[self.outcome.sample(rng)]
    }

    /// Draw outcomes for `n` positions.
    pub fn draw_many<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<Replacement> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}
