// ============================================================
// Layer 4 — Sentence Processor
// ============================================================
// Turns one text chunk into one masked-LM training example:
//
//   text ──tokenize──▶ ids ──pad/truncate──▶ tokens (len = max_total_length)
//                                              │
//                       special-token positions┤
//                                              ▼
//                    Bernoulli(mask_percent) per position,
//                    forced false at special positions ──▶ mask_mask
//                                              │
//                    replacement policy at true positions ──▶ masked_tokens
//
// Every random choice comes from the processor's own StdRng, so
// a processor re-seeded with the same seed and fed the same texts
// produces the same examples. Clones carry their own RNG copy;
// no state is shared between clones.

use std::ops::Range;
use std::sync::Arc;

use rand::distributions::{Bernoulli, Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::masking::{MaskingReplacementConfig, MaskingReplacementPolicy, Replacement};
use crate::domain::example::{ProcessedExample, SpecialTokens};
use crate::domain::traits::TextTokenizer;
use crate::error::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Every example is padded or truncated to this many tokens
    pub max_total_length: usize,
    /// Per-position probability of being selected for masking
    pub mask_percent: f64,
    /// What happens to a selected position
    pub mask_replace: MaskingReplacementConfig,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_total_length: 128,
            mask_percent:     0.15,
            mask_replace:     MaskingReplacementConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct SentenceProcessor {
    tokenizer:     Arc<dyn TextTokenizer>,
    config:        ProcessorConfig,
    special:       SpecialTokens,
    select:        Bernoulli,
    policy:        MaskingReplacementPolicy,
    random_tokens: Uniform<u32>,
    rng:           StdRng,
}

impl SentenceProcessor {
    /// Build a processor seeded from OS entropy. Pipelines re-seed it
    /// per worker before use.
    pub fn new(tokenizer: Arc<dyn TextTokenizer>, config: ProcessorConfig) -> Result<Self> {
        Self::with_rng(tokenizer, config, StdRng::from_entropy())
    }

    pub fn with_rng(
        tokenizer: Arc<dyn TextTokenizer>,
        config:    ProcessorConfig,
        rng:       StdRng,
    ) -> Result<Self> {
        if config.max_total_length == 0 {
            return Err(DataError::InvalidConfig("max_total_length must be positive".into()));
        }
        let select = Bernoulli::new(config.mask_percent)
            .map_err(|_| DataError::InvalidMaskPercent(config.mask_percent))?;
        let policy = MaskingReplacementPolicy::new(config.mask_replace)?;

        let Range { start, end } = tokenizer.random_token_range();
        if start >= end {
            return Err(DataError::EmptyRandomTokenRange { start, end });
        }
        let random_tokens = Uniform::new(start, end);
        let special       = tokenizer.special_tokens();

        Ok(Self { tokenizer, config, special, select, policy, random_tokens, rng })
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    /// Replace the RNG with one seeded from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Run the full tokenize → pad → mask pipeline on one chunk.
    pub fn process(&mut self, sentence: &str) -> Result<ProcessedExample> {
        let tokens        = self.pad_tokens(self.tokenize_text(sentence)?);
        let special_mask  = self.special_token_mask(&tokens);
        let mask_mask     = self.get_mask_mask(&special_mask);
        let masked_tokens = self.mask_tokens(&tokens, &mask_mask);

        Ok(ProcessedExample { tokens, mask_mask, masked_tokens })
    }

    /// Word-piece tokens converted to ids; no [CLS]/[SEP] are inserted.
    pub fn tokenize_text(&self, sentence: &str) -> Result<Vec<u32>> {
        let tokens = self.tokenizer.tokenize(sentence)?;
        Ok(self.tokenizer.convert_to_ids(&tokens))
    }

    /// Truncate to `max_total_length`, then right-pad with [PAD].
    pub fn pad_tokens(&self, mut tokens: Vec<u32>) -> Vec<u32> {
        tokens.truncate(self.config.max_total_length);
        tokens.resize(self.config.max_total_length, self.special.pad);
        tokens
    }

    /// True where the token is [CLS], [SEP], [PAD] or [MASK].
    pub fn special_token_mask(&self, tokens: &[u32]) -> Vec<bool> {
        tokens.iter().map(|&t| self.special.contains(t)).collect()
    }

    /// One Bernoulli trial per position; special positions are then
    /// forced to false. The trial is drawn for every position so the
    /// RNG advances by the sequence length regardless of content.
    pub fn get_mask_mask(&mut self, special_mask: &[bool]) -> Vec<bool> {
        special_mask
            .iter()
            .map(|&is_special| {
                let selected = self.select.sample(&mut self.rng);
                selected && !is_special
            })
            .collect()
    }

    /// Apply the replacement policy at mask_mask positions only.
    pub fn mask_tokens(&mut self, tokens: &[u32], mask_mask: &[bool]) -> Vec<u32> {
        tokens
            .iter()
            .zip(mask_mask)
            .map(|(&token, &masked)| {
                if !masked {
                    return token;
                }
                match self.policy.draw(&mut self.rng) {
                    Replacement::Mask     => self.special.mask,
                    Replacement::Random   => self.random_tokens.sample(&mut self.rng),
                    Replacement::Original => token,
                }
            })
            .collect()
    }
}
