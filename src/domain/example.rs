// ============================================================
// Layer 3 — Processed Example
// ============================================================
// One masked-language-modelling training example is a triple of
// equally long sequences:
//
//   tokens       : the original token ids, padded/truncated
//   mask_mask    : true where the model must predict the token
//   masked_tokens: tokens with the selected positions replaced
//
// Example (max_total_length = 6, mask id = 103, pad id = 0):
//   tokens:        [2054, 2003, 1996, 3007,    0,    0]
//   mask_mask:     [false, true, false, true, false, false]
//   masked_tokens: [2054,  103, 1996, 3007,    0,    0]
//                          ^ [MASK]     ^ kept as original

use serde::{Deserialize, Serialize};

/// Ids of the reserved tokens that are never selected for masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    /// [CLS]: sequence start
    pub cls: u32,
    /// [SEP]: separator
    pub sep: u32,
    /// [PAD]: right padding
    pub pad: u32,
    /// [MASK]: replacement for masked positions
    pub mask: u32,
}

impl SpecialTokens {
    pub fn ids(&self) -> [u32; 4] {
        [self.cls, self.sep, self.pad, self.mask]
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids().contains(&id)
    }
}

/// bert-base-uncased conventions
impl Default for SpecialTokens {
    fn default() -> Self {
        Self { cls: 101, sep: 102, pad: 0, mask: 103 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedExample {
    pub tokens:        Vec<u32>,
    pub mask_mask:     Vec<bool>,
    pub masked_tokens: Vec<u32>,
}

impl ProcessedExample {
    /// Sequence length shared by all three fields.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when the three fields have identical length.
    pub fn is_consistent(&self) -> bool {
        self.tokens.len() == self.mask_mask.len()
            && self.tokens.len() == self.masked_tokens.len()
    }

    pub fn masked_count(&self) -> usize {
        self.mask_mask.iter().filter(|&&m| m).count()
    }
}
