// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Two jobs:
//
//   HfTokenizer    : adapts a HuggingFace `tokenizers::Tokenizer`
//                     to the pipeline's TextTokenizer trait
//                     (tokens, ids, special ids, random-id range).
//
//   TokenizerStore : loads tokenizer.json from a directory, or
//                     builds a word-level one from corpus text when
//                     no pretrained vocabulary is available offline.
//
// Id layout follows bert-base-uncased:
//   0 [PAD]   100 [UNK]   101 [CLS]   102 [SEP]   103 [MASK]
//   1..=998 reserved / unused, ordinary words start at 999.
// Random replacement ids are drawn from [999, vocab_size).
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the word-level vocabulary is written
// as tokenizer JSON directly and loaded back.
//
// Reference: Sennrich et al. (2016) BPE paper
//            Devlin et al. (2019) BERT, §3.1

use anyhow::{Context, Result};
use std::{collections::HashMap, ops::Range, path::PathBuf};
use tokenizers::Tokenizer;

use crate::domain::example::SpecialTokens;
use crate::domain::traits::TextTokenizer;
use crate::error::DataError;

/// First id that a "replace with random token" draw may produce.
pub const FIRST_WORD_ID: u32 = 999;

const PAD:  &str = "[PAD]";
const UNK:  &str = "[UNK]";
const CLS:  &str = "[CLS]";
const SEP:  &str = "[SEP]";
const MASK: &str = "[MASK]";

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
pub struct HfTokenizer {
    inner:      Tokenizer,
    special:    SpecialTokens,
    unk:        u32,
    vocab_size: u32,
}

impl HfTokenizer {
    pub fn new(inner: Tokenizer) -> std::result::Result<Self, DataError> {
        let id = |token: &str| {
            inner
                .token_to_id(token)
                .ok_or_else(|| DataError::Tokenizer(format!("vocabulary has no {token} token")))
        };
        let special = SpecialTokens {
            cls:  id(CLS)?,
            sep:  id(SEP)?,
            pad:  id(PAD)?,
            mask: id(MASK)?,
        };
        let unk = id(UNK)?;

        // ids may be sparse, so the id space is max id + 1
        let vocab_size = inner
            .get_vocab(true)
            .values()
            .copied()
            .max()
            .map_or(0, |max| max + 1);

        Ok(Self { inner, special, unk, vocab_size })
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path  = path.into();
        let inner = Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })?;
        Ok(Self::new(inner)?)
    }

    /// Downloads from the HuggingFace hub, e.g. "bert-base-uncased".
    pub fn from_pretrained(identifier: &str) -> Result<Self> {
        let inner = Tokenizer::from_pretrained(identifier, None)
            .map_err(|e| anyhow::anyhow!("Cannot fetch tokenizer '{identifier}': {e}"))?;
        tracing::info!("Fetched pretrained tokenizer '{}'", identifier);
        Ok(Self::new(inner)?)
    }

    /// One past the largest id in the vocabulary.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size as usize
    }
}

impl TextTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> crate::error::Result<Vec<String>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| DataError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn convert_to_ids(&self, tokens: &[String]) -> Vec<u32> {
        tokens
            .iter()
            .map(|t| self.inner.token_to_id(t).unwrap_or(self.unk))
            .collect()
    }

    fn decode(&self, ids: &[u32]) -> crate::error::Result<String> {
        self.inner
            .decode(ids, false)
            .map_err(|e| DataError::Tokenizer(e.to_string()))
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn random_token_range(&self) -> Range<u32> {
        FIRST_WORD_ID..self.vocab_size.max(FIRST_WORD_ID)
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load existing tokenizer or build a new one from texts.
    /// `vocab_size` counts the reserved ids, so at most
    /// `vocab_size - 999` words are kept.
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<HfTokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<HfTokenizer> {
        HfTokenizer::from_file(self.path())
    }

    fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<HfTokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: word frequencies ──────────────────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                let w = word.to_lowercase();
                let w = w.trim_matches(|c: char| !c.is_alphanumeric());
                if !w.is_empty() {
                    *freq.entry(w.to_string()).or_insert(0) += 1;
                }
            }
        }

        // most frequent first, ties alphabetical so rebuilds are identical
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(FIRST_WORD_ID as usize));

        // ── Step 2: vocab with BERT-style special ids ─────────────────────────
        let mut vocab = serde_json::json!({
            PAD:  0,
            UNK:  100,
            CLS:  101,
            SEP:  102,
            MASK: 103,
        });
        let mut next_id = FIRST_WORD_ID as usize;
        for (word, _) in &words {
            vocab[word.as_str()] = serde_json::json!(next_id);
            next_id += 1;
        }

        // ── Step 3: HuggingFace tokenizer JSON ────────────────────────────────
        let added = |id: u32, content: &str| {
            serde_json::json!({
                "id": id, "content": content, "single_word": false,
                "lstrip": false, "rstrip": false, "normalized": false, "special": true
            })
        };
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [
                added(0, PAD), added(100, UNK), added(101, CLS), added(102, SEP), added(103, MASK)
            ],
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK
            }
        });

        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            words.len(),
            tok_path.display()
        );
        self.load()
    }
}
