// Fixtures shared by the data-layer unit tests.

use std::ops::Range;
use std::sync::Arc;

use crate::data::dataset::ProcessedDataset;
use crate::data::mixer::{CorpusMixer, MixerConfig};
use crate::data::processor::{ProcessorConfig, SentenceProcessor};
use crate::domain::corpus::{CorpusKind, InMemoryCorpus};
use crate::domain::example::SpecialTokens;
use crate::domain::traits::TextTokenizer;
use crate::error::Result;

/// Whitespace tokenizer with a hashed vocabulary of ids 1000..2000.
/// "[CLS]", "[SEP]", "[PAD]" and "[MASK]" map to the BERT special ids.
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    fn word_id(word: &str) -> u32 {
        let specials = SpecialTokens::default();
        match word {
            "[CLS]"  => specials.cls,
            "[SEP]"  => specials.sep,
            "[PAD]"  => specials.pad,
            "[MASK]" => specials.mask,
            _ => {
                let hash = word
                    .bytes()
                    .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
                1000 + hash % 1000
            }
        }
    }
}

impl TextTokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    fn convert_to_ids(&self, tokens: &[String]) -> Vec<u32> {
        tokens.iter().map(|t| Self::word_id(t)).collect()
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        Ok(ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" "))
    }

    fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens::default()
    }

    fn random_token_range(&self) -> Range<u32> {
        999..2000
    }
}

pub fn tokenizer() -> Arc<dyn TextTokenizer> {
    Arc::new(WhitespaceTokenizer)
}

/// `n` articles of a few hundred characters each.
pub fn wiki_corpus(n: usize) -> InMemoryCorpus {
    let records = (0..n)
        .map(|i| {
            (0..60)
                .map(|w| format!("wiki{i}word{w}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    InMemoryCorpus::new(CorpusKind::Wiki, records)
}

/// `n` sentences of roughly sixty characters each.
pub fn book_corpus(n: usize) -> InMemoryCorpus {
    let records = (0..n)
        .map(|i| format!("book sentence number {i} goes on for a little while longer. "))
        .collect();
    InMemoryCorpus::new(CorpusKind::Book, records)
}

/// Small-buffer pipeline over the fixture corpora.
pub fn processed_dataset() -> ProcessedDataset {
    let mixer = CorpusMixer::new(
        Arc::new(wiki_corpus(20)),
        Arc::new(book_corpus(200)),
        MixerConfig {
            buffer_refill_to: 100,
            book_lines: 10,
            book_chance: Some(0.5),
            ..MixerConfig::default()
        },
    )
    .unwrap();
    let processor = SentenceProcessor::new(tokenizer(), ProcessorConfig::default()).unwrap();
    ProcessedDataset::new(mixer, processor)
}
