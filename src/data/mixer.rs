// ============================================================
// Layer 4 — Corpus Mixer (wiki + book buffer)
// ============================================================
// Keeps a shuffled buffer of text chunks drawn from the two
// corpora and hands them out one at a time.
//
// get_example():
//   1. If the buffer holds ≤ buffer_refill_from chunks, refill:
//        loop until buffer holds > buffer_refill_to chunks:
//          - flip a weighted coin: wiki (1 - book_chance) or book
//          - wiki: pick one article, cut it into fixed windows
//          - book: pick a run of `book_lines` consecutive sentences
//                  and glue them into chunks
//          - drop chunks shorter than min_sentence_length
//          - append the rest
//        shuffle the whole buffer once
//   2. Pop the chunk at the END of the buffer.
//
// A document that yields no chunk after filtering is not an
// error; the loop just draws again. A corpus too small to draw
// from is an error and is never retried.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::chunker::{Chunker, DEFAULT_CHUNK_LENGTH};
use crate::domain::corpus::CorpusKind;
use crate::domain::traits::Corpus;
use crate::error::{DataError, Result};

/// Consecutive documents a single refill may draw without adding
/// a chunk before giving up
const MAX_BARREN_DRAWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixerConfig {
    /// High-water mark: a refill stops once the buffer exceeds this
    pub buffer_refill_to: usize,
    /// Low-water mark: refill when the buffer holds this many or fewer
    pub buffer_refill_from: usize,
    /// Chunks shorter than this many characters are discarded
    pub min_sentence_length: usize,
    /// Target chunk length for both chunkers
    pub chunk_length: usize,
    /// Consecutive book sentences drawn per book "document"
    pub book_lines: usize,
    /// Probability of drawing from the book corpus; None derives it
    /// from the corpus sizes
    pub book_chance: Option<f64>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            buffer_refill_to:    10_000,
            buffer_refill_from:  0,
            min_sentence_length: 40,
            chunk_length:        DEFAULT_CHUNK_LENGTH,
            book_lines:          100,
            book_chance:         None,
        }
    }
}

#[derive(Clone)]
pub struct CorpusMixer {
    wiki:        Arc<dyn Corpus>,
    book:        Arc<dyn Corpus>,
    config:      MixerConfig,
    chunker:     Chunker,
    wiki_chance: f64,
    buffer:      Vec<String>,
    rng:         StdRng,
}

impl CorpusMixer {
    pub fn new(wiki: Arc<dyn Corpus>, book: Arc<dyn Corpus>, config: MixerConfig) -> Result<Self> {
        Self::with_rng(wiki, book, config, StdRng::from_entropy())
    }

    pub fn with_rng(
        wiki:   Arc<dyn Corpus>,
        book:   Arc<dyn Corpus>,
        config: MixerConfig,
        rng:    StdRng,
    ) -> Result<Self> {
        if config.buffer_refill_from >= config.buffer_refill_to {
            return Err(DataError::InvalidConfig(format!(
                "buffer_refill_from ({}) must be below buffer_refill_to ({})",
                config.buffer_refill_from, config.buffer_refill_to
            )));
        }
        if config.chunk_length == 0 || config.book_lines == 0 {
            return Err(DataError::InvalidConfig(
                "chunk_length and book_lines must be positive".into(),
            ));
        }

        let book_chance = match config.book_chance {
            Some(p) if (0.0..=1.0).contains(&p) => p,
            Some(p) => {
                return Err(DataError::InvalidConfig(format!(
                    "book_chance must lie in [0, 1], got {p}"
                )))
            }
            None => heuristic_book_chance(wiki.len(), book.len(), config.book_lines),
        };

        tracing::info!(
            wiki_records = wiki.len(),
            book_records = book.len(),
            book_chance,
            "Corpus mixer ready"
        );

        Ok(Self {
            wiki,
            book,
            chunker: Chunker::new(config.chunk_length),
            config,
            wiki_chance: 1.0 - book_chance,
            buffer: Vec::new(),
            rng,
        })
    }

    /// Probability that a refill draw picks the book corpus.
    pub fn book_chance(&self) -> f64 {
        1.0 - self.wiki_chance
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Replace the RNG with one seeded from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Next chunk, refilling the buffer first when it is low.
    pub fn get_example(&mut self) -> Result<String> {
        if self.buffer.len() <= self.config.buffer_refill_from {
            self.refill_buffer()?;
        }
        self.buffer.pop().ok_or(DataError::BufferEmpty)
    }

    /// `n` successive calls to get_example().
    pub fn get_batch(&mut self, n: usize) -> Result<Vec<String>> {
        (0..n).map(|_| self.get_example()).collect()
    }

    fn refill_buffer(&mut self) -> Result<()> {
        let before        = self.buffer.len();
        let mut barren    = 0usize;
        let mut wiki_docs = 0usize;
        let mut book_docs = 0usize;

        while self.buffer.len() <= self.config.buffer_refill_to {
            let (kind, chunks) = self.random_document()?;
            match kind {
                CorpusKind::Wiki => wiki_docs += 1,
                CorpusKind::Book => book_docs += 1,
            }
            if self.add_examples(chunks) == 0 {
                barren += 1;
                if barren >= MAX_BARREN_DRAWS {
                    return Err(DataError::Starved(barren));
                }
            } else {
                barren = 0;
            }
        }
        self.buffer.shuffle(&mut self.rng);

        tracing::debug!(
            wiki_docs,
            book_docs,
            added = self.buffer.len() - before,
            buffer = self.buffer.len(),
            "Refilled example buffer"
        );
        Ok(())
    }

    /// Draw one document from a corpus picked by the weighted coin
    /// and return its chunks.
    fn random_document(&mut self) -> Result<(CorpusKind, Vec<String>)> {
        if self.rng.gen::<f64>() < self.wiki_chance {
            let index = random_start(&mut self.rng, self.wiki.as_ref(), 1)?;
            let text  = self.wiki.get(index)?;
            Ok((CorpusKind::Wiki, self.chunker.chunk_wiki(&text)))
        } else {
            let lines = self.config.book_lines;
            let begin = random_start(&mut self.rng, self.book.as_ref(), lines + 1)?;
            let sentences = (begin..begin + lines)
                .map(|i| self.book.get(i))
                .collect::<Result<Vec<_>>>()?;
            Ok((CorpusKind::Book, self.chunker.chunk_book(&sentences)))
        }
    }

    /// Append the chunks that pass the length filter; returns how
    /// many were kept.
    fn add_examples(&mut self, chunks: Vec<String>) -> usize {
        let min    = self.config.min_sentence_length;
        let before = self.buffer.len();
        self.buffer
            .extend(chunks.into_iter().filter(|c| c.chars().count() >= min));
        self.buffer.len() - before
    }
}

/// Uniform start index such that a window of `span - 1` further
/// records still fits, i.e. in `0..=len - span`.
fn random_start(rng: &mut StdRng, corpus: &dyn Corpus, span: usize) -> Result<usize> {
    let len = corpus.len();
    if len < span {
        return Err(DataError::CorpusTooSmall {
            corpus:   corpus.name(),
            len,
            required: span,
        });
    }
    Ok(rng.gen_range(0..=len - span))
}

/// Rough share of book draws: book records are single sentences
/// and wiki records whole articles, so the book corpus is weighted
/// by how many sentences exist per article, scaled down by the
/// number of sentences one book draw consumes.
pub fn heuristic_book_chance(wiki_len: usize, book_len: usize, book_lines: usize) -> f64 {
    if wiki_len == 0 {
        return if book_len == 0 { 0.0 } else { 1.0 };
    }
    let sentences_per_article = (book_len / wiki_len + 1) as f64;
    (0.5 / book_lines as f64 * sentences_per_article).clamp(0.0, 1.0)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{book_corpus, wiki_corpus};
    use crate::domain::corpus::InMemoryCorpus;

    fn small_config() -> MixerConfig {
        MixerConfig {
            buffer_refill_to: 200,
            book_lines: 10,
            book_chance: Some(0.5),
            ..MixerConfig::default()
        }
    }

    fn mixer(config: MixerConfig, seed: u64) -> CorpusMixer {
        CorpusMixer::with_rng(
            Arc::new(wiki_corpus(50)),
            Arc::new(book_corpus(500)),
            config,
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_refill_reaches_high_water_mark() {
        let mut m = mixer(small_config(), 1);
        assert_eq!(m.buffer_len(), 0);
        m.get_example().unwrap();
        assert!(m.buffer_len() >= 200);
    }

    #[test]
    fn test_refill_with_default_high_water_mark() {
        let config = MixerConfig { book_lines: 10, book_chance: Some(0.3), ..MixerConfig::default() };
        let mut m  = mixer(config, 2);
        m.get_example().unwrap();
        assert!(m.buffer_len() >= 10_000 - 1);
    }

    #[test]
    fn test_no_refill_until_low_water_mark() {
        let mut m = mixer(small_config(), 3);
        m.get_example().unwrap();
        let after_first = m.buffer_len();
        m.get_example().unwrap();
        assert_eq!(m.buffer_len(), after_first - 1);
    }

    #[test]
    fn test_chunks_respect_min_length() {
        let mut m = mixer(small_config(), 4);
        for chunk in m.get_batch(150).unwrap() {
            assert!(chunk.chars().count() >= 40);
        }
    }

    #[test]
    fn test_min_length_boundary_is_inclusive() {
        // one 79-char article cut at 40: a 40-char chunk and a 39-char tail
        let article = format!("{}{}", "a".repeat(40), "b".repeat(39));
        let config  = MixerConfig {
            buffer_refill_to: 5,
            chunk_length:     40,
            book_chance:      Some(0.0),
            ..small_config()
        };
        let mut m = CorpusMixer::with_rng(
            Arc::new(InMemoryCorpus::new(CorpusKind::Wiki, vec![article])),
            Arc::new(book_corpus(100)),
            config,
            StdRng::seed_from_u64(11),
        )
        .unwrap();
        let chunks = m.get_batch(12).unwrap();
        assert!(chunks.iter().all(|c| *c == "a".repeat(40)));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = mixer(small_config(), 5);
        let mut b = mixer(small_config(), 99);
        b.reseed(5);
        a.reseed(5);
        assert_eq!(a.get_batch(300).unwrap(), b.get_batch(300).unwrap());
    }

    #[test]
    fn test_wiki_only_mixing() {
        let config = MixerConfig { book_chance: Some(0.0), ..small_config() };
        let mut m  = mixer(config, 6);
        assert!(m.get_batch(50).unwrap().iter().all(|c| c.contains("wiki")));
    }

    #[test]
    fn test_book_only_mixing() {
        let config = MixerConfig { book_chance: Some(1.0), ..small_config() };
        let mut m  = mixer(config, 7);
        assert!(m.get_batch(50).unwrap().iter().all(|c| c.contains("book")));
    }

    #[test]
    fn test_random_document_reports_its_corpus() {
        let mut wiki_only = mixer(MixerConfig { book_chance: Some(0.0), ..small_config() }, 8);
        let (kind, chunks) = wiki_only.random_document().unwrap();
        assert_eq!(kind, CorpusKind::Wiki);
        assert!(chunks.iter().all(|c| c.contains("wiki")));

        let mut book_only = mixer(MixerConfig { book_chance: Some(1.0), ..small_config() }, 8);
        let (kind, chunks) = book_only.random_document().unwrap();
        assert_eq!(kind, CorpusKind::Book);
        assert!(chunks.iter().all(|c| c.contains("book")));
    }

    #[test]
    fn test_book_corpus_too_small_is_fatal() {
        let config = MixerConfig { book_chance: Some(1.0), ..small_config() };
        let mut m  = CorpusMixer::with_rng(
            Arc::new(wiki_corpus(5)),
            Arc::new(book_corpus(3)),
            config,
            StdRng::seed_from_u64(8),
        )
        .unwrap();
        assert!(matches!(m.get_example(), Err(DataError::CorpusTooSmall { .. })));
    }

    #[test]
    fn test_empty_wiki_corpus_is_fatal() {
        let config = MixerConfig { book_chance: Some(0.0), ..small_config() };
        let mut m  = CorpusMixer::with_rng(
            Arc::new(InMemoryCorpus::new(CorpusKind::Wiki, Vec::new())),
            Arc::new(book_corpus(100)),
            config,
            StdRng::seed_from_u64(9),
        )
        .unwrap();
        assert!(matches!(m.get_example(), Err(DataError::CorpusTooSmall { .. })));
    }

    #[test]
    fn test_all_short_documents_starve() {
        let config = MixerConfig { book_chance: Some(0.0), ..small_config() };
        let mut m  = CorpusMixer::with_rng(
            Arc::new(InMemoryCorpus::new(CorpusKind::Wiki, vec!["tiny".into()])),
            Arc::new(book_corpus(100)),
            config,
            StdRng::seed_from_u64(10),
        )
        .unwrap();
        assert!(matches!(m.get_example(), Err(DataError::Starved(_))));
    }

    #[test]
    fn test_invalid_book_chance_rejected() {
        let config = MixerConfig { book_chance: Some(1.5), ..small_config() };
        let result = CorpusMixer::with_rng(
            Arc::new(wiki_corpus(5)),
            Arc::new(book_corpus(50)),
            config,
            StdRng::seed_from_u64(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_heuristic_book_chance() {
        // 6.4M wiki articles, 74M book sentences, 100-line draws
        let p = heuristic_book_chance(6_400_000, 74_000_000, 100);
        assert!((p - 0.06).abs() < 1e-9);
        assert_eq!(heuristic_book_chance(10, 1_000_000, 100), 1.0);
        assert_eq!(heuristic_book_chance(0, 0, 100), 0.0);
    }
}
