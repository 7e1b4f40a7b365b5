// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline talks to its collaborators only through these
// traits:
//   - Corpus        → InMemoryCorpus (loaded from disk or built in tests)
//   - TextTokenizer → HfTokenizer (infra::tokenizer_store)
//
// Both are Send + Sync because every worker thread holds an Arc
// to the same read-only instance.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::ops::Range;

use crate::domain::example::SpecialTokens;
use crate::error::Result;

// ─── Corpus ───────────────────────────────────────────────────────────────────
/// A random-access, read-only collection of raw text records.
pub trait Corpus: Send + Sync {
    /// Short name used in error messages and logs
    fn name(&self) -> String;

    /// Number of records
    fn len(&self) -> usize;

    /// Record at `index`; out of range is a `CorpusIndex` error
    fn get(&self, index: usize) -> Result<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Word-piece style tokenizer as seen by the sentence processor.
pub trait TextTokenizer: Send + Sync {
    /// Split text into sub-word tokens. No special tokens are added.
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;

    /// Map tokens to vocabulary ids.
    fn convert_to_ids(&self, tokens: &[String]) -> Vec<u32>;

    /// Map ids back to text, for previews and debugging.
    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn special_tokens(&self) -> SpecialTokens;

    /// Ids that a "replace with random token" draw may produce.
    /// Excludes the reserved control ids at the low end.
    fn random_token_range(&self) -> Range<u32>;
}
