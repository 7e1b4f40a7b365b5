// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that name the concepts of the
// masked-language-modelling pipeline:
//
//   corpus.rs : the two text sources (wiki / book) and an
//                in-memory random-access corpus
//   example.rs: special token ids and one processed example
//   traits.rs : the Corpus and TextTokenizer capabilities that
//                infrastructure code implements
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// Corpus kinds and the in-memory corpus
pub mod corpus;

/// Special tokens and the processed (tokens, mask, masked) triple
pub mod example;

/// Capabilities consumed by the data pipeline
pub mod traits;
