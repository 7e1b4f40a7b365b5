// ============================================================
// Layer 3 — Corpus Domain Types
// ============================================================
// Two corpora feed the pipeline:
//   - Wiki: article-style, one record per whole document
//   - Book: sentence-style, one record per sentence/line
//
// Both are read-only random-access collections. Workers share
// them behind an Arc; nothing in the pipeline ever mutates one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::traits::Corpus;
use crate::error::{DataError, Result};

/// Which of the two text sources a record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorpusKind {
    Wiki,
    Book,
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusKind::Wiki => write!(f, "wiki"),
            CorpusKind::Book => write!(f, "book"),
        }
    }
}

/// A corpus held entirely in memory.
///
/// Loaders in `data::loader` produce one of these from disk;
/// tests build them directly from string literals.
#[derive(Debug, Clone)]
pub struct InMemoryCorpus {
    kind:    CorpusKind,
    records: Vec<String>,
}

impl InMemoryCorpus {
    pub fn new(kind: CorpusKind, records: Vec<String>) -> Self {
        Self { kind, records }
    }

    pub fn kind(&self) -> CorpusKind {
        self.kind
    }

    pub fn records(&self) -> &[String] {
        &self.records
    }
}

impl Corpus for InMemoryCorpus {
    fn name(&self) -> String {
        self.kind.to_string()
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Result<String> {
        self.records
            .get(index)
            .cloned()
            .ok_or_else(|| DataError::CorpusIndex {
                corpus: self.name(),
                index,
                len:    self.records.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_in_range() {
        let c = InMemoryCorpus::new(CorpusKind::Book, vec!["a".into(), "b".into()]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(1).unwrap(), "b");
    }

    #[test]
    fn test_get_out_of_range_is_index_error() {
        let c = InMemoryCorpus::new(CorpusKind::Wiki, vec!["only".into()]);
        match c.get(5) {
            Err(DataError::CorpusIndex { corpus, index, len }) => {
                assert_eq!(corpus, "wiki");
                assert_eq!(index, 5);
                assert_eq!(len, 1);
            }
            other => panic!("expected CorpusIndex, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_corpus() {
        let c = InMemoryCorpus::new(CorpusKind::Wiki, Vec::new());
        assert!(c.is_empty());
    }
}
