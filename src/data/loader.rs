// ============================================================
// Layer 4 — Corpus Loaders
// ============================================================
// Reads the two corpora from disk into memory.
//
//   Wiki:  a directory of *.txt files, one article per file.
//          Files are read in sorted path order so record indices
//          (and therefore seeded runs) are stable across machines.
//
//   Book:  one text file, one sentence per line. Blank lines
//          are skipped; line order is preserved because the mixer
//          draws runs of consecutive sentences.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::corpus::{CorpusKind, InMemoryCorpus};

/// Anything that can produce an in-memory corpus.
pub trait CorpusLoader {
    fn load(&self) -> Result<InMemoryCorpus>;
}

// ─── WikiDirLoader ────────────────────────────────────────────────────────────
pub struct WikiDirLoader {
    dir: PathBuf,
}

impl WikiDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CorpusLoader for WikiDirLoader {
    fn load(&self) -> Result<InMemoryCorpus> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read wiki directory '{}'", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut articles = Vec::with_capacity(paths.len());
        for path in &paths {
            match fs::read_to_string(path) {
                Ok(text) if !text.trim().is_empty() => articles.push(text),
                Ok(_) => tracing::debug!("Skipping empty article '{}'", path.display()),
                // one unreadable file should not sink the whole corpus
                Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} wiki articles from '{}'", articles.len(), self.dir.display());
        Ok(InMemoryCorpus::new(CorpusKind::Wiki, articles))
    }
}

// ─── BookLinesLoader ──────────────────────────────────────────────────────────
pub struct BookLinesLoader {
    path: PathBuf,
}

impl BookLinesLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CorpusLoader for BookLinesLoader {
    fn load(&self) -> Result<InMemoryCorpus> {
        let sentences = read_lines(&self.path)?;
        tracing::info!(
            "Loaded {} book sentences from '{}'",
            sentences.len(),
            self.path.display()
        );
        Ok(InMemoryCorpus::new(CorpusKind::Book, sentences))
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read book corpus '{}'", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::Corpus;
    use tempfile::TempDir;

    #[test]
    fn test_wiki_dir_reads_txt_files_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "second article").unwrap();
        fs::write(dir.path().join("a.txt"), "first article").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::write(dir.path().join("c.txt"), "   \n").unwrap();

        let corpus = WikiDirLoader::new(dir.path()).load().unwrap();
        assert_eq!(corpus.kind(), CorpusKind::Wiki);
        assert_eq!(corpus.records(), &["first article", "second article"]);
    }

    #[test]
    fn test_missing_wiki_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(WikiDirLoader::new(dir.path().join("nope")).load().is_err());
    }

    #[test]
    fn test_book_lines_skip_blanks() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("books.txt");
        fs::write(&path, "It was dark.\n\nThe end.  \r\n").unwrap();

        let corpus = BookLinesLoader::new(&path).load().unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0).unwrap(), "It was dark.");
        assert_eq!(corpus.get(1).unwrap(), "The end.");
    }
}
