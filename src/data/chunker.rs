// ============================================================
// Layer 4 — Text Chunker
// ============================================================
// Turns raw corpus records into plain-text chunks of roughly
// `chunk_length` characters. Each corpus gets its own strategy:
//
// Wiki (one record = one whole article):
//   Fixed-size character windows with no overlap. The last
//   window may be shorter. Concatenating the chunks gives back
//   the original article exactly.
//
//   chunk_length=4, "abcdefghij" → ["abcd", "efgh", "ij"]
//
// Book (one record = one sentence):
//   Sentences are glued together greedily. When appending the
//   next sentence would push the running buffer past
//   `chunk_length`, the buffer is emitted and the sentence starts
//   a new buffer.
//
//   chunk_length=450, ["a"*10, "b"*10, "c"*500]
//     → ["a"*10 + "b"*10]
//
//   The final buffer ("c"*500 above) is NOT emitted. Callers
//   rely on this behaviour; see DESIGN.md before changing it.
//   A sentence longer than `chunk_length` arriving first emits
//   an empty chunk, which the mixer's length filter removes.
//
// Lengths are counted in chars (Unicode scalar values) so a
// window never splits a multi-byte character.

/// Default target chunk length in characters
pub const DEFAULT_CHUNK_LENGTH: usize = 450;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    /// Target number of characters per chunk
    chunk_length: usize,
}

impl Chunker {
    /// Create a new Chunker.
    ///
    /// # Panics
    /// Panics if chunk_length is 0, because the wiki windows
    /// would never advance
    pub fn new(chunk_length: usize) -> Self {
        assert!(chunk_length > 0, "chunk_length must be positive");
        Self { chunk_length }
    }

    /// Split one article into consecutive character windows.
    pub fn chunk_wiki(&self, document_text: &str) -> Vec<String> {
        let chars: Vec<char> = document_text.chars().collect();
        chars
            .chunks(self.chunk_length)
            .map(|window| window.iter().collect())
            .collect()
    }

    /// Glue consecutive sentences into chunks. The trailing partial
    /// buffer is dropped.
    pub fn chunk_book<S: AsRef<str>>(&self, sentences: &[S]) -> Vec<String> {
        let mut chunks        = Vec::new();
        let mut current       = String::new();
        let mut current_chars = 0usize;

        for sentence in sentences {
            let sentence       = sentence.as_ref();
            let sentence_chars = sentence.chars().count();

            if current_chars + sentence_chars > self.chunk_length {
                chunks.push(std::mem::take(&mut current));
                current.push_str(sentence);
                current_chars = sentence_chars;
            } else {
                current.push_str(sentence);
                current_chars += sentence_chars;
            }
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_LENGTH)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wiki_fixed_windows() {
        let c      = Chunker::new(4);
        let chunks = c.chunk_wiki("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_wiki_empty_document_gives_no_chunks() {
        let c = Chunker::new(450);
        assert!(c.chunk_wiki("").is_empty());
    }

    #[test]
    fn test_wiki_counts_chars_not_bytes() {
        let c      = Chunker::new(2);
        let chunks = c.chunk_wiki("żółw");
        assert_eq!(chunks, vec!["żó", "łw"]);
    }

    #[test]
    fn test_book_trailing_buffer_is_not_flushed() {
        let c         = Chunker::new(450);
        let sentences = vec!["a".repeat(10), "b".repeat(10), "c".repeat(500)];
        let chunks    = c.chunk_book(&sentences);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[0], format!("{}{}", "a".repeat(10), "b".repeat(10)));
    }

    #[test]
    fn test_book_flushes_before_overflow() {
        let c      = Chunker::new(5);
        let chunks = c.chunk_book(&["ab", "cd", "ef", "g"]);
        // "abcd" + "ef" would be 6 > 5 → flush "abcd", buffer "efg" is dropped
        assert_eq!(chunks, vec!["abcd"]);
    }

    #[test]
    fn test_book_long_first_sentence_emits_empty_chunk() {
        let c      = Chunker::new(3);
        let chunks = c.chunk_book(&["toolong", "x"]);
        assert_eq!(chunks, vec!["", "toolong"]);
    }

    #[test]
    #[should_panic]
    fn test_zero_chunk_length_panics() {
        let _ = Chunker::new(0);
    }

    proptest! {
        #[test]
        fn prop_wiki_chunks_concatenate_to_input(text in ".{0,2000}", len in 1usize..600) {
            let c      = Chunker::new(len);
            let chunks = c.chunk_wiki(&text);
            prop_assert_eq!(chunks.concat(), text.clone());
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= len);
            }
        }
    }
}
