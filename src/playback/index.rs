// src/playback/index.rs
//
// Immutable word/page index. Built once per loaded document from the
// extraction collaborator's pages; discarded when a new document loads.

/// Flat word sequence plus the flat-index offset of each page's first word.
///
/// `page_starts` has exactly one entry per source page, recorded before that
/// page's words are appended, so pages with no extracted text repeat the
/// offset of the next page with content (or the total word count if every
/// trailing page is empty).
pub struct WordIndex {
    words: Vec<String>,
    page_starts: Vec<usize>,
}

impl WordIndex {
    pub fn build(pages: Vec<Vec<String>>) -> Self {
        let mut words = Vec::new();
        let mut page_starts = Vec::with_capacity(pages.len());
        for page in pages {
            page_starts.push(words.len());
            words.extend(page);
        }
        Self { words, page_starts }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.page_starts.len()
    }

    /// 1-based page containing `word_index`: the greatest page whose start
    /// offset is <= the index. Returns 1 for a degenerate empty document.
    pub fn page_of(&self, word_index: usize) -> usize {
        let mut page = 1;
        for (i, &start) in self.page_starts.iter().enumerate() {
            if start <= word_index {
                page = i + 1;
            } else {
                break;
            }
        }
        page
    }

    /// Flat offset of the first word of `page` (1-based). None when the page
    /// is out of range. The offset equals the word count for trailing pages
    /// with no extracted text.
    pub fn page_start(&self, page: usize) -> Option<usize> {
        if page == 0 {
            return None;
        }
        self.page_starts.get(page - 1).copied()
    }

    /// The chunk displayed at `cursor`: up to `chunk_size` words, fewer at
    /// the end of the document, empty at or past the end.
    pub fn chunk_at(&self, cursor: usize, chunk_size: usize) -> &[String] {
        if cursor >= self.words.len() {
            return &[];
        }
        let end = cursor.saturating_add(chunk_size.max(1)).min(self.words.len());
        &self.words[cursor..end]
    }

    /// Index of the last word (0 for an empty document).
    pub fn last_word_index(&self) -> usize {
        self.words.len().saturating_sub(1)
    }

    /// Greatest page start that is a valid cursor position. Used to clamp
    /// out-of-range seeks; 0 for an empty document.
    pub fn last_valid_start(&self) -> usize {
        self.page_starts
            .iter()
            .rev()
            .find(|&&start| start < self.words.len())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_build_records_offsets_before_each_page() {
        let index = WordIndex::build(vec![
            page(&["The", "quick"]),
            page(&["fox.", "jumped"]),
        ]);
        assert_eq!(index.word_count(), 4);
        assert_eq!(index.page_count(), 2);
        assert_eq!(index.page_start(1), Some(0));
        assert_eq!(index.page_start(2), Some(2));
    }

    #[test]
    fn test_empty_pages_repeat_next_offset() {
        let index = WordIndex::build(vec![
            page(&["a"]),
            page(&[]),
            page(&["b", "c"]),
            page(&[]),
        ]);
        assert_eq!(index.page_start(1), Some(0));
        assert_eq!(index.page_start(2), Some(1));
        assert_eq!(index.page_start(3), Some(1));
        // Trailing empty page records the total word count
        assert_eq!(index.page_start(4), Some(3));
    }

    #[test]
    fn test_page_of_is_monotonic() {
        let index = WordIndex::build(vec![
            page(&["a", "b"]),
            page(&["c"]),
            page(&["d", "e", "f"]),
        ]);
        let mut last = 0;
        for i in 0..index.word_count() {
            let p = index.page_of(i);
            assert!(p >= last, "page_of regressed at word {}", i);
            last = p;
        }
        assert_eq!(index.page_of(0), 1);
        assert_eq!(index.page_of(1), 1);
        assert_eq!(index.page_of(2), 2);
        assert_eq!(index.page_of(3), 3);
        assert_eq!(index.page_of(5), 3);
    }

    #[test]
    fn test_page_of_start_offsets() {
        let index = WordIndex::build(vec![page(&["a", "b"]), page(&["c"]), page(&["d"])]);
        for p in 1..=index.page_count() {
            let start = index.page_start(p).unwrap();
            assert_eq!(index.page_of(start), p);
        }
    }

    #[test]
    fn test_empty_document_degenerates_to_page_one() {
        let index = WordIndex::build(vec![]);
        assert!(index.is_empty());
        assert_eq!(index.page_count(), 0);
        assert_eq!(index.page_of(0), 1);
        assert_eq!(index.page_start(1), None);
    }

    #[test]
    fn test_chunk_at_sizes() {
        let index = WordIndex::build(vec![page(&["a", "b", "c", "d", "e"])]);
        assert_eq!(index.chunk_at(0, 2).len(), 2);
        assert_eq!(index.chunk_at(4, 2).len(), 1);
        assert_eq!(index.chunk_at(5, 2).len(), 0);
        assert_eq!(index.chunk_at(0, 10).len(), 5);
        // Zero chunk size is coerced to one word
        assert_eq!(index.chunk_at(0, 0).len(), 1);
    }

    #[test]
    fn test_repeated_advance_visits_every_word_once() {
        let index = WordIndex::build(vec![page(&["a", "b", "c", "d", "e", "f", "g"])]);
        for chunk_size in 1..=4 {
            let mut cursor = 0;
            let mut visited = 0;
            while cursor < index.word_count() {
                let chunk = index.chunk_at(cursor, chunk_size);
                assert_eq!(chunk.len(), chunk_size.min(index.word_count() - cursor));
                visited += chunk.len();
                cursor += chunk.len();
            }
            assert_eq!(visited, index.word_count());
            assert!(index.chunk_at(cursor, chunk_size).is_empty());
        }
    }

    #[test]
    fn test_last_valid_start_skips_trailing_empty_pages() {
        let index = WordIndex::build(vec![page(&["a", "b"]), page(&["c"]), page(&[])]);
        assert_eq!(index.last_valid_start(), 2);

        let empty = WordIndex::build(vec![page(&[])]);
        assert_eq!(empty.last_valid_start(), 0);
    }
}
