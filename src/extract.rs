// src/extract.rs
//
// Text-extraction collaborator seam. The engine consumes ordered pages of
// pre-tokenised words; producing them (PDF, EPUB, OCR, ...) is the
// collaborator's concern. The built-in extractor handles plain text with
// form-feed page breaks, which is enough for the terminal front end and for
// tests. An upstream extraction failure surfaces as zero pages, never as a
// typed error the engine has to interpret.

use std::path::{Path, PathBuf};

/// Ordered pages, each an ordered sequence of whitespace-tokenised words.
/// A page with no extractable text is an empty entry, not an error.
pub type ExtractedPages = Vec<Vec<String>>;

pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self) -> Result<ExtractedPages, String>;
}

/// Plain-text files: pages split on form feed, words on whitespace.
pub struct PlainTextExtractor {
    path: PathBuf,
}

impl PlainTextExtractor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract_pages(&self) -> Result<ExtractedPages, String> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("Failed to read {}: {}", self.path.display(), e))?;
        Ok(paginate(&content))
    }
}

/// Split raw text into pages on form feeds, then tokenise each page on
/// whitespace.
pub fn paginate(content: &str) -> ExtractedPages {
    content
        .split('\u{0c}')
        .map(|page| page.split_whitespace().map(str::to_string).collect())
        .collect()
}
