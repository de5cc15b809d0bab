// src/playback/navigation.rs
//
// Chunk and page navigation, valid only while paused. Every call recomputes
// and emits a render event directly - there is no timer tick behind it.
// Outside the paused state these are ignored no-ops, not errors.

use std::sync::Arc;

use super::index::WordIndex;
use super::reader::RsvpReader;
use super::{PlaybackDevice, PlaybackState, PlaybackStatus};

impl RsvpReader {
    /// The loaded index, but only while paused.
    fn paused_index(&self) -> Option<Arc<WordIndex>> {
        if self.effective_state() != PlaybackState::Paused {
            return None;
        }
        self.index().cloned()
    }

    /// Step back one chunk, saturating at the first word. Returns false when
    /// ignored (not paused).
    pub fn previous_chunk(&self) -> bool {
        if self.paused_index().is_none() {
            return false;
        }
        let control = self.control();
        let cursor = control.cursor();
        control.set_cursor(cursor.saturating_sub(control.chunk_size()));
        tlog!(
            "[Reader:{}] Stepped back to word {}",
            self.session_id(),
            control.cursor()
        );
        self.emit_current(PlaybackStatus::Paused);
        true
    }

    /// Step forward one chunk, refusing to move past the final chunk.
    /// Returns false when ignored (not paused) or already on the last chunk.
    pub fn next_chunk(&self) -> bool {
        let Some(index) = self.paused_index() else {
            return false;
        };
        let control = self.control();
        let cursor = control.cursor();
        let chunk_len = index.chunk_at(cursor, control.chunk_size()).len();
        if cursor + chunk_len >= index.word_count() {
            return false;
        }
        control.set_cursor(cursor + chunk_len);
        tlog!(
            "[Reader:{}] Stepped forward to word {}",
            self.session_id(),
            control.cursor()
        );
        self.emit_current(PlaybackStatus::Paused);
        true
    }

    /// Jump to the first word of `page` (1-based). Targets beyond the last
    /// page, or on pages with no remaining text, clamp to the last valid
    /// page start. Returns the page actually landed on, or None when ignored
    /// (not paused).
    pub fn seek_to_page(&self, page: usize) -> Option<usize> {
        let index = self.paused_index()?;
        let control = self.control();
        let cursor = match index.page_start(page) {
            Some(start) if start < index.word_count() => start,
            _ => {
                let clamped = index.last_valid_start();
                tlog!(
                    "[Reader:{}] Seek to page {} clamped (cursor {})",
                    self.session_id(),
                    page,
                    clamped
                );
                clamped
            }
        };
        control.set_cursor(cursor);
        self.emit_current(PlaybackStatus::Paused);
        Some(index.page_of(cursor))
    }
}
