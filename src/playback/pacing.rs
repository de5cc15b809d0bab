// src/playback/pacing.rs
//
// Chunk pacing policy and shared timing constants for the scheduler loop.
// Extracted here so the loop, the navigation controller, and tests agree on
// one set of values.

use std::time::Duration;

/// Minimum delay (ms) per chunk, regardless of configuration. Guarantees
/// forward progress and bounds CPU usage at pathological rates.
pub const MIN_CHUNK_DELAY_MS: u64 = 50;

/// Poll interval (ms) while paused.
pub(super) const PAUSE_POLL_MS: u64 = 50;

/// Slice length (ms) for delay waits, so stop/pause interrupt a wait within
/// one slice rather than after the full remaining delay.
pub(super) const SLEEP_SLICE_MS: u64 = 50;

/// Extra dwell applied to a chunk that ends a sentence.
pub const DEFAULT_PUNCTUATION_MULTIPLIER: f64 = 1.3;

/// Characters that mark a sentence-terminating word.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Whether `word` ends a sentence. Only the final character is inspected, so
/// a word ending in a quote or bracket after the punctuation does not count.
pub fn ends_sentence(word: &str) -> bool {
    word.chars()
        .next_back()
        .map(|c| SENTENCE_TERMINATORS.contains(&c))
        .unwrap_or(false)
}

/// Delay before the next chunk replaces this one.
///
/// The base interval is per-word scaled by chunk length, so the effective
/// words-per-minute rate stays constant as the chunk size changes. A
/// sentence-ending chunk dwells `punctuation_multiplier` times longer.
/// Non-positive rates are treated as 1 wpm; the result never drops below
/// the minimum floor.
pub fn delay_for(chunk: &[String], wpm: u32, punctuation_multiplier: f64) -> Duration {
    let wpm = wpm.max(1) as f64;
    let mut secs = (60.0 / wpm) * chunk.len() as f64;
    if let Some(last) = chunk.last() {
        if ends_sentence(last) {
            secs *= punctuation_multiplier.max(1.0);
        }
    }
    Duration::from_secs_f64(secs).max(Duration::from_millis(MIN_CHUNK_DELAY_MS))
}
