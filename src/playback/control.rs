// src/playback/control.rs
//
// Shared control state between the command surface and the scheduler loop.
// Everything the loop reads mid-flight is atomic, so pause/stop and live
// pacing changes take effect on the next tick without restarting playback.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use super::pacing::DEFAULT_PUNCTUATION_MULTIPLIER;
use super::{PlaybackError, PlaybackState};

/// Shared playback control. Clones share the same underlying flags, cursor,
/// and pacing configuration.
#[derive(Clone)]
pub struct PlaybackControl {
    /// Set to true to cancel the loop
    cancel_flag: Arc<AtomicBool>,
    /// Set to true to suspend advancement
    pause_flag: Arc<AtomicBool>,
    /// Index of the next word to display; word count means exhausted
    cursor: Arc<AtomicUsize>,
    /// Words per minute, always >= 1
    wpm: Arc<AtomicU32>,
    /// Words displayed per tick, always >= 1
    chunk_size: Arc<AtomicUsize>,
    /// Sentence-pause multiplier as f64 bits (use the accessor pair)
    punctuation_multiplier: Arc<AtomicU64>,
}

impl PlaybackControl {
    pub fn new(wpm: u32, chunk_size: usize) -> Self {
        Self {
            cancel_flag: Arc::new(AtomicBool::new(false)),
            pause_flag: Arc::new(AtomicBool::new(false)),
            cursor: Arc::new(AtomicUsize::new(0)),
            wpm: Arc::new(AtomicU32::new(wpm.max(1))),
            chunk_size: Arc::new(AtomicUsize::new(chunk_size.max(1))),
            punctuation_multiplier: Arc::new(AtomicU64::new(
                DEFAULT_PUNCTUATION_MULTIPLIER.to_bits(),
            )),
        }
    }

    /// Reset control flags for a new loop. The cursor is left alone; start
    /// re-derives it from the requested page.
    pub fn reset(&self) {
        self.cancel_flag.store(false, Ordering::Relaxed);
        self.pause_flag.store(false, Ordering::Relaxed);
    }

    /// Signal cancellation
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Suspend advancement
    pub fn pause(&self) {
        self.pause_flag.store(true, Ordering::Relaxed);
    }

    /// Resume advancement
    pub fn resume(&self) {
        self.pause_flag.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.pause_flag.load(Ordering::Relaxed)
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn set_cursor(&self, cursor: usize) {
        self.cursor.store(cursor, Ordering::Release);
    }

    /// Advance the cursor by `n`, clamped to `limit`.
    pub fn advance(&self, n: usize, limit: usize) {
        let next = self.cursor().saturating_add(n).min(limit);
        self.set_cursor(next);
    }

    pub fn wpm(&self) -> u32 {
        self.wpm.load(Ordering::Relaxed)
    }

    /// Set words per minute. Non-positive values are coerced to 1 so pacing
    /// never divides by zero or inverts. Returns the applied value.
    pub fn set_wpm(&self, wpm: u32) -> u32 {
        let applied = wpm.max(1);
        self.wpm.store(applied, Ordering::Relaxed);
        applied
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.load(Ordering::Relaxed)
    }

    /// Set words per tick. Non-positive values are coerced to 1. Returns the
    /// applied value.
    pub fn set_chunk_size(&self, words: usize) -> usize {
        let applied = words.max(1);
        self.chunk_size.store(applied, Ordering::Relaxed);
        applied
    }

    pub fn punctuation_multiplier(&self) -> f64 {
        f64::from_bits(self.punctuation_multiplier.load(Ordering::Relaxed))
    }

    /// Set the sentence-pause multiplier. Values below 1 are coerced to 1;
    /// non-finite values fall back to the default. Returns the applied value.
    pub fn set_punctuation_multiplier(&self, multiplier: f64) -> f64 {
        let applied = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            DEFAULT_PUNCTUATION_MULTIPLIER
        };
        self.punctuation_multiplier
            .store(applied.to_bits(), Ordering::Relaxed);
        applied
    }
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new(250, 1)
    }
}

/// Session state for a reader: the shared control block, the machine state,
/// and the scheduler loop's task handle. Encapsulates the
/// Idle -> Starting -> Running <-> Paused -> Idle lifecycle so loops are
/// always joined before the next one spawns.
pub struct ReaderState {
    pub control: PlaybackControl,
    pub state: PlaybackState,
    pub session_id: String,
    pub task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ReaderState {
    pub fn new(session_id: String, wpm: u32, chunk_size: usize) -> Self {
        Self {
            control: PlaybackControl::new(wpm, chunk_size),
            state: PlaybackState::Idle,
            session_id,
            task_handle: None,
        }
    }

    /// Check that a new loop may start. A loop that is actively running must
    /// be stopped or paused first; overlapping loops are never allowed.
    pub fn check_can_start(&self) -> Result<(), PlaybackError> {
        if self.state == PlaybackState::Running || self.state == PlaybackState::Starting {
            return Err(PlaybackError::ConcurrentStartRejected);
        }
        Ok(())
    }

    /// Prepare for starting: reset control flags and set state to Starting.
    pub fn prepare_start(&mut self) {
        self.state = PlaybackState::Starting;
        self.control.reset();
    }

    /// Mark as running after the loop task is spawned.
    pub fn mark_running(&mut self, handle: tokio::task::JoinHandle<()>) {
        self.task_handle = Some(handle);
        self.state = PlaybackState::Running;
    }

    /// Stop the loop: cancel, await the task, return to Idle.
    pub async fn stop(&mut self) {
        self.control.cancel();
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
        self.state = PlaybackState::Idle;
    }

    /// Suspend advancement. Valid only while Running.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Running {
            return Err(PlaybackError::NotRunning);
        }
        self.control.pause();
        self.state = PlaybackState::Paused;
        Ok(())
    }

    /// Resume advancement. Valid only while Paused.
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Paused {
            return Err(PlaybackError::NotPaused);
        }
        self.control.resume();
        self.state = PlaybackState::Running;
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        self.state.clone()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
