// src/playback/mod.rs
//
// RSVP playback engine. Turns a flat, page-indexed word stream into a timed,
// seekable, pausable sequence of on-screen chunks. The engine only emits
// events; drawing them is the renderer collaborator's concern.

mod control;
mod index;
mod navigation;
pub mod pacing;
mod reader;

pub use control::{PlaybackControl, ReaderState};
pub use index::WordIndex;
pub use reader::RsvpReader;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ============================================================================
// Shared Types (used by the engine and all front ends)
// ============================================================================

/// Machine state of a reader session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Starting,
    Running,
    Paused,
}

/// Status reported to the renderer with every render event.
/// `Finished` and `Stopped` are event flags over the `Idle` machine state,
/// not states of their own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackStatus {
    Ready,
    Running,
    Paused,
    Finished,
    Stopped,
    NoContent,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Ready => "ready",
            PlaybackStatus::Running => "running",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Finished => "finished",
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::NoContent => "no-content",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render event - the main data package emitted to the renderer, once per
/// scheduler tick or navigation action.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderEvent {
    /// Chunk words joined with single spaces; empty at terminal positions
    pub chunk: String,
    /// 1-based reading page
    pub page: usize,
    /// Fraction of the document consumed once this chunk has been read, in [0, 1]
    pub progress: f64,
    pub status: PlaybackStatus,
    /// 1-based number of the first word in the chunk (0 when the chunk is empty)
    pub word_start: usize,
    /// 1-based number of the last word in the chunk
    pub word_end: usize,
    pub total_words: usize,
}

/// Request to reposition the page preview - emitted only when the reading
/// page differs from the page previewed last, and only while running or paused
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// 1-based page to preview
    pub page: usize,
}

/// Summary reported after a document is loaded and indexed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub words: usize,
    pub pages: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// Non-fatal playback errors. Configuration errors never appear here: bad
/// pacing or chunk-size values are coerced to the nearest valid value by the
/// setters, which return the applied value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackError {
    /// Zero words available - start refused before any transition
    NoContent,
    /// Seek/start target page beyond known pages - cursor clamped, caller decides
    PageOutOfRange { requested: usize, pages: usize },
    /// A start was requested while a loop is still active and has not been joined
    ConcurrentStartRejected,
    /// pause() outside Running - reported, not fatal
    NotRunning,
    /// resume() outside Paused - reported, not fatal
    NotPaused,
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NoContent => write!(f, "No text loaded. Cannot start playback."),
            PlaybackError::PageOutOfRange { requested, pages } => write!(
                f,
                "Page {} is beyond the last page ({}). Position clamped to the end of the text.",
                requested, pages
            ),
            PlaybackError::ConcurrentStartRejected => {
                write!(f, "Playback is already running. Stop or pause it first.")
            }
            PlaybackError::NotRunning => write!(f, "Playback is not running."),
            PlaybackError::NotPaused => write!(f, "Playback is not paused."),
        }
    }
}

impl From<PlaybackError> for String {
    fn from(err: PlaybackError) -> Self {
        err.to_string()
    }
}

// ============================================================================
// Event Emission
// ============================================================================

/// Renderer collaborator seam. Implementations deliver scoped events to
/// whatever surface draws them (terminal, web socket, test channel).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, session_id: &str, payload: serde_json::Value);
}

/// Emit an event scoped to a specific session
pub fn emit_to_session<S: Serialize>(
    sink: &dyn EventSink,
    event: &str,
    session_id: &str,
    payload: S,
) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit(event, session_id, value),
        Err(e) => {
            tlog!(
                "[emit_to_session] Failed to serialise '{}:{}' payload: {}",
                event, session_id, e
            );
        }
    }
}

/// Emit a render event to a session
pub fn emit_render(sink: &dyn EventSink, session_id: &str, event: RenderEvent) {
    emit_to_session(sink, "render-event", session_id, event);
}

/// Emit a preview reposition request to a session
pub fn emit_preview(sink: &dyn EventSink, session_id: &str, page: usize) {
    emit_to_session(sink, "preview-page", session_id, PreviewRequest { page });
}

/// One emitted event, as delivered by `ChannelSink`
#[derive(Clone, Debug)]
pub struct SinkMessage {
    pub event: String,
    pub session_id: String,
    pub payload: serde_json::Value,
}

/// Channel-backed sink for front ends and tests: events arrive on an
/// unbounded mpsc receiver in emission order.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &str, session_id: &str, payload: serde_json::Value) {
        // Receiver gone means the front end shut down; nothing left to notify
        let _ = self.tx.send(SinkMessage {
            event: event.to_string(),
            session_id: session_id.to_string(),
            payload,
        });
    }
}

// ============================================================================
// Command Surface
// ============================================================================

/// The playback command surface. Any front end - CLI, web, or native UI -
/// drives the engine through these operations.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Replace the loaded document. Any active loop is cancelled and joined
    /// first; playback position resets to the start of the new document.
    async fn load_document(&mut self, pages: Vec<Vec<String>>) -> DocumentSummary;

    /// Discard the loaded document and return to the no-content state.
    async fn unload_document(&mut self);

    /// Begin playback from the first word of `from_page` (1-based, defaults
    /// to page 1). Valid from Idle or Paused; a paused or finished loop is
    /// joined before the new one spawns.
    async fn start(&mut self, from_page: Option<usize>) -> Result<(), PlaybackError>;

    /// Cancel the loop, join it, and reset to Idle with the cursor at 0.
    async fn stop(&mut self);

    /// Suspend advancement. Valid only while Running.
    fn pause(&mut self) -> Result<(), PlaybackError>;

    /// Resume advancement. Valid only while Paused.
    fn resume(&mut self) -> Result<(), PlaybackError>;

    /// Set words per minute. Non-positive values are coerced to 1; returns
    /// the applied value. Takes effect on the next tick.
    fn set_wpm(&self, wpm: u32) -> u32;

    /// Set words shown per tick. Non-positive values are coerced to 1;
    /// returns the applied value. Takes effect on the next tick.
    fn set_chunk_size(&self, words: usize) -> usize;

    /// Set the sentence-pause multiplier (>= 1). Returns the applied value.
    fn set_punctuation_multiplier(&self, multiplier: f64) -> f64;

    /// Current machine state (a naturally finished loop reports Idle).
    fn state(&self) -> PlaybackState;

    /// Current renderer-facing status.
    fn status(&self) -> PlaybackStatus;

    fn session_id(&self) -> &str;
}
