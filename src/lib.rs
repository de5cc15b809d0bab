// src/lib.rs
//
// flashread: rapid serial visual presentation (RSVP) playback engine.
// The playback module owns the state machine and scheduler loop; sessions
// exposes the command surface front ends drive; extract and settings are the
// collaborator seams for text extraction and persisted configuration.

#[macro_use]
mod logging;

pub mod extract;
pub mod playback;
pub mod sessions;
pub mod settings;

pub use extract::{paginate, ExtractedPages, PlainTextExtractor, TextExtractor};
pub use logging::{init_file_logging, stop_file_logging};
pub use playback::{
    ChannelSink, DocumentSummary, EventSink, PlaybackControl, PlaybackDevice, PlaybackError,
    PlaybackState, PlaybackStatus, PreviewRequest, RenderEvent, RsvpReader, SinkMessage,
    WordIndex,
};
pub use settings::{load_settings, save_settings, ReaderSettings};
