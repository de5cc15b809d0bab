// src/sessions.rs
//
// Reader session registry and command surface. Front ends address a reader
// by session id; each session owns at most one scheduler loop at a time,
// enforced by the registry lock plus the reader's join-on-start discipline.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::playback::{
    DocumentSummary, EventSink, PlaybackDevice, PlaybackStatus, RsvpReader,
};

static READERS: Lazy<Mutex<HashMap<String, RsvpReader>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Create a reader session with the given sink and initial configuration.
pub async fn create_reader(
    session_id: &str,
    sink: Arc<dyn EventSink>,
    wpm: u32,
    words_per_step: usize,
) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    if readers.contains_key(session_id) {
        return Err(format!("Reader session '{}' already exists", session_id));
    }
    readers.insert(
        session_id.to_string(),
        RsvpReader::new(session_id.to_string(), sink, wpm, words_per_step),
    );
    tlog!("[sessions] Created reader session '{}'", session_id);
    Ok(())
}

/// Stop and remove a reader session.
pub async fn destroy_reader(session_id: &str) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    match readers.remove(session_id) {
        Some(mut reader) => {
            reader.stop().await;
            tlog!("[sessions] Destroyed reader session '{}'", session_id);
            Ok(())
        }
        None => Err(format!("No reader session '{}'", session_id)),
    }
}

fn missing(session_id: &str) -> String {
    format!("No reader session '{}'", session_id)
}

/// Load a document into a session, replacing any previous one.
pub async fn load_document(
    session_id: &str,
    pages: Vec<Vec<String>>,
) -> Result<DocumentSummary, String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.load_document(pages).await)
}

/// Discard a session's document.
pub async fn unload_document(session_id: &str) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    reader.unload_document().await;
    Ok(())
}

/// Start playback from the given 1-based page (page 1 when omitted).
pub async fn start_reading(session_id: &str, from_page: Option<usize>) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    reader.start(from_page).await.map_err(|e| e.to_string())
}

pub async fn pause_reading(session_id: &str) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    reader.pause().map_err(|e| e.to_string())
}

pub async fn resume_reading(session_id: &str) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    reader.resume().map_err(|e| e.to_string())
}

pub async fn stop_reading(session_id: &str) -> Result<(), String> {
    let mut readers = READERS.lock().await;
    let reader = readers.get_mut(session_id).ok_or_else(|| missing(session_id))?;
    reader.stop().await;
    Ok(())
}

/// Step back one chunk. Returns false when ignored (not paused).
pub async fn previous_chunk(session_id: &str) -> Result<bool, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.previous_chunk())
}

/// Step forward one chunk. Returns false when ignored or at the last chunk.
pub async fn next_chunk(session_id: &str) -> Result<bool, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.next_chunk())
}

/// Seek to the first word of a page while paused. Returns the page actually
/// landed on, or None when ignored (not paused).
pub async fn seek_to_page(session_id: &str, page: usize) -> Result<Option<usize>, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.seek_to_page(page))
}

/// Set words per minute; returns the applied (possibly coerced) value.
pub async fn set_wpm(session_id: &str, wpm: u32) -> Result<u32, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.set_wpm(wpm))
}

/// Set words per step; returns the applied (possibly coerced) value.
pub async fn set_chunk_size(session_id: &str, words: usize) -> Result<usize, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.set_chunk_size(words))
}

/// Set the sentence-pause multiplier; returns the applied value.
pub async fn set_punctuation_multiplier(session_id: &str, multiplier: f64) -> Result<f64, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.set_punctuation_multiplier(multiplier))
}

pub async fn reader_status(session_id: &str) -> Result<PlaybackStatus, String> {
    let readers = READERS.lock().await;
    let reader = readers.get(session_id).ok_or_else(|| missing(session_id))?;
    Ok(reader.status())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::ChannelSink;

    fn pages() -> Vec<Vec<String>> {
        vec![vec!["one".to_string(), "two".to_string()]]
    }

    #[tokio::test]
    async fn test_create_and_destroy() {
        let (sink, _rx) = ChannelSink::new();
        create_reader("sess_create", sink.clone(), 250, 1)
            .await
            .expect("create");
        assert!(create_reader("sess_create", sink, 250, 1).await.is_err());
        destroy_reader("sess_create").await.expect("destroy");
        assert!(destroy_reader("sess_create").await.is_err());
    }

    #[tokio::test]
    async fn test_commands_require_a_session() {
        assert!(start_reading("sess_absent", None).await.is_err());
        assert!(pause_reading("sess_absent").await.is_err());
        assert!(reader_status("sess_absent").await.is_err());
    }

    #[tokio::test]
    async fn test_command_surface_round_trip() {
        let (sink, _rx) = ChannelSink::new();
        create_reader("sess_round", sink, 100_000, 2)
            .await
            .expect("create");
        let summary = load_document("sess_round", pages()).await.expect("load");
        assert_eq!(summary.words, 2);
        assert_eq!(summary.pages, 1);
        assert_eq!(
            reader_status("sess_round").await.expect("status"),
            PlaybackStatus::Ready
        );
        assert_eq!(set_wpm("sess_round", 0).await.expect("wpm"), 1);
        assert_eq!(set_chunk_size("sess_round", 0).await.expect("chunk"), 1);
        destroy_reader("sess_round").await.expect("destroy");
    }
}
