// src/playback/reader.rs
//
// RSVP reader device: owns the word index and the scheduler loop task.
// The loop emits one render event per chunk, sleeps the paced delay in short
// slices so stop and pause interrupt the wait promptly, then advances the
// cursor. Natural completion emits a final event and returns to Idle.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::control::{PlaybackControl, ReaderState};
use super::index::WordIndex;
use super::pacing::{self, PAUSE_POLL_MS, SLEEP_SLICE_MS};
use super::{
    emit_preview, emit_render, DocumentSummary, EventSink, PlaybackDevice, PlaybackError,
    PlaybackState, PlaybackStatus, RenderEvent,
};

/// Sentinel meaning "no page previewed yet"
const NO_PREVIEW: usize = 0;

pub struct RsvpReader {
    sink: Arc<dyn EventSink>,
    reader_state: ReaderState,
    index: Option<Arc<WordIndex>>,
    /// Set when the loop ran out of words - finished, as opposed to stopped
    completed_flag: Arc<AtomicBool>,
    /// Last page sent to the preview surface, NO_PREVIEW while idle
    preview_page: Arc<AtomicUsize>,
}

impl RsvpReader {
    pub fn new(session_id: String, sink: Arc<dyn EventSink>, wpm: u32, chunk_size: usize) -> Self {
        Self {
            sink,
            reader_state: ReaderState::new(session_id, wpm, chunk_size),
            index: None,
            completed_flag: Arc::new(AtomicBool::new(false)),
            preview_page: Arc::new(AtomicUsize::new(NO_PREVIEW)),
        }
    }

    pub(super) fn control(&self) -> &PlaybackControl {
        &self.reader_state.control
    }

    pub(super) fn index(&self) -> Option<&Arc<WordIndex>> {
        self.index.as_ref()
    }

    fn is_completed(&self) -> bool {
        self.completed_flag.load(Ordering::Relaxed)
    }

    /// Effective machine state: a naturally finished loop reports Idle even
    /// though its handle has not been reaped yet.
    pub(super) fn effective_state(&self) -> PlaybackState {
        if self.is_completed() {
            PlaybackState::Idle
        } else {
            self.reader_state.state()
        }
    }

    /// Cancel and join any live or finished loop without emitting events.
    async fn ensure_stopped(&mut self) {
        self.reader_state.stop().await;
        self.control().reset();
    }

    /// Recompute and emit a render event for the current position. Used by
    /// pause/stop/load and the navigation controller - there is no timer
    /// tick behind these emissions.
    pub(super) fn emit_current(&self, status: PlaybackStatus) {
        let session_id = self.reader_state.session_id();
        match self.index.as_ref() {
            Some(index) if !index.is_empty() => {
                let control = self.control();
                let cursor = control.cursor();
                let chunk = index.chunk_at(cursor, control.chunk_size());
                let event = render_tick(index, cursor, chunk, status);
                let page = event.page;
                emit_render(self.sink.as_ref(), session_id, event);
                // Preview follows the reading page only while running or paused
                if matches!(
                    self.effective_state(),
                    PlaybackState::Running | PlaybackState::Paused
                ) {
                    maybe_emit_preview(self.sink.as_ref(), session_id, &self.preview_page, page);
                }
            }
            _ => {
                emit_render(
                    self.sink.as_ref(),
                    session_id,
                    RenderEvent {
                        chunk: String::new(),
                        page: 1,
                        progress: 0.0,
                        status: PlaybackStatus::NoContent,
                        word_start: 0,
                        word_end: 0,
                        total_words: 0,
                    },
                );
            }
        }
    }
}

#[async_trait]
impl PlaybackDevice for RsvpReader {
    async fn load_document(&mut self, pages: Vec<Vec<String>>) -> DocumentSummary {
        self.ensure_stopped().await;

        let index = WordIndex::build(pages);
        let summary = DocumentSummary {
            words: index.word_count(),
            pages: index.page_count(),
        };
        self.index = Some(Arc::new(index));
        self.control().set_cursor(0);
        self.completed_flag.store(false, Ordering::Relaxed);
        self.preview_page.store(NO_PREVIEW, Ordering::Relaxed);

        tlog!(
            "[Reader:{}] Document loaded ({} words, {} pages)",
            self.reader_state.session_id(),
            summary.words,
            summary.pages
        );

        self.emit_current(if summary.words == 0 {
            PlaybackStatus::NoContent
        } else {
            PlaybackStatus::Ready
        });
        summary
    }

    async fn unload_document(&mut self) {
        self.ensure_stopped().await;
        self.index = None;
        self.control().set_cursor(0);
        self.completed_flag.store(false, Ordering::Relaxed);
        self.preview_page.store(NO_PREVIEW, Ordering::Relaxed);
        tlog!(
            "[Reader:{}] Document unloaded",
            self.reader_state.session_id()
        );
        self.emit_current(PlaybackStatus::NoContent);
    }

    async fn start(&mut self, from_page: Option<usize>) -> Result<(), PlaybackError> {
        let index = match self.index.as_ref() {
            Some(index) if !index.is_empty() => index.clone(),
            _ => return Err(PlaybackError::NoContent),
        };

        // Reject overlap with an actively running loop; a paused or finished
        // loop is joined below so two loops never race on the cursor.
        if self.reader_state.state() == PlaybackState::Running && !self.is_completed() {
            return Err(PlaybackError::ConcurrentStartRejected);
        }
        self.ensure_stopped().await;

        let page = from_page.unwrap_or(1);
        match index.page_start(page) {
            Some(start) if start < index.word_count() => {
                self.control().set_cursor(start);
            }
            _ => {
                // In-range pages with no remaining text land here too: park
                // on the last word and let the caller decide how to proceed.
                self.control().set_cursor(index.last_word_index());
                self.completed_flag.store(false, Ordering::Relaxed);
                let err = PlaybackError::PageOutOfRange {
                    requested: page,
                    pages: index.page_count(),
                };
                tlog!("[Reader:{}] {}", self.reader_state.session_id(), err);
                self.emit_current(PlaybackStatus::Ready);
                return Err(err);
            }
        }

        self.completed_flag.store(false, Ordering::Relaxed);
        self.preview_page.store(NO_PREVIEW, Ordering::Relaxed);
        self.reader_state.prepare_start();

        let sink = self.sink.clone();
        let session_id = self.reader_state.session_id().to_string();
        let control = self.control().clone();
        let completed_flag = self.completed_flag.clone();
        let preview_page = self.preview_page.clone();

        tlog!(
            "[Reader:{}] Starting playback at page {} (cursor {}, {} wpm, {} words/step)",
            session_id,
            page,
            control.cursor(),
            control.wpm(),
            control.chunk_size()
        );

        let handle = tokio::spawn(run_reader_loop(
            sink,
            session_id,
            index,
            control,
            completed_flag,
            preview_page,
        ));
        self.reader_state.mark_running(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        self.reader_state.stop().await;
        self.control().reset();
        self.control().set_cursor(0);
        self.completed_flag.store(false, Ordering::Relaxed);
        self.preview_page.store(NO_PREVIEW, Ordering::Relaxed);
        tlog!("[Reader:{}] Stopped", self.reader_state.session_id());
        self.emit_current(PlaybackStatus::Stopped);
    }

    fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.is_completed() {
            return Err(PlaybackError::NotRunning);
        }
        self.reader_state.pause()?;
        tlog!(
            "[Reader:{}] Paused at word {}",
            self.reader_state.session_id(),
            self.control().cursor()
        );
        self.emit_current(PlaybackStatus::Paused);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.is_completed() {
            return Err(PlaybackError::NotPaused);
        }
        self.reader_state.resume()?;
        tlog!("[Reader:{}] Resumed", self.reader_state.session_id());
        Ok(())
    }

    fn set_wpm(&self, wpm: u32) -> u32 {
        let applied = self.control().set_wpm(wpm);
        if applied != wpm {
            tlog!(
                "[Reader:{}] wpm {} coerced to {}",
                self.reader_state.session_id(),
                wpm,
                applied
            );
        }
        applied
    }

    fn set_chunk_size(&self, words: usize) -> usize {
        let applied = self.control().set_chunk_size(words);
        if applied != words {
            tlog!(
                "[Reader:{}] chunk size {} coerced to {}",
                self.reader_state.session_id(),
                words,
                applied
            );
        }
        applied
    }

    fn set_punctuation_multiplier(&self, multiplier: f64) -> f64 {
        self.control().set_punctuation_multiplier(multiplier)
    }

    fn state(&self) -> PlaybackState {
        self.effective_state()
    }

    fn status(&self) -> PlaybackStatus {
        match self.index.as_ref() {
            None => PlaybackStatus::NoContent,
            Some(index) if index.is_empty() => PlaybackStatus::NoContent,
            Some(_) => {
                if self.is_completed() {
                    PlaybackStatus::Finished
                } else {
                    match self.reader_state.state() {
                        PlaybackState::Running | PlaybackState::Starting => PlaybackStatus::Running,
                        PlaybackState::Paused => PlaybackStatus::Paused,
                        PlaybackState::Idle => PlaybackStatus::Ready,
                    }
                }
            }
        }
    }

    fn session_id(&self) -> &str {
        self.reader_state.session_id()
    }
}

/// Build the render event for a tick at `cursor` with its precomputed chunk.
fn render_tick(
    index: &WordIndex,
    cursor: usize,
    chunk: &[String],
    status: PlaybackStatus,
) -> RenderEvent {
    let total = index.word_count();
    if chunk.is_empty() {
        // Terminal position: everything has been read
        return RenderEvent {
            chunk: String::new(),
            page: index.page_of(index.last_word_index()),
            progress: 1.0,
            status,
            word_start: total,
            word_end: total,
            total_words: total,
        };
    }
    let end = cursor + chunk.len();
    RenderEvent {
        chunk: chunk.join(" "),
        page: index.page_of(cursor),
        progress: end as f64 / total as f64,
        status,
        word_start: cursor + 1,
        word_end: end,
        total_words: total,
    }
}

fn maybe_emit_preview(
    sink: &dyn EventSink,
    session_id: &str,
    preview_page: &AtomicUsize,
    page: usize,
) {
    if preview_page.swap(page, Ordering::Relaxed) != page {
        emit_preview(sink, session_id, page);
    }
}

/// Sleep `delay` in short slices, returning early once cancellation or pause
/// is requested. A concurrent stop is observed within one slice, never after
/// the full remaining delay.
async fn wait_interruptible(control: &PlaybackControl, delay: Duration) {
    let slice = Duration::from_millis(SLEEP_SLICE_MS);
    let mut remaining = delay;
    while !remaining.is_zero() {
        let step = remaining.min(slice);
        sleep(step).await;
        remaining = remaining.saturating_sub(step);
        if control.is_cancelled() || control.is_paused() {
            return;
        }
    }
}

/// The scheduler loop. One instance per successful start; exits when
/// cancelled or when the cursor runs past the last word.
async fn run_reader_loop(
    sink: Arc<dyn EventSink>,
    session_id: String,
    index: Arc<WordIndex>,
    control: PlaybackControl,
    completed_flag: Arc<AtomicBool>,
    preview_page: Arc<AtomicUsize>,
) {
    let total = index.word_count();
    tlog!(
        "[Reader:{}] Loop started ({} words, {} pages)",
        session_id,
        total,
        index.page_count()
    );

    loop {
        if control.is_cancelled() {
            tlog!("[Reader:{}] Loop cancelled, exiting", session_id);
            return;
        }

        if control.is_paused() {
            sleep(Duration::from_millis(PAUSE_POLL_MS)).await;
            continue;
        }

        // Cursor and configuration are re-read every tick so seeks and live
        // pacing changes take effect on the next chunk.
        let cursor = control.cursor();
        let chunk = index.chunk_at(cursor, control.chunk_size());
        if chunk.is_empty() {
            completed_flag.store(true, Ordering::Relaxed);
            let event = render_tick(&index, cursor, chunk, PlaybackStatus::Finished);
            emit_render(sink.as_ref(), &session_id, event);
            tlog!("[Reader:{}] Finished ({} words read)", session_id, total);
            return;
        }

        let event = render_tick(&index, cursor, chunk, PlaybackStatus::Running);
        let page = event.page;
        emit_render(sink.as_ref(), &session_id, event);
        maybe_emit_preview(sink.as_ref(), &session_id, &preview_page, page);

        let delay = pacing::delay_for(chunk, control.wpm(), control.punctuation_multiplier());
        wait_interruptible(&control, delay).await;

        if control.is_cancelled() {
            tlog!("[Reader:{}] Loop cancelled mid-wait, exiting", session_id);
            return;
        }
        if control.is_paused() {
            // Pause arrived during the wait: keep the cursor so the same
            // chunk is shown again on resume.
            continue;
        }
        control.advance(chunk.len(), total);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    use super::*;
    use crate::playback::{ChannelSink, SinkMessage};

    fn page(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn sample_pages() -> Vec<Vec<String>> {
        vec![page(&["The", "quick"]), page(&["fox.", "jumped"])]
    }

    fn new_reader(wpm: u32, chunk_size: usize) -> (RsvpReader, UnboundedReceiver<SinkMessage>) {
        let (sink, rx) = ChannelSink::new();
        (RsvpReader::new("test".to_string(), sink, wpm, chunk_size), rx)
    }

    async fn next_render(rx: &mut UnboundedReceiver<SinkMessage>) -> RenderEvent {
        loop {
            let msg = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("sink closed");
            if msg.event == "render-event" {
                return serde_json::from_value(msg.payload).expect("render payload");
            }
        }
    }

    async fn collect_renders_until(
        rx: &mut UnboundedReceiver<SinkMessage>,
        stop_at: PlaybackStatus,
    ) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_render(rx).await;
            let done = event.status == stop_at;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn test_start_without_document_is_refused() {
        let (mut reader, _rx) = new_reader(250, 1);
        assert_eq!(reader.start(None).await, Err(PlaybackError::NoContent));
        assert_eq!(reader.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_start_with_zero_words_is_refused() {
        let (mut reader, _rx) = new_reader(250, 1);
        let summary = reader.load_document(vec![page(&[]), page(&[])]).await;
        assert_eq!(summary.words, 0);
        assert_eq!(summary.pages, 2);
        assert_eq!(reader.status(), PlaybackStatus::NoContent);
        assert_eq!(reader.start(Some(1)).await, Err(PlaybackError::NoContent));
    }

    #[tokio::test]
    async fn test_load_emits_ready_event() {
        let (mut reader, mut rx) = new_reader(250, 1);
        reader.load_document(sample_pages()).await;
        let event = next_render(&mut rx).await;
        assert_eq!(event.status, PlaybackStatus::Ready);
        assert_eq!(event.chunk, "The");
        assert_eq!(event.total_words, 4);
    }

    #[tokio::test]
    async fn test_playback_visits_every_chunk_and_finishes() {
        let (mut reader, mut rx) = new_reader(100_000, 2);
        reader.load_document(sample_pages()).await;
        let _ready = next_render(&mut rx).await;

        reader.start(Some(1)).await.expect("start");
        let events = collect_renders_until(&mut rx, PlaybackStatus::Finished).await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].chunk, "The quick");
        assert_eq!(events[0].page, 1);
        assert_eq!(events[0].word_start, 1);
        assert_eq!(events[0].word_end, 2);
        assert!((events[0].progress - 0.5).abs() < 1e-9);

        // Reading page flips to 2 exactly when the cursor reaches index 2
        assert_eq!(events[1].chunk, "fox. jumped");
        assert_eq!(events[1].page, 2);
        assert_eq!(events[1].word_start, 3);
        assert_eq!(events[1].word_end, 4);

        assert_eq!(events[2].chunk, "");
        assert!((events[2].progress - 1.0).abs() < 1e-9);

        assert_eq!(reader.status(), PlaybackStatus::Finished);
        assert_eq!(reader.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn test_preview_requests_follow_page_changes() {
        let (mut reader, mut rx) = new_reader(100_000, 2);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");

        let mut previews = Vec::new();
        loop {
            let msg = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out")
                .expect("sink closed");
            match msg.event.as_str() {
                "preview-page" => {
                    previews.push(msg.payload["page"].as_u64().expect("page"));
                }
                "render-event" => {
                    let event: RenderEvent = serde_json::from_value(msg.payload).expect("payload");
                    if event.status == PlaybackStatus::Finished {
                        break;
                    }
                }
                _ => {}
            }
        }
        // One request per page transition, no repeats within a page
        assert_eq!(previews, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_start_rejected_while_running() {
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");
        let _first = next_render(&mut rx).await;

        assert_eq!(
            reader.start(Some(1)).await,
            Err(PlaybackError::ConcurrentStartRejected)
        );
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_delay_within_a_slice() {
        // 1 wpm puts a 60s delay on every one-word chunk
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");
        let _first = next_render(&mut rx).await;

        let begun = Instant::now();
        reader.stop().await;
        assert!(
            begun.elapsed() < Duration::from_secs(2),
            "stop took {:?}, should be bounded by the polling slice",
            begun.elapsed()
        );
        assert_eq!(reader.state(), PlaybackState::Idle);
        assert_eq!(reader.control().cursor(), 0);
    }

    #[tokio::test]
    async fn test_pause_is_idempotent_and_resume_restores_running() {
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");
        let _first = next_render(&mut rx).await;

        reader.pause().expect("pause");
        let state_after_first = reader.state();
        let cursor_after_first = reader.control().cursor();

        // Second pause is a reported no-op with identical observable state
        assert_eq!(reader.pause(), Err(PlaybackError::NotRunning));
        assert_eq!(reader.state(), state_after_first);
        assert_eq!(reader.control().cursor(), cursor_after_first);

        reader.resume().expect("resume");
        assert_eq!(reader.state(), PlaybackState::Running);
        assert_eq!(reader.resume(), Err(PlaybackError::NotPaused));
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_pause_during_wait_does_not_advance() {
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        let _ready = next_render(&mut rx).await;
        reader.start(Some(1)).await.expect("start");
        let first = next_render(&mut rx).await;
        assert_eq!(first.word_start, 1);

        // Let the loop enter its 60s wait, then pause mid-wait
        sleep(Duration::from_millis(150)).await;
        reader.pause().expect("pause");
        let paused = next_render(&mut rx).await;
        assert_eq!(paused.status, PlaybackStatus::Paused);
        assert_eq!(paused.word_start, 1, "pause mid-wait must not advance");
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_stop_from_idle_is_a_noop() {
        let (mut reader, mut rx) = new_reader(250, 1);
        reader.load_document(sample_pages()).await;
        let _ready = next_render(&mut rx).await;

        reader.stop().await;
        assert_eq!(reader.state(), PlaybackState::Idle);
        assert_eq!(reader.control().cursor(), 0);
        assert_eq!(reader.status(), PlaybackStatus::Ready);

        reader.stop().await;
        assert_eq!(reader.state(), PlaybackState::Idle);
        assert_eq!(reader.control().cursor(), 0);
        assert_eq!(reader.status(), PlaybackStatus::Ready);
    }

    #[tokio::test]
    async fn test_start_page_out_of_range_parks_on_last_word() {
        let (mut reader, mut rx) = new_reader(250, 1);
        reader.load_document(sample_pages()).await;
        let _ready = next_render(&mut rx).await;

        assert_eq!(
            reader.start(Some(9)).await,
            Err(PlaybackError::PageOutOfRange {
                requested: 9,
                pages: 2
            })
        );
        assert_eq!(reader.state(), PlaybackState::Idle);
        assert_eq!(reader.control().cursor(), 3);

        let event = next_render(&mut rx).await;
        assert_eq!(event.status, PlaybackStatus::Ready);
        assert_eq!(event.word_start, 4);
    }

    #[tokio::test]
    async fn test_start_on_trailing_empty_page_reports_out_of_range() {
        let (mut reader, mut rx) = new_reader(250, 1);
        reader
            .load_document(vec![page(&["a", "b"]), page(&[])])
            .await;
        let _ready = next_render(&mut rx).await;

        // Page 2 exists but has no extracted words; its offset equals N
        assert_eq!(
            reader.start(Some(2)).await,
            Err(PlaybackError::PageOutOfRange {
                requested: 2,
                pages: 2
            })
        );
        assert_eq!(reader.control().cursor(), 1);
    }

    #[tokio::test]
    async fn test_restart_after_finish() {
        let (mut reader, mut rx) = new_reader(100_000, 4);
        reader.load_document(sample_pages()).await;
        let _ready = next_render(&mut rx).await;

        reader.start(Some(1)).await.expect("start");
        let _ = collect_renders_until(&mut rx, PlaybackStatus::Finished).await;
        assert_eq!(reader.status(), PlaybackStatus::Finished);

        // Starting again joins the finished loop and rewinds
        reader.start(Some(1)).await.expect("restart");
        let events = collect_renders_until(&mut rx, PlaybackStatus::Finished).await;
        assert_eq!(events[0].chunk, "The quick fox. jumped");
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_start_from_paused_joins_prior_loop() {
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");
        let _first = next_render(&mut rx).await;
        reader.pause().expect("pause");

        // Restart from page 2 while paused; the old loop must be joined
        reader.start(Some(2)).await.expect("restart from paused");
        assert_eq!(reader.state(), PlaybackState::Running);
        let event = next_render(&mut rx).await;
        // Drain the pause-time event if it arrived before the restart
        let event = if event.status == PlaybackStatus::Paused {
            next_render(&mut rx).await
        } else {
            event
        };
        assert_eq!(event.chunk, "fox.");
        assert_eq!(event.page, 2);
        reader.stop().await;
    }

    #[tokio::test]
    async fn test_live_wpm_change_applies_on_next_tick() {
        let (mut reader, mut rx) = new_reader(1, 1);
        reader.load_document(sample_pages()).await;
        reader.start(Some(1)).await.expect("start");
        let _first = next_render(&mut rx).await;

        // Drop the 60s-per-word pace to the floor while paused; the tick
        // after resume re-reads the live configuration
        reader.pause().expect("pause");
        let _paused = next_render(&mut rx).await;
        assert_eq!(reader.set_wpm(100_000), 100_000);
        reader.resume().expect("resume");

        let replay = next_render(&mut rx).await;
        assert_eq!(replay.word_start, 1);
        let advanced = next_render(&mut rx).await;
        assert_eq!(advanced.word_start, 2);
        reader.stop().await;
    }
}
