// tools/flashread_cli/main.rs
//
// Terminal front end for the flashread engine. Renders the word display,
// progress gauge, and status bar with ratatui, and drives the engine purely
// through the session command surface - the same five operations any other
// renderer would use.
//
// Keys: Space start/pause/resume, Esc stop, Left/Right chunk step while
// paused, PgUp/PgDn page seek while paused, Up/Down wpm +/-10, +/- words
// per step, q quit.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc::UnboundedReceiver;

use flashread::{
    sessions, settings, ChannelSink, PlainTextExtractor, PlaybackStatus, RenderEvent, SinkMessage,
    TextExtractor,
};

const SESSION_ID: &str = "cli";
const WPM_STEP: u32 = 10;
const MIN_WPM: u32 = 50;
const MAX_WPM: u32 = 1000;
const MAX_WORDS_PER_STEP: usize = 10;

#[derive(Parser)]
#[command(
    name = "flashread",
    about = "RSVP reader for plain-text files (form feed starts a new page)"
)]
struct Args {
    /// Text file to read
    file: PathBuf,

    /// Words per minute (defaults to the saved setting)
    #[arg(long)]
    wpm: Option<u32>,

    /// Words shown per step, 1-10 (defaults to the saved setting)
    #[arg(long)]
    words_per_step: Option<usize>,

    /// Page to start reading from (1-based)
    #[arg(long, default_value_t = 1)]
    start_page: usize,

    /// Begin playback immediately
    #[arg(long)]
    autoplay: bool,

    /// Write engine logs to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

/// Everything the draw pass needs, updated from engine events and key input.
struct AppView {
    file_name: String,
    chunk: String,
    page: usize,
    pages: usize,
    total_words: usize,
    word_start: usize,
    word_end: usize,
    progress: f64,
    status: PlaybackStatus,
    preview_page: usize,
    wpm: u32,
    words_per_step: usize,
    /// Page the next start will begin from; follows the reading page
    start_page: usize,
    message: String,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("flashread: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let args = Args::parse();

    if let Some(ref dir) = args.log_dir {
        flashread::init_file_logging(dir)?;
    }

    let mut saved = settings::load_settings().unwrap_or_default();
    let wpm = args.wpm.unwrap_or(saved.wpm).clamp(MIN_WPM, MAX_WPM);
    let words_per_step = args
        .words_per_step
        .unwrap_or(saved.words_per_step)
        .clamp(1, MAX_WORDS_PER_STEP);

    let extractor = PlainTextExtractor::new(&args.file);
    let pages = extractor.extract_pages()?;

    let (sink, mut events) = ChannelSink::new();
    sessions::create_reader(SESSION_ID, sink, wpm, words_per_step).await?;
    let summary = sessions::load_document(SESSION_ID, pages).await?;
    if summary.words == 0 {
        sessions::destroy_reader(SESSION_ID).await.ok();
        return Err(format!(
            "No words extracted from {}",
            args.file.display()
        ));
    }

    let mut view = AppView {
        file_name: args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| args.file.display().to_string()),
        chunk: String::new(),
        page: 1,
        pages: summary.pages,
        total_words: summary.words,
        word_start: 0,
        word_end: 0,
        progress: 0.0,
        status: PlaybackStatus::Ready,
        preview_page: 1,
        wpm,
        words_per_step,
        start_page: args.start_page.clamp(1, summary.pages.max(1)),
        message: format!("Loaded {} words over {} pages", summary.words, summary.pages),
    };

    if args.autoplay {
        if let Err(e) = sessions::start_reading(SESSION_ID, Some(view.start_page)).await {
            view.message = e;
        }
    }

    enable_raw_mode().map_err(|e| format!("Failed to enable raw mode: {}", e))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)
        .map_err(|e| format!("Failed to enter alternate screen: {}", e))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal =
        Terminal::new(backend).map_err(|e| format!("Failed to create terminal: {}", e))?;

    let result = run_app(&mut terminal, &mut view, &mut events).await;

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    // Persist the values the user tuned during the run
    saved.wpm = view.wpm;
    saved.words_per_step = view.words_per_step;
    if let Some(parent) = args.file.parent() {
        if !parent.as_os_str().is_empty() {
            saved.last_directory = parent.to_string_lossy().to_string();
        }
    }
    settings::save_settings(&saved).ok();

    sessions::destroy_reader(SESSION_ID).await.ok();
    if args.log_dir.is_some() {
        flashread::stop_file_logging();
    }
    result
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    view: &mut AppView,
    events: &mut UnboundedReceiver<SinkMessage>,
) -> Result<(), String> {
    let mut keys = EventStream::new();

    loop {
        terminal
            .draw(|f| draw(f, view))
            .map_err(|e| format!("Draw failed: {}", e))?;

        tokio::select! {
            maybe_msg = events.recv() => {
                match maybe_msg {
                    Some(msg) => apply_engine_event(view, msg),
                    None => return Ok(()),
                }
            }
            maybe_key = keys.next() => {
                match maybe_key {
                    Some(Ok(Event::Key(key))) => {
                        if handle_key(key, view).await? {
                            return Ok(());
                        }
                    }
                    Some(Ok(_)) => {} // resize etc: redraw on next pass
                    Some(Err(e)) => return Err(format!("Terminal event error: {}", e)),
                    None => return Ok(()),
                }
            }
        }
    }
}

fn apply_engine_event(view: &mut AppView, msg: SinkMessage) {
    match msg.event.as_str() {
        "render-event" => {
            if let Ok(event) = serde_json::from_value::<RenderEvent>(msg.payload) {
                view.chunk = event.chunk;
                view.page = event.page;
                view.progress = event.progress;
                view.status = event.status;
                view.word_start = event.word_start;
                view.word_end = event.word_end;
                view.total_words = event.total_words;
                match event.status {
                    // The next start follows the reading page, back to the
                    // top once a read-through completes
                    PlaybackStatus::Running | PlaybackStatus::Paused => {
                        view.start_page = event.page;
                    }
                    PlaybackStatus::Finished => view.start_page = 1,
                    PlaybackStatus::Stopped => view.start_page = 1,
                    _ => {}
                }
            }
        }
        "preview-page" => {
            if let Some(page) = msg.payload.get("page").and_then(|p| p.as_u64()) {
                view.preview_page = page as usize;
            }
        }
        _ => {}
    }
}

/// Returns true when the app should quit.
async fn handle_key(key: KeyEvent, view: &mut AppView) -> Result<bool, String> {
    if key.kind != KeyEventKind::Press {
        return Ok(false);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }

    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char(' ') => {
            let action = match view.status {
                PlaybackStatus::Running => sessions::pause_reading(SESSION_ID).await,
                PlaybackStatus::Paused => sessions::resume_reading(SESSION_ID).await,
                _ => sessions::start_reading(SESSION_ID, Some(view.start_page)).await,
            };
            if let Err(e) = action {
                view.message = e;
            } else {
                view.message.clear();
            }
        }
        KeyCode::Esc => {
            sessions::stop_reading(SESSION_ID).await?;
            view.message.clear();
        }
        KeyCode::Left => {
            sessions::previous_chunk(SESSION_ID).await?;
        }
        KeyCode::Right => {
            sessions::next_chunk(SESSION_ID).await?;
        }
        KeyCode::PageUp => {
            let target = view.page.saturating_sub(1).max(1);
            sessions::seek_to_page(SESSION_ID, target).await?;
        }
        KeyCode::PageDown => {
            sessions::seek_to_page(SESSION_ID, view.page + 1).await?;
        }
        KeyCode::Up => {
            let target = view.wpm.saturating_add(WPM_STEP).min(MAX_WPM);
            view.wpm = sessions::set_wpm(SESSION_ID, target).await?;
        }
        KeyCode::Down => {
            let target = view.wpm.saturating_sub(WPM_STEP).max(MIN_WPM);
            view.wpm = sessions::set_wpm(SESSION_ID, target).await?;
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let target = (view.words_per_step + 1).min(MAX_WORDS_PER_STEP);
            view.words_per_step = sessions::set_chunk_size(SESSION_ID, target).await?;
        }
        KeyCode::Char('-') => {
            let target = view.words_per_step.saturating_sub(1).max(1);
            view.words_per_step = sessions::set_chunk_size(SESSION_ID, target).await?;
        }
        _ => {}
    }
    Ok(false)
}

fn draw(f: &mut Frame, view: &AppView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(f.area());

    // Word display: the chunk centred in a bordered pane
    let word_block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" flashread - {} ", view.file_name));
    let word_area = word_block.inner(rows[0]);
    f.render_widget(word_block, rows[0]);

    let centred = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(word_area);

    let display_text = match view.status {
        PlaybackStatus::Finished => "Done!".to_string(),
        PlaybackStatus::NoContent => "No text".to_string(),
        _ => view.chunk.clone(),
    };
    let word = Paragraph::new(display_text)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));
    f.render_widget(word, centred[1]);

    // Progress gauge with the word-range label
    let label = if view.total_words > 0 && view.word_start > 0 {
        format!(
            "Words {}-{}/{}",
            view.word_start, view.word_end, view.total_words
        )
    } else {
        format!("{} words", view.total_words)
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Blue))
        .ratio(view.progress.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, rows[1]);

    // Status and help lines
    let status_line = format!(
        " {} | {} wpm | {} words/step | reading page {}/{} | preview page {}{}{}",
        view.status,
        view.wpm,
        view.words_per_step,
        view.page,
        view.pages,
        view.preview_page,
        if view.message.is_empty() { "" } else { " | " },
        view.message
    );
    let help_line =
        " space start/pause | esc stop | arrows step/wpm | pgup/pgdn page | +/- words | q quit";
    let status = Paragraph::new(format!("{}\n{}", status_line, help_line))
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(status, rows[2]);
}
