//! TUI main loop and terminal management.
//!
//! The loop polls input at a fixed cadence, advances app state, and
//! repaints the whole screen inside a synchronized update: session
//! sidebar on the left, the active chat on the right, composer and
//! status line at the bottom.

use std::io::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        self, DisableBracketedPaste, DisableFocusChange, EnableBracketedPaste, EnableFocusChange,
        KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    style::Color,
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
        supports_keyboard_enhancement,
    },
};

use crate::ai::{AiService, HttpChatClient};
use crate::config::{Backend, Config};
use crate::history::{ChatHistory, HistoryState, LocalStore, RemoteStore};

use super::text::{StyledLine, StyledSpan, truncate_width};
use super::{App, Focus, chat, sidebar};

// ---------------------------------------------------------------------------
// Screen layout
// ---------------------------------------------------------------------------

/// Column and row assignments for one frame.
struct Layout {
    sidebar_width: u16,
    chat_x: u16,
    chat_width: u16,
    chat_height: u16,
    input_row: u16,
    status_row: u16,
}

#[allow(clippy::cast_possible_truncation)]
fn compute_layout(width: u16, height: u16) -> Layout {
    let sidebar_width = (width / 3).min(sidebar::SIDEBAR_WIDTH as u16);
    let chat_x = sidebar_width + 1;
    Layout {
        sidebar_width,
        chat_x,
        chat_width: width.saturating_sub(chat_x),
        chat_height: height.saturating_sub(3),
        input_row: height.saturating_sub(2),
        status_row: height.saturating_sub(1),
    }
}

/// Row where chat content starts when it hugs the composer.
fn bottom_anchor(area: usize, content: usize) -> usize {
    area.saturating_sub(content)
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Write logs to a file when `WALEBQUIT_LOG` is set; the terminal is
/// owned by the UI.
fn init_logging() {
    if std::env::var("WALEBQUIT_LOG").is_ok() {
        use std::fs::File;
        use tracing_subscriber::prelude::*;
        match File::create("walebquit.log") {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false);
                let filter = tracing_subscriber::EnvFilter::new("walebquit=debug");
                let _ = tracing_subscriber::registry()
                    .with(file_layer.with_filter(filter))
                    .try_init();
            }
            Err(err) => {
                eprintln!("Failed to create log file: {err}");
            }
        }
    } else if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

async fn build_history(config: &Config) -> Result<(ChatHistory, Option<Arc<RemoteStore>>)> {
    match config.history.backend {
        Backend::Local => {
            let path = config.sessions_db_path();
            let store = LocalStore::open(&path)
                .with_context(|| format!("failed to open chat history at {}", path.display()))?;
            let mut history = ChatHistory::new(Arc::new(store));
            history.start().await;
            Ok((history, None))
        }
        Backend::Remote => {
            let url = config
                .history
                .sync_url
                .as_deref()
                .context("history.sync_url must be set when history.backend is \"remote\"")?;
            let store = RemoteStore::connect(url, config.identity_path(), config.reconnect_delay());
            let history = ChatHistory::new(store.clone());
            Ok((history, Some(store)))
        }
    }
}

fn build_ai(config: &Config) -> Result<Arc<AiService>> {
    let api_key = config.api_key().context(
        "No API key configured. Set WALEBQUIT_API_KEY or run `walebquit config set api-key <key>`.",
    )?;
    let api = HttpChatClient::new(&config.ai.base_url, &api_key, config.ai.model.clone());
    Ok(Arc::new(AiService::new(Arc::new(api))))
}

// ---------------------------------------------------------------------------
// Terminal setup
// ---------------------------------------------------------------------------

/// Terminal state returned from setup.
struct TerminalState {
    stdout: io::Stdout,
    supports_enhancement: bool,
}

/// Setup terminal for TUI mode (raw mode, alternate screen, bracketed
/// paste, keyboard enhancement).
fn setup_terminal() -> Result<TerminalState> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        Hide,
        EnableBracketedPaste,
        EnableFocusChange
    )?;

    let supports_enhancement = supports_keyboard_enhancement().unwrap_or(false);
    if supports_enhancement {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )?;
    }

    Ok(TerminalState {
        stdout,
        supports_enhancement,
    })
}

fn cleanup_terminal(stdout: &mut io::Stdout, supports_enhancement: bool) -> Result<()> {
    // Ensure synchronized update mode is ended (safety net if an error
    // interrupted the main loop)
    let _ = execute!(stdout, EndSynchronizedUpdate);

    execute!(stdout, DisableBracketedPaste, DisableFocusChange)?;
    if supports_enhancement {
        execute!(stdout, PopKeyboardEnhancementFlags)?;
    }
    execute!(stdout, LeaveAlternateScreen, Show)?;
    disable_raw_mode()?;
    Ok(())
}

/// Guard that restores the original panic hook on drop.
struct PanicHookGuard {
    original_hook: std::sync::Arc<dyn Fn(&std::panic::PanicHookInfo) + Send + Sync + 'static>,
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        let original_hook = std::sync::Arc::clone(&self.original_hook);
        std::panic::set_hook(Box::new(move |info| {
            (original_hook)(info);
        }));
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn status_line(app: &App, max_width: usize) -> StyledLine {
    if let Some(text) = app.toast_text() {
        let clipped = truncate_width(&format!(" {text}"), max_width);
        return StyledLine::new(vec![StyledSpan::colored(clipped, Color::Yellow)]);
    }
    let hint = if app.quit_pending.is_some() {
        " press again to quit"
    } else if app.delete_pending.is_some() {
        " press d again to delete"
    } else {
        match app.focus {
            Focus::Input => " Enter send · Esc sessions · Ctrl+N new chat · Ctrl+C quit",
            Focus::Sidebar => " Enter open · n new chat · d d delete · Esc back",
        }
    };
    StyledLine::dim(truncate_width(hint, max_width))
}

/// Repaint the whole screen.
#[allow(clippy::cast_possible_truncation)]
fn draw(stdout: &mut io::Stdout, app: &mut App, width: u16, height: u16) -> io::Result<()> {
    if width < 24 || height < 6 {
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        return Ok(());
    }

    let layout = compute_layout(width, height);
    app.clamp_sidebar(sidebar::list_height(height as usize));

    let sidebar_lines = sidebar::build_sidebar_lines(
        app.history.sessions(),
        app.history.active_id(),
        app.sidebar_index,
        app.sidebar_offset,
        app.focus == Focus::Sidebar,
        layout.sidebar_width as usize,
        height as usize,
        Utc::now(),
    );

    let state = app.history.state();
    let chat_lines = match &state {
        HistoryState::Loading => vec![StyledLine::dim(" Loading sessions...")],
        HistoryState::NoSession => vec![
            StyledLine::dim(" No sessions."),
            StyledLine::empty(),
            StyledLine::dim(" Press Ctrl+N to start a new chat."),
        ],
        HistoryState::Active(_) => app
            .history
            .active_session()
            .map(|s| {
                chat::build_chat_lines(
                    s,
                    layout.chat_width as usize,
                    app.frame_count,
                    app.typewriter.as_ref(),
                )
            })
            .unwrap_or_default(),
    };

    let area = layout.chat_height as usize;
    let skip = chat_lines.len().saturating_sub(area);
    let shown = &chat_lines[skip..];
    let top = if matches!(state, HistoryState::Active(_)) {
        bottom_anchor(area, shown.len())
    } else {
        1.min(area)
    };

    execute!(stdout, BeginSynchronizedUpdate, Hide)?;

    for row in 0..height {
        execute!(stdout, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        if let Some(line) = sidebar_lines.get(row as usize) {
            line.write_to(stdout)?;
        }
        execute!(stdout, MoveTo(layout.sidebar_width, row))?;
        StyledSpan::dim("│").write_to(stdout)?;
    }

    for (i, line) in shown.iter().enumerate() {
        execute!(stdout, MoveTo(layout.chat_x, (top + i) as u16))?;
        line.write_to(stdout)?;
    }

    let input_width = (layout.chat_width as usize).saturating_sub(3);
    let (visible_text, cursor_col) = app.input.visible_window(input_width);
    execute!(stdout, MoveTo(layout.chat_x, layout.input_row))?;
    if app.focus == Focus::Input && !app.is_responding {
        StyledSpan::colored("> ", Color::Cyan).write_to(stdout)?;
        StyledSpan::raw(visible_text).write_to(stdout)?;
    } else {
        StyledSpan::dim("> ").write_to(stdout)?;
        StyledSpan::dim(visible_text).write_to(stdout)?;
    }

    execute!(stdout, MoveTo(layout.chat_x, layout.status_row))?;
    status_line(app, layout.chat_width as usize).write_to(stdout)?;

    if app.focus == Focus::Input {
        let cursor_x = layout.chat_x + 2 + cursor_col as u16;
        execute!(stdout, MoveTo(cursor_x, layout.input_row), Show)?;
    }

    execute!(stdout, EndSynchronizedUpdate)?;
    stdout.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Main entry point for the TUI.
///
/// Builds the history and AI clients from config, sets up the terminal,
/// and runs the poll/update/draw loop until the user quits.
pub async fn run(config: Config) -> Result<()> {
    init_logging();

    let (history, remote) = build_history(&config).await?;
    let ai = build_ai(&config)?;

    // Set panic hook to restore terminal on panic (guard restores the
    // original on exit)
    let original_hook: std::sync::Arc<dyn Fn(&std::panic::PanicHookInfo) + Send + Sync> =
        std::sync::Arc::from(std::panic::take_hook());
    let hook_for_panic = std::sync::Arc::clone(&original_hook);
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
        (hook_for_panic)(info);
    }));
    let _panic_guard = PanicHookGuard { original_hook };

    let TerminalState {
        mut stdout,
        supports_enhancement,
    } = setup_terminal()?;

    let mut app = App::new(history, ai);
    let (mut term_width, mut term_height) = terminal::size()?;

    loop {
        if event::poll(Duration::from_millis(50))? {
            let evt = event::read()?;
            if let event::Event::Resize(w, h) = evt {
                term_width = w;
                term_height = h;
            }
            app.handle_event(evt);
        }

        // Some terminals don't emit Resize on tab switches; re-check size
        // each frame.
        if let Ok((w, h)) = terminal::size()
            && (w != term_width || h != term_height)
        {
            term_width = w;
            term_height = h;
        }

        app.update();
        draw(&mut stdout, &mut app, term_width, term_height)?;

        if app.should_quit {
            break;
        }
    }

    cleanup_terminal(&mut stdout, supports_enhancement)?;
    if let Some(remote) = remote {
        remote.disconnect();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_partitions_width() {
        let layout = compute_layout(100, 30);
        assert_eq!(layout.sidebar_width, 26);
        assert_eq!(layout.chat_x, 27);
        assert_eq!(layout.chat_width, 73);
        assert_eq!(layout.chat_height, 27);
        assert_eq!(layout.input_row, 28);
        assert_eq!(layout.status_row, 29);
    }

    #[test]
    fn test_layout_narrow_terminal_shrinks_sidebar() {
        let layout = compute_layout(45, 20);
        assert_eq!(layout.sidebar_width, 15);
        assert_eq!(layout.chat_x, 16);
        assert_eq!(layout.chat_width, 29);
    }

    #[test]
    fn test_bottom_anchor() {
        assert_eq!(bottom_anchor(20, 5), 15);
        assert_eq!(bottom_anchor(20, 20), 0);
        // Overfull content pins to the top; the caller already trimmed it.
        assert_eq!(bottom_anchor(20, 25), 0);
    }
}
