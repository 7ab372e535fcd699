//! Terminal UI: a session sidebar next to the active chat, with a
//! single-line composer at the bottom.

mod chat;
mod events;
mod input_line;
mod markdown;
mod run;
mod sidebar;
mod text;

pub use run::run;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::ai::{AiError, AiService};
use crate::history::ChatHistory;

use input_line::InputState;

const TOAST_TTL: Duration = Duration::from_secs(4);

/// Outcome of a background AI task, delivered to the update loop.
enum ChatEvent {
    ReplyReady {
        session_id: String,
        message_id: String,
        result: Result<String, AiError>,
    },
    TitleReady {
        session_id: String,
        result: Result<String, AiError>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Input,
    Sidebar,
}

struct Toast {
    text: String,
    expires_at: Instant,
}

/// Progressive reveal of a finished reply. Cosmetic only, the cache
/// already holds the full text.
struct Typewriter {
    session_id: String,
    message_id: String,
    shown: usize,
    total: usize,
}

struct App {
    history: ChatHistory,
    ai: Arc<AiService>,
    focus: Focus,
    should_quit: bool,
    input: InputState,
    sidebar_index: usize,
    sidebar_offset: usize,
    is_responding: bool,
    frame_count: u64,
    toast: Option<Toast>,
    quit_pending: Option<Instant>,
    delete_pending: Option<Instant>,
    chat_tx: mpsc::UnboundedSender<ChatEvent>,
    chat_rx: mpsc::UnboundedReceiver<ChatEvent>,
    typewriter: Option<Typewriter>,
}

impl App {
    fn new(history: ChatHistory, ai: Arc<AiService>) -> Self {
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        Self {
            history,
            ai,
            focus: Focus::Input,
            should_quit: false,
            input: InputState::new(),
            sidebar_index: 0,
            sidebar_offset: 0,
            is_responding: false,
            frame_count: 0,
            toast: None,
            quit_pending: None,
            delete_pending: None,
            chat_tx,
            chat_rx,
            typewriter: None,
        }
    }

    fn set_toast(&mut self, text: impl Into<String>) {
        self.toast = Some(Toast {
            text: text.into(),
            expires_at: Instant::now() + TOAST_TTL,
        });
    }

    fn toast_text(&self) -> Option<&str> {
        self.toast.as_ref().map(|t| t.text.as_str())
    }
}
