//! Event handling and per-frame updates.

use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::history::{HistoryState, Message};

use super::{App, ChatEvent, Focus, Typewriter};

/// Window for the double-tap confirmations (quit, delete).
const CANCEL_WINDOW: Duration = Duration::from_millis(1500);

/// Characters revealed per frame while a reply types itself out.
const TYPEWRITER_STEP: usize = 3;

impl App {
    /// Main event dispatcher.
    pub(super) fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => match self.focus {
                Focus::Input => self.handle_input_key(key),
                Focus::Sidebar => self.handle_sidebar_key(key),
            },
            Event::Paste(text) => {
                if self.focus == Focus::Input {
                    for c in text.chars().filter(|c| !c.is_control()) {
                        self.input.insert_char(c);
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                self.toast = None;
                self.focus = Focus::Sidebar;
                self.sync_sidebar_cursor();
            }
            KeyCode::Enter => self.submit(),
            // Ctrl+C: clear input (single), quit (double when empty)
            KeyCode::Char('c') if ctrl => {
                if self.input.is_empty() {
                    self.arm_quit();
                } else {
                    self.input.clear();
                    self.quit_pending = None;
                }
            }
            // Ctrl+D: quit if input empty (double-tap, like Ctrl+C)
            KeyCode::Char('d') if ctrl => {
                if self.input.is_empty() {
                    self.arm_quit();
                }
            }
            KeyCode::Char('n') if ctrl => self.new_chat(),
            KeyCode::Char('a') if ctrl => self.input.move_to_start(),
            KeyCode::Char('e') if ctrl => self.input.move_to_end(),
            KeyCode::Char('u') if ctrl => self.input.delete_to_start(),
            KeyCode::Char('k') if ctrl => self.input.delete_to_end(),
            KeyCode::Char('w') if ctrl => self.input.delete_word_before(),
            KeyCode::Char(c) if !ctrl => self.input.insert_char(c),
            KeyCode::Backspace => self.input.delete_char_before(),
            KeyCode::Delete => self.input.delete_char_after(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_to_start(),
            KeyCode::End => self.input.move_to_end(),
            _ => {}
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                self.toast = None;
                self.focus = Focus::Input;
                self.delete_pending = None;
            }
            KeyCode::Up => {
                self.sidebar_index = self.sidebar_index.saturating_sub(1);
                self.delete_pending = None;
            }
            KeyCode::Down => {
                let len = self.history.sessions().len();
                if self.sidebar_index + 1 < len {
                    self.sidebar_index += 1;
                }
                self.delete_pending = None;
            }
            KeyCode::Enter => {
                let selected = self
                    .history
                    .sessions()
                    .get(self.sidebar_index)
                    .map(|s| s.id.clone());
                if let Some(id) = selected {
                    self.history.set_active_session(&id);
                    self.focus = Focus::Input;
                }
                self.delete_pending = None;
            }
            KeyCode::Char('n') => self.new_chat(),
            // d (or Delete) twice deletes the session under the cursor.
            KeyCode::Char('d') | KeyCode::Delete if !ctrl => {
                if let Some(when) = self.delete_pending
                    && when.elapsed() <= CANCEL_WINDOW
                {
                    self.delete_pending = None;
                    self.delete_selected();
                } else {
                    self.delete_pending = Some(Instant::now());
                }
            }
            KeyCode::Char('c' | 'd') if ctrl => self.arm_quit(),
            _ => {}
        }
    }

    fn arm_quit(&mut self) {
        if let Some(when) = self.quit_pending
            && when.elapsed() <= CANCEL_WINDOW
        {
            self.should_quit = true;
            self.quit_pending = None;
        } else {
            self.quit_pending = Some(Instant::now());
        }
    }

    fn new_chat(&mut self) {
        self.history.start_new_session();
        self.sidebar_index = 0;
        self.sidebar_offset = 0;
        self.focus = Focus::Input;
        self.delete_pending = None;
    }

    fn delete_selected(&mut self) {
        let Some(id) = self
            .history
            .sessions()
            .get(self.sidebar_index)
            .map(|s| s.id.clone())
        else {
            return;
        };
        self.history.delete_session(&id);
        let len = self.history.sessions().len();
        self.sidebar_index = self.sidebar_index.min(len.saturating_sub(1));
    }

    /// Point the sidebar cursor at the active session.
    fn sync_sidebar_cursor(&mut self) {
        if let Some(active) = self.history.active_id()
            && let Some(pos) = self.history.sessions().iter().position(|s| s.id == active)
        {
            self.sidebar_index = pos;
        }
    }

    /// Send the composed prompt: append the user message and a pending
    /// placeholder, then hand the reply to a background task. The history
    /// snapshot is taken before the new turn so the prompt is not doubled
    /// into it.
    fn submit(&mut self) {
        if self.is_responding || self.input.is_blank() {
            return;
        }
        let HistoryState::Active(session_id) = self.history.state() else {
            return;
        };

        let prompt = self.input.take().trim().to_string();
        let snapshot: Vec<Message> = self
            .history
            .session(&session_id)
            .map(|s| {
                s.messages
                    .iter()
                    .filter(|m| !m.is_pending())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        self.history
            .add_message(&session_id, Message::user(prompt.clone()));
        let pending = Message::pending();
        let pending_id = pending.id.clone();
        self.history.add_message(&session_id, pending);
        self.is_responding = true;

        let first_turn = self
            .history
            .session(&session_id)
            .is_some_and(|s| s.user_turns() == 1);

        let ai = self.ai.clone();
        let tx = self.chat_tx.clone();
        let reply_session = session_id.clone();
        let reply_prompt = prompt.clone();
        tokio::spawn(async move {
            let result = ai.respond(&reply_prompt, &snapshot).await;
            let _ = tx.send(ChatEvent::ReplyReady {
                session_id: reply_session,
                message_id: pending_id,
                result,
            });
        });

        if first_turn {
            let ai = self.ai.clone();
            let tx = self.chat_tx.clone();
            tokio::spawn(async move {
                let result = ai.generate_title(&prompt).await;
                let _ = tx.send(ChatEvent::TitleReady { session_id, result });
            });
        }
    }

    /// Per-frame update: absorb store changes, then finished AI tasks,
    /// then advance the cosmetic timers.
    pub(super) fn update(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
        self.history.pump();

        while let Ok(event) = self.chat_rx.try_recv() {
            match event {
                ChatEvent::ReplyReady {
                    session_id,
                    message_id,
                    result,
                } => {
                    self.is_responding = false;
                    match result {
                        Ok(reply) => {
                            let total = reply.chars().count();
                            self.history.update_message(&session_id, &message_id, reply);
                            self.typewriter = Some(Typewriter {
                                session_id,
                                message_id,
                                shown: 0,
                                total,
                            });
                        }
                        // A failed request retracts the placeholder; the
                        // error text goes to the status line instead.
                        Err(e) => {
                            debug!("reply failed: {e}");
                            self.history.remove_message(&session_id, &message_id);
                            self.set_toast(e.user_message());
                        }
                    }
                }
                ChatEvent::TitleReady { session_id, result } => match result {
                    Ok(title) if !title.is_empty() => {
                        self.history.update_title(&session_id, title);
                    }
                    Ok(_) => self.set_toast("Could not generate chat title."),
                    Err(e) => {
                        debug!("title generation failed: {e}");
                        self.set_toast("Could not generate chat title.");
                    }
                },
            }
        }

        if let Some(tw) = &mut self.typewriter {
            tw.shown = (tw.shown + TYPEWRITER_STEP).min(tw.total);
            if tw.shown >= tw.total {
                self.typewriter = None;
            }
        }

        if self
            .toast
            .as_ref()
            .is_some_and(|t| Instant::now() >= t.expires_at)
        {
            self.toast = None;
        }
        if let Some(when) = self.quit_pending
            && when.elapsed() > CANCEL_WINDOW
        {
            self.quit_pending = None;
        }
        if let Some(when) = self.delete_pending
            && when.elapsed() > CANCEL_WINDOW
        {
            self.delete_pending = None;
        }
    }

    /// Keep the sidebar cursor in range and scrolled into view.
    pub(super) fn clamp_sidebar(&mut self, visible: usize) {
        let len = self.history.sessions().len();
        if len == 0 {
            self.sidebar_index = 0;
            self.sidebar_offset = 0;
            return;
        }
        self.sidebar_index = self.sidebar_index.min(len - 1);
        if visible == 0 {
            return;
        }
        if self.sidebar_index < self.sidebar_offset {
            self.sidebar_offset = self.sidebar_index;
        } else if self.sidebar_index >= self.sidebar_offset + visible {
            self.sidebar_offset = self.sidebar_index + 1 - visible;
        }
        self.sidebar_offset = self.sidebar_offset.min(len - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::ai::{AiError, AiService, ChatApi};
    use crate::history::{ChatHistory, DEFAULT_TITLE, LocalStore, PENDING_CONTENT};

    const TITLE_PROMPT_PREFIX: &str = "Generate a short, concise title";

    /// Scripted model: fixed reply, counts title requests. Reply and
    /// title failures are independent so toast assertions stay
    /// deterministic.
    struct StubApi {
        reply: String,
        fail_reply: bool,
        fail_title: bool,
        title_calls: AtomicUsize,
    }

    impl StubApi {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                fail_reply: false,
                fail_title: false,
                title_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: String::new(),
                fail_reply: true,
                fail_title: false,
                title_calls: AtomicUsize::new(0),
            }
        }

        fn failing_titles(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                fail_reply: false,
                fail_title: true,
                title_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatApi for StubApi {
        async fn complete(
            &self,
            prompt: &str,
            _temperature: Option<f32>,
        ) -> Result<String, AiError> {
            if prompt.starts_with(TITLE_PROMPT_PREFIX) {
                self.title_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_title {
                    return Err(AiError::Api("title model down".to_string()));
                }
                return Ok("Test Title".to_string());
            }
            if self.fail_reply {
                return Err(AiError::Api("model down".to_string()));
            }
            Ok(self.reply.clone())
        }
    }

    async fn test_app(api: Arc<StubApi>) -> (App, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(&dir.path().join("sessions.db")).unwrap();
        let mut history = ChatHistory::new(Arc::new(store));
        history.start().await;
        let app = App::new(history, Arc::new(AiService::new(api)));
        (app, dir)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn ctrl_key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_event(key(KeyCode::Char(c)));
        }
    }

    /// Run update frames until the condition holds.
    async fn settle(app: &mut App, mut done: impl FnMut(&App) -> bool) {
        for _ in 0..400 {
            app.update();
            if done(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("app never reached the expected state");
    }

    #[tokio::test]
    async fn test_submit_appends_turn_and_resolves_reply() {
        let api = Arc::new(StubApi::replying("certainly"));
        let (mut app, _dir) = test_app(api).await;

        type_text(&mut app, "hello");
        app.handle_event(key(KeyCode::Enter));

        assert!(app.is_responding);
        assert!(app.input.is_empty());
        let session = app.history.active_session().unwrap();
        // greeting, user prompt, pending placeholder
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[1].content, "hello");
        assert_eq!(session.messages[2].content, PENDING_CONTENT);

        settle(&mut app, |a| !a.is_responding).await;

        let session = app.history.active_session().unwrap();
        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[2].content, "certainly");
        assert!(app.typewriter.is_some());
    }

    #[tokio::test]
    async fn test_failed_reply_retracts_placeholder_and_toasts() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::failing())).await;

        type_text(&mut app, "hello");
        app.handle_event(key(KeyCode::Enter));
        settle(&mut app, |a| !a.is_responding).await;

        // The user turn stays, the placeholder is gone.
        let session = app.history.active_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].content, "hello");
        assert!(!session.messages.iter().any(Message::is_pending));
        assert_eq!(
            app.toast_text(),
            Some("Sorry, I couldn't process that. Error: model down")
        );
    }

    #[tokio::test]
    async fn test_first_turn_generates_title_once() {
        let api = Arc::new(StubApi::replying("ok"));
        let (mut app, _dir) = test_app(api.clone()).await;

        type_text(&mut app, "explain generics");
        app.handle_event(key(KeyCode::Enter));
        settle(&mut app, |a| {
            a.history.active_session().is_some_and(|s| s.title != DEFAULT_TITLE)
        })
        .await;

        assert_eq!(app.history.active_session().unwrap().title, "Test Title");

        // A second turn does not retitle.
        type_text(&mut app, "more");
        app.handle_event(key(KeyCode::Enter));
        settle(&mut app, |a| !a.is_responding).await;
        assert_eq!(api.title_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_title_failure_sets_toast() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::failing_titles("ok"))).await;

        type_text(&mut app, "hello");
        app.handle_event(key(KeyCode::Enter));
        settle(&mut app, |a| a.toast_text().is_some()).await;

        assert_eq!(app.toast_text(), Some("Could not generate chat title."));
        assert_eq!(
            app.history.active_session().unwrap().title,
            DEFAULT_TITLE
        );
    }

    #[tokio::test]
    async fn test_esc_dismisses_toast() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        app.set_toast("something went wrong");
        assert!(app.toast_text().is_some());

        app.handle_event(key(KeyCode::Esc));
        assert_eq!(app.toast_text(), None);
    }

    #[tokio::test]
    async fn test_blank_input_is_not_submitted() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        type_text(&mut app, "   ");
        app.handle_event(key(KeyCode::Enter));

        assert!(!app.is_responding);
        assert_eq!(app.history.active_session().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_ctrl_c_clears_then_quits_on_double_tap() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        type_text(&mut app, "draft");
        app.handle_event(ctrl_key('c'));
        assert!(app.input.is_empty());
        assert!(!app.should_quit);

        app.handle_event(ctrl_key('c'));
        assert!(!app.should_quit);
        app.handle_event(ctrl_key('c'));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_esc_moves_focus_to_sidebar_and_back() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        assert_eq!(app.focus, Focus::Input);
        app.handle_event(key(KeyCode::Esc));
        assert_eq!(app.focus, Focus::Sidebar);
        app.handle_event(key(KeyCode::Esc));
        assert_eq!(app.focus, Focus::Input);
    }

    #[tokio::test]
    async fn test_sidebar_selects_session() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        let first = app.history.active_id().unwrap().to_string();
        let second = app.history.start_new_session();
        assert_eq!(app.history.active_id(), Some(second.as_str()));

        // The older session sits below the new one.
        app.handle_event(key(KeyCode::Esc));
        app.handle_event(key(KeyCode::Down));
        app.handle_event(key(KeyCode::Enter));

        assert_eq!(app.history.active_id(), Some(first.as_str()));
        assert_eq!(app.focus, Focus::Input);
    }

    #[tokio::test]
    async fn test_delete_requires_double_press() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;

        let original = app.history.active_id().unwrap().to_string();
        app.handle_event(key(KeyCode::Esc));
        app.handle_event(key(KeyCode::Char('d')));
        assert_eq!(app.history.sessions().len(), 1);
        assert_eq!(app.history.active_id(), Some(original.as_str()));

        // Delete confirms through the same window as d.
        app.handle_event(key(KeyCode::Delete));
        // Deleting the last session reseeds a fresh one.
        assert_eq!(app.history.sessions().len(), 1);
        assert_ne!(app.history.active_id(), Some(original.as_str()));
    }

    #[tokio::test]
    async fn test_clamp_sidebar_scrolls_cursor_into_view() {
        let (mut app, _dir) = test_app(Arc::new(StubApi::replying("ok"))).await;
        for _ in 0..9 {
            app.history.start_new_session();
        }
        assert_eq!(app.history.sessions().len(), 10);

        app.sidebar_index = 7;
        app.clamp_sidebar(3);
        assert_eq!(app.sidebar_offset, 5);

        app.sidebar_index = 2;
        app.clamp_sidebar(3);
        assert_eq!(app.sidebar_offset, 2);
    }
}
