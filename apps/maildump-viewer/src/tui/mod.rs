//! Terminal front end: a blocking crossterm/ratatui loop that turns terminal
//! events into dispatcher intents and draws the store's snapshot.

mod input;
mod render;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::Terminal;
use tracing::{debug, warn};

pub use input::{key_combo, map_event, modal_answer, SearchEdit, UiAction, LIST_HANDLE};
pub use render::{draw, Hit, Modal, ViewModel, ViewState};

use crate::dispatch::{ActionDispatcher, Intent, PaneId, Prompter, Viewport};
use crate::error::ViewerError;
use crate::notify::Toasts;
use crate::session::SessionFlags;
use crate::store::RemoteMessageStore;

const TICK: Duration = Duration::from_millis(100);

/// Raw mode, alternate screen and mouse capture for as long as it lives.
pub struct TerminalGuard(());

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self(());
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub trait InputSource {
    /// Waits up to `timeout` for the next terminal event.
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<Event>>;
}

pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn next_event(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        if event::poll(timeout)? {
            Ok(Some(event::read()?))
        } else {
            Ok(None)
        }
    }
}

pub trait ViewSource {
    fn view(&self) -> ViewModel;
}

impl ViewSource for ViewModel {
    fn view(&self) -> ViewModel {
        self.clone()
    }
}

/// Reads the shared store, flags and toasts on every frame.
pub struct LiveView {
    store: RemoteMessageStore,
    flags: Arc<SessionFlags>,
    toasts: Arc<Toasts>,
    notifications_available: bool,
}

impl LiveView {
    pub fn new(
        store: RemoteMessageStore,
        flags: Arc<SessionFlags>,
        toasts: Arc<Toasts>,
        notifications_available: bool,
    ) -> Self {
        Self {
            store,
            flags,
            toasts,
            notifications_available,
        }
    }
}

impl ViewSource for LiveView {
    fn view(&self) -> ViewModel {
        ViewModel {
            snapshot: self.store.snapshot(),
            disconnected: self.flags.is_disconnected(),
            notifications_available: self.notifications_available,
            toast: self.toasts.latest(),
        }
    }
}

pub struct TerminalUi<B: Backend> {
    terminal: Terminal<B>,
    input: Box<dyn InputSource>,
    source: Box<dyn ViewSource>,
    state: ViewState,
}

impl TerminalUi<CrosstermBackend<Stdout>> {
    /// Draws on stdout. Enter a [`TerminalGuard`] first.
    pub fn stdout(source: Box<dyn ViewSource>) -> io::Result<Self> {
        Self::new(CrosstermBackend::new(io::stdout()), Box::new(CrosstermInput), source)
    }
}

impl<B: Backend> TerminalUi<B> {
    pub fn new(backend: B, input: Box<dyn InputSource>, source: Box<dyn ViewSource>) -> io::Result<Self> {
        Ok(Self {
            terminal: Terminal::new(backend)?,
            input,
            source,
            state: ViewState::default(),
        })
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    pub fn draw(&mut self) -> io::Result<()> {
        let view = self.source.view();
        let state = &mut self.state;
        self.terminal.draw(|frame| render::draw(frame, &view, state))?;
        Ok(())
    }

    fn next_event(&mut self) -> io::Result<Option<Event>> {
        self.input.next_event(TICK)
    }

    /// Blocks until the modal is answered. Terminal failures count as a decline.
    fn modal(&mut self, modal: Modal) -> bool {
        self.state.modal = Some(modal.clone());
        let answer = loop {
            if let Err(err) = self.draw() {
                warn!(target = "viewer::tui", error = %err, "failed to draw modal");
                break false;
            }
            match self.next_event() {
                Ok(Some(event)) => {
                    if let Some(answer) = modal_answer(&event, &modal) {
                        break answer;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(target = "viewer::tui", error = %err, "failed to read terminal input");
                    break false;
                }
            }
        };
        self.state.modal = None;
        answer
    }

    fn edit_search(&mut self, edit: SearchEdit) {
        match edit {
            SearchEdit::Insert(c) => self.state.search.push(c),
            SearchEdit::Backspace => {
                self.state.search.pop();
            }
        }
    }
}

impl<B: Backend> Prompter for TerminalUi<B> {
    fn confirm(&mut self, text: &str) -> bool {
        self.modal(Modal::Confirm(text.to_string()))
    }

    fn alert(&mut self, text: &str) {
        self.modal(Modal::Alert(text.to_string()));
    }
}

impl<B: Backend> Viewport for TerminalUi<B> {
    fn focus_search(&mut self) {
        self.state.search_focused = true;
    }

    fn show_message_pane(&mut self) {
        self.state.message_pane_visible = true;
    }

    fn set_notification_label(&mut self, label: &str) {
        self.state.notification_label = label.to_string();
    }

    fn pane_top(&self, pane: PaneId) -> u16 {
        self.state.pane_top(pane)
    }

    fn set_pane_height(&mut self, pane: PaneId, height: u16) {
        match pane {
            PaneId::MessageList => self.state.list_height = Some(height),
            PaneId::MessageBody => self.state.body_height = Some(height),
        }
    }
}

/// Runs until the user leaves. The dispatcher sees `Unload` exactly once on the way out.
pub fn run<B: Backend>(ui: &mut TerminalUi<B>, dispatcher: &mut ActionDispatcher) -> Result<(), ViewerError> {
    ui.set_notification_label(dispatcher.notification_label());
    let outcome = event_loop(ui, dispatcher);
    dispatcher.dispatch(Intent::Unload, ui);
    outcome
}

fn event_loop<B: Backend>(ui: &mut TerminalUi<B>, dispatcher: &mut ActionDispatcher) -> Result<(), ViewerError> {
    loop {
        ui.draw()?;
        let Some(event) = ui.next_event()? else {
            continue;
        };
        match map_event(&event, ui.state()) {
            UiAction::Intent(intent) => {
                dispatcher.dispatch(intent, ui);
            }
            UiAction::FocusSearch => ui.focus_search(),
            UiAction::BlurSearch => ui.state.search_focused = false,
            UiAction::EditSearch(edit) => {
                ui.edit_search(edit);
                let term = ui.state.search.clone();
                dispatcher.dispatch(Intent::Search(term), ui);
            }
            UiAction::Exit => {
                debug!(target = "viewer::tui", "leaving viewer");
                return Ok(());
            }
            UiAction::Ignore => {}
        }
    }
}
