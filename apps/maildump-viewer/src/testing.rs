//! Fakes shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{RemoteCalls, RestCall};
use crate::dispatch::{PaneId, Prompter, Viewport};
use crate::notify::{Permission, StoredPermission, Toasts};
use crate::prefs::MemoryPreferences;
use crate::store::{Edge, MessageFormat, MessageId, MessageStore, MessageSummary, Recipients, Step};

/// Toasts behind a granted permission.
pub fn granted_toasts() -> Arc<Toasts> {
    let permission = StoredPermission::new(Arc::new(MemoryPreferences::default()), true)
        .pinned(Some(Permission::Granted));
    Arc::new(Toasts::new(Arc::new(permission)))
}

pub fn summary(id: MessageId, sender: &str, subject: &str) -> MessageSummary {
    MessageSummary {
        id,
        sender: sender.to_string(),
        recipients: Recipients::default(),
        subject: subject.to_string(),
        created_at: "2024-01-01 00:00:00".to_string(),
        size: 0,
    }
}

/// Answers confirms from a script (declining once it runs out) and records everything.
#[derive(Debug, Default, PartialEq)]
pub struct ScriptedUi {
    pub answers: VecDeque<bool>,
    pub confirms: Vec<String>,
    pub alerts: Vec<String>,
    pub label: Option<String>,
    pub search_focused: bool,
    pub message_pane_shown: usize,
    pub pane_tops: HashMap<PaneId, u16>,
    pub heights: Vec<(PaneId, u16)>,
}

impl ScriptedUi {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl Prompter for ScriptedUi {
    fn confirm(&mut self, text: &str) -> bool {
        self.confirms.push(text.to_string());
        self.answers.pop_front().unwrap_or(false)
    }

    fn alert(&mut self, text: &str) {
        self.alerts.push(text.to_string());
    }
}

impl Viewport for ScriptedUi {
    fn focus_search(&mut self) {
        self.search_focused = true;
    }

    fn show_message_pane(&mut self) {
        self.message_pane_shown += 1;
    }

    fn set_notification_label(&mut self, label: &str) {
        self.label = Some(label.to_string());
    }

    fn pane_top(&self, pane: PaneId) -> u16 {
        self.pane_tops.get(&pane).copied().unwrap_or(0)
    }

    fn set_pane_height(&mut self, pane: PaneId, height: u16) {
        self.heights.push((pane, height));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    LoadAll,
    Load(MessageId, bool),
    DeleteAll,
    Select(MessageId),
    Deselect,
    Delete(MessageId, bool),
    ApplyFilter(String),
    UpdateFormat(MessageFormat),
    CloseNotifications,
}

#[derive(Default)]
struct RecordingState {
    rows: Vec<MessageId>,
    selected: Option<MessageId>,
    calls: Vec<StoreCall>,
}

/// Unfiltered id list that logs every mutating call.
#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<RecordingState>,
}

impl RecordingStore {
    pub fn with_rows(rows: &[MessageId]) -> Self {
        Self {
            state: Mutex::new(RecordingState {
                rows: rows.to_vec(),
                ..RecordingState::default()
            }),
        }
    }

    pub fn take_calls(&self) -> Vec<StoreCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    pub fn selected_id(&self) -> Option<MessageId> {
        self.state.lock().selected
    }

    fn record(&self, call: StoreCall) {
        self.state.lock().calls.push(call);
    }
}

impl MessageStore for RecordingStore {
    fn load_all(&self) {
        self.record(StoreCall::LoadAll);
    }

    fn load(&self, id: MessageId, notify: bool) {
        self.record(StoreCall::Load(id, notify));
    }

    fn delete_all(&self) {
        let mut state = self.state.lock();
        state.rows.clear();
        state.selected = None;
        state.calls.push(StoreCall::DeleteAll);
    }

    fn get(&self, id: MessageId) -> Option<MessageSummary> {
        let state = self.state.lock();
        state
            .rows
            .contains(&id)
            .then(|| summary(id, "sender@example.com", "subject"))
    }

    fn selected(&self) -> Option<MessageId> {
        self.state.lock().selected
    }

    fn select(&self, id: MessageId) {
        let mut state = self.state.lock();
        if state.rows.contains(&id) {
            state.selected = Some(id);
        }
        state.calls.push(StoreCall::Select(id));
    }

    fn deselect(&self) {
        let mut state = self.state.lock();
        state.selected = None;
        state.calls.push(StoreCall::Deselect);
    }

    fn delete(&self, id: MessageId, remote: bool) {
        let mut state = self.state.lock();
        if !remote {
            state.rows.retain(|row| *row != id);
            if state.selected == Some(id) {
                state.selected = None;
            }
        }
        state.calls.push(StoreCall::Delete(id, remote));
    }

    fn apply_filter(&self, term: &str) {
        self.record(StoreCall::ApplyFilter(term.to_string()));
    }

    fn update_format(&self, format: MessageFormat) {
        self.record(StoreCall::UpdateFormat(format));
    }

    fn close_notifications(&self) {
        self.record(StoreCall::CloseNotifications);
    }

    fn edge_row(&self, edge: Edge) -> Option<MessageId> {
        let state = self.state.lock();
        match edge {
            Edge::First => state.rows.first().copied(),
            Edge::Last => state.rows.last().copied(),
        }
    }

    fn visible_neighbor(&self, id: MessageId, step: Step) -> Option<MessageId> {
        let state = self.state.lock();
        let index = state.rows.iter().position(|row| *row == id)?;
        match step {
            Step::Previous => index.checked_sub(1).map(|i| state.rows[i]),
            Step::Next => state.rows.get(index + 1).copied(),
        }
    }
}

#[derive(Default)]
pub struct RecordingRemote {
    calls: Mutex<Vec<RestCall>>,
}

impl RecordingRemote {
    pub fn calls(&self) -> Vec<RestCall> {
        self.calls.lock().clone()
    }
}

impl RemoteCalls for RecordingRemote {
    fn issue(&self, call: RestCall) {
        self.calls.lock().push(call);
    }
}
