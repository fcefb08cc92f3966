//! Translates user intents into store calls, remote calls or local view changes.

mod hotkeys;
mod resize;

use std::sync::Arc;

use mailbox_live::LiveHandle;
use tracing::{debug, trace, warn};

pub use hotkeys::{HotkeyMap, Key, KeyCombo, KeyParseError};
pub use resize::{PaneId, PaneResizer, PointerButton, ResizeHandle, Sibling};

use crate::api::{RemoteCalls, RestCall};
use crate::notify::{effective_enabled, toggle_label, NotificationPermission, Permission};
use crate::prefs::{get_bool, set_bool, PreferenceStore, NOTIFICATIONS_KEY};
use crate::session::SessionFlags;
use crate::store::{Edge, MessageFormat, MessageId, MessageStore, Step};

pub const TERMINATE_PROMPT: &str = "Do you really want to terminate the MailDump application?";
pub const CLEAR_PROMPT: &str = "Do you really want to delete all messages?";
pub const PERMISSION_DENIED_ALERT: &str = "You need to allow notifications via site permissions.";

/// Blocking modals.
pub trait Prompter {
    fn confirm(&mut self, text: &str) -> bool;
    fn alert(&mut self, text: &str);
}

/// View state the dispatcher adjusts directly.
pub trait Viewport {
    fn focus_search(&mut self);
    fn show_message_pane(&mut self);
    fn set_notification_label(&mut self, label: &str);
    fn pane_top(&self, pane: PaneId) -> u16;
    fn set_pane_height(&mut self, pane: PaneId, height: u16);
}

pub trait ViewerUi: Prompter + Viewport {
    fn prompter(&mut self) -> &mut dyn Prompter;
    fn viewport(&mut self) -> &mut dyn Viewport;
}

impl<T: Prompter + Viewport> ViewerUi for T {
    fn prompter(&mut self) -> &mut dyn Prompter {
        self
    }

    fn viewport(&mut self) -> &mut dyn Viewport {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Quit button: stop the maildump server.
    Terminate,
    /// Clear button: delete every message on the server.
    ClearAll,
    /// Delete action of the message pane.
    DeleteSelected,
    ToggleNotifications,
    /// Current contents of the search input.
    Search(String),
    SelectFormat(MessageFormat),
    RowClick { id: MessageId, ctrl: bool },
    Key(KeyCombo),
    PointerDown { handle: ResizeHandle, button: PointerButton },
    PointerMove { y: u16 },
    PointerUp,
    /// The viewer is going away.
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    DeleteSelected,
    /// Swallowed so it never reaches anything else.
    Suppress,
    CloseNotifications,
    Previous,
    Next,
    First,
    Last,
    FocusSearch,
}

pub const DEFAULT_BINDINGS: &[(&str, HotkeyAction)] = &[
    ("del", HotkeyAction::DeleteSelected),
    ("backspace", HotkeyAction::Suppress),
    ("f5", HotkeyAction::CloseNotifications),
    ("ctrl+f5", HotkeyAction::CloseNotifications),
    ("ctrl+r", HotkeyAction::CloseNotifications),
    ("up", HotkeyAction::Previous),
    ("down", HotkeyAction::Next),
    ("ctrl+up", HotkeyAction::First),
    ("ctrl+down", HotkeyAction::Last),
    ("/", HotkeyAction::FocusSearch),
];

/// Default bindings, live only while the viewer is online.
pub fn default_hotkeys(flags: Arc<SessionFlags>) -> Result<HotkeyMap<HotkeyAction>, KeyParseError> {
    DEFAULT_BINDINGS
        .iter()
        .try_fold(HotkeyMap::new(move || flags.is_online()), |map, (spec, action)| {
            map.bind(spec, *action)
        })
}

pub struct Collaborators {
    pub store: Arc<dyn MessageStore>,
    pub remote: Arc<dyn RemoteCalls>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub permission: Arc<dyn NotificationPermission>,
    pub flags: Arc<SessionFlags>,
}

pub struct ActionDispatcher {
    store: Arc<dyn MessageStore>,
    remote: Arc<dyn RemoteCalls>,
    prefs: Arc<dyn PreferenceStore>,
    permission: Arc<dyn NotificationPermission>,
    flags: Arc<SessionFlags>,
    live: Option<LiveHandle>,
    hotkeys: HotkeyMap<HotkeyAction>,
    resizer: PaneResizer,
}

impl ActionDispatcher {
    pub fn new(collaborators: Collaborators) -> Result<Self, KeyParseError> {
        let Collaborators {
            store,
            remote,
            prefs,
            permission,
            flags,
        } = collaborators;
        let hotkeys = default_hotkeys(flags.clone())?;
        Ok(Self {
            store,
            remote,
            prefs,
            permission,
            flags,
            live: None,
            hotkeys,
            resizer: PaneResizer::default(),
        })
    }

    /// Live channel closed on unload.
    pub fn with_live(mut self, live: LiveHandle) -> Self {
        self.live = Some(live);
        self
    }

    pub fn notifications_available(&self) -> bool {
        self.permission.available()
    }

    pub fn notifications_enabled(&self) -> bool {
        effective_enabled(self.prefs.as_ref(), self.permission.as_ref())
    }

    pub fn notification_label(&self) -> &'static str {
        toggle_label(self.notifications_enabled())
    }

    pub fn is_dragging(&self) -> bool {
        self.resizer.dragging().is_some()
    }

    /// Returns whether the intent was consumed. Only hotkeys can go unconsumed.
    pub fn dispatch(&mut self, intent: Intent, ui: &mut dyn ViewerUi) -> bool {
        trace!(target = "viewer::dispatch", intent = ?intent, "dispatch");
        match intent {
            Intent::Terminate => {
                self.confirmed_call(ui.prompter(), TERMINATE_PROMPT, RestCall::Terminate);
                true
            }
            Intent::ClearAll => {
                self.confirmed_call(ui.prompter(), CLEAR_PROMPT, RestCall::ClearMessages);
                true
            }
            Intent::DeleteSelected => {
                self.delete_selected();
                true
            }
            Intent::ToggleNotifications => {
                self.toggle_notifications(ui);
                true
            }
            Intent::Search(input) => {
                self.store.apply_filter(&input.trim().to_lowercase());
                true
            }
            Intent::SelectFormat(format) => {
                if self.store.selected().is_some() {
                    self.store.update_format(format);
                }
                true
            }
            Intent::RowClick { id, ctrl } => {
                self.click_row(id, ctrl, ui.viewport());
                true
            }
            Intent::Key(combo) => self.hotkey(&combo, ui.viewport()),
            Intent::PointerDown { handle, button } => self.resizer.pointer_down(&handle, button),
            Intent::PointerMove { y } => self.resizer.pointer_move(y, ui.viewport()),
            Intent::PointerUp => self.resizer.pointer_up(),
            Intent::Unload => {
                self.unload();
                true
            }
        }
    }

    fn confirmed_call(&self, prompter: &mut dyn Prompter, prompt: &str, call: RestCall) {
        if !prompter.confirm(prompt) {
            debug!(target = "viewer::dispatch", call = ?call, "declined");
            return;
        }
        self.remote.issue(call);
    }

    fn delete_selected(&self) {
        if let Some(id) = self.store.selected() {
            self.store.delete(id, true);
        }
    }

    fn click_row(&self, id: MessageId, ctrl: bool, viewport: &mut dyn Viewport) {
        if ctrl {
            if self.store.selected().is_some() {
                self.store.deselect();
            }
            return;
        }
        if self.store.get(id).is_some() && self.store.selected() != Some(id) {
            self.store.select(id);
            viewport.show_message_pane();
        }
    }

    fn hotkey(&self, combo: &KeyCombo, viewport: &mut dyn Viewport) -> bool {
        let Some(action) = self.hotkeys.resolve(combo).copied() else {
            if self.hotkeys.is_bound(combo) {
                debug!(target = "viewer::dispatch", key = %combo, "hotkey ignored while offline");
            }
            return false;
        };
        match action {
            HotkeyAction::DeleteSelected => self.delete_selected(),
            HotkeyAction::Suppress => {}
            HotkeyAction::CloseNotifications => self.store.close_notifications(),
            HotkeyAction::Previous => self.step(Step::Previous, Edge::Last, viewport),
            HotkeyAction::Next => self.step(Step::Next, Edge::First, viewport),
            HotkeyAction::First => self.click_edge(Edge::First, viewport),
            HotkeyAction::Last => self.click_edge(Edge::Last, viewport),
            HotkeyAction::FocusSearch => viewport.focus_search(),
        }
        true
    }

    /// Moves to the neighbouring row, or to `fallback` when nothing is selected.
    fn step(&self, step: Step, fallback: Edge, viewport: &mut dyn Viewport) {
        let target = match self.store.selected() {
            Some(id) => self.store.visible_neighbor(id, step),
            None => self.store.edge_row(fallback),
        };
        if let Some(id) = target {
            self.click_row(id, false, viewport);
        }
    }

    fn click_edge(&self, edge: Edge, viewport: &mut dyn Viewport) {
        if let Some(id) = self.store.edge_row(edge) {
            self.click_row(id, false, viewport);
        }
    }

    fn toggle_notifications(&self, ui: &mut dyn ViewerUi) {
        if !self.permission.available() {
            return;
        }
        let enabled = match self.permission.check() {
            Permission::Denied => {
                ui.prompter().alert(PERMISSION_DENIED_ALERT);
                return;
            }
            Permission::Granted => !get_bool(self.prefs.as_ref(), NOTIFICATIONS_KEY),
            Permission::Default => self.permission.request(ui.prompter()),
        };
        if let Err(err) = set_bool(self.prefs.as_ref(), NOTIFICATIONS_KEY, enabled) {
            warn!(target = "viewer::dispatch", error = %err, "failed to store notification preference");
        }
        ui.viewport().set_notification_label(self.notification_label());
    }

    fn unload(&self) {
        self.flags.mark_terminating();
        if let Some(live) = &self.live {
            live.shutdown();
        }
        self.store.close_notifications();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{StoredPermission, DISABLE_LABEL, ENABLE_LABEL, PERMISSION_PROMPT};
    use crate::prefs::MemoryPreferences;
    use crate::testing::{RecordingRemote, RecordingStore, ScriptedUi, StoreCall};

    struct Fixture {
        store: Arc<RecordingStore>,
        remote: Arc<RecordingRemote>,
        prefs: Arc<MemoryPreferences>,
        flags: Arc<SessionFlags>,
        dispatcher: ActionDispatcher,
    }

    fn fixture(rows: &[MessageId], permission: Option<Permission>) -> Fixture {
        let store = Arc::new(RecordingStore::with_rows(rows));
        let remote = Arc::new(RecordingRemote::default());
        let prefs = Arc::new(MemoryPreferences::default());
        let flags = Arc::new(SessionFlags::new());
        let permission = StoredPermission::new(prefs.clone(), true).pinned(permission);
        let dispatcher = ActionDispatcher::new(Collaborators {
            store: store.clone(),
            remote: remote.clone(),
            prefs: prefs.clone(),
            permission: Arc::new(permission),
            flags: flags.clone(),
        })
        .unwrap();
        Fixture {
            store,
            remote,
            prefs,
            flags,
            dispatcher,
        }
    }

    fn key(spec: &str) -> Intent {
        Intent::Key(spec.parse().unwrap())
    }

    #[test]
    fn destructive_calls_need_confirmation() {
        let mut f = fixture(&[], None);
        let mut ui = ScriptedUi::answering(&[false, true, true]);

        f.dispatcher.dispatch(Intent::Terminate, &mut ui);
        assert!(f.remote.calls().is_empty());

        f.dispatcher.dispatch(Intent::Terminate, &mut ui);
        f.dispatcher.dispatch(Intent::ClearAll, &mut ui);
        assert_eq!(f.remote.calls(), [RestCall::Terminate, RestCall::ClearMessages]);
        assert_eq!(ui.confirms, [TERMINATE_PROMPT, TERMINATE_PROMPT, CLEAR_PROMPT]);
    }

    #[test]
    fn confirmed_calls_ignore_connectivity() {
        let mut f = fixture(&[1], None);
        f.flags.set_online(false);
        let mut ui = ScriptedUi::answering(&[true]);

        f.dispatcher.dispatch(Intent::ClearAll, &mut ui);
        assert_eq!(f.remote.calls(), [RestCall::ClearMessages]);

        // The pane's delete action is not gated either.
        f.store.select(1);
        f.store.take_calls();
        f.dispatcher.dispatch(Intent::DeleteSelected, &mut ui);
        assert_eq!(f.store.take_calls(), [StoreCall::Delete(1, true)]);
    }

    #[test]
    fn offline_hotkeys_do_nothing() {
        let mut f = fixture(&[1, 2, 3], None);
        f.store.select(2);
        f.flags.set_online(false);
        f.store.take_calls();
        let mut ui = ScriptedUi::default();

        for spec in ["del", "backspace", "f5", "ctrl+f5", "ctrl+r", "up", "down", "ctrl+up", "ctrl+down", "/"] {
            assert!(!f.dispatcher.dispatch(key(spec), &mut ui), "{spec} fired while offline");
        }
        assert!(f.store.take_calls().is_empty());
        assert!(f.remote.calls().is_empty());
        assert_eq!(ui, ScriptedUi::default());
    }

    #[test]
    fn hotkey_navigation_clicks_rows() {
        let mut f = fixture(&[1, 2, 3], None);
        let mut ui = ScriptedUi::default();

        // Nothing selected: up lands on the last row, down on the first.
        f.dispatcher.dispatch(key("up"), &mut ui);
        assert_eq!(f.store.selected_id(), Some(3));
        f.dispatcher.dispatch(key("up"), &mut ui);
        assert_eq!(f.store.selected_id(), Some(2));
        f.dispatcher.dispatch(key("ctrl+down"), &mut ui);
        assert_eq!(f.store.selected_id(), Some(3));
        f.dispatcher.dispatch(key("down"), &mut ui);
        assert_eq!(f.store.selected_id(), Some(3));
        f.dispatcher.dispatch(key("ctrl+up"), &mut ui);
        assert_eq!(f.store.selected_id(), Some(1));
        assert_eq!(ui.message_pane_shown, 4);

        f.dispatcher.dispatch(key("/"), &mut ui);
        assert!(ui.search_focused);
    }

    #[test]
    fn hotkey_delete_and_notification_compensation() {
        let mut f = fixture(&[1, 2], None);
        let mut ui = ScriptedUi::default();

        assert!(f.dispatcher.dispatch(key("del"), &mut ui));
        assert!(!f.store.take_calls().iter().any(|c| matches!(c, StoreCall::Delete(..))));

        f.store.select(2);
        f.dispatcher.dispatch(key("del"), &mut ui);
        f.dispatcher.dispatch(key("ctrl+r"), &mut ui);
        let calls = f.store.take_calls();
        assert!(calls.contains(&StoreCall::Delete(2, true)));
        assert!(calls.contains(&StoreCall::CloseNotifications));

        assert!(f.dispatcher.dispatch(key("backspace"), &mut ui));
        assert!(!f.dispatcher.dispatch(key("x"), &mut ui));
    }

    #[test]
    fn denied_permission_alerts_and_keeps_preference() {
        let mut f = fixture(&[], Some(Permission::Denied));
        f.prefs.set(NOTIFICATIONS_KEY, "true").unwrap();
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::ToggleNotifications, &mut ui);

        assert_eq!(ui.alerts, [PERMISSION_DENIED_ALERT]);
        assert_eq!(f.prefs.get(NOTIFICATIONS_KEY).as_deref(), Some("true"));
        assert!(ui.label.is_none());
    }

    #[test]
    fn granted_permission_flips_preference() {
        let mut f = fixture(&[], Some(Permission::Granted));
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::ToggleNotifications, &mut ui);
        assert_eq!(f.prefs.get(NOTIFICATIONS_KEY).as_deref(), Some("true"));
        assert_eq!(ui.label.as_deref(), Some(DISABLE_LABEL));

        f.dispatcher.dispatch(Intent::ToggleNotifications, &mut ui);
        assert_eq!(f.prefs.get(NOTIFICATIONS_KEY).as_deref(), Some("false"));
        assert_eq!(ui.label.as_deref(), Some(ENABLE_LABEL));
    }

    #[test]
    fn unset_permission_prompts_and_stores_answer() {
        let mut f = fixture(&[], None);
        let mut ui = ScriptedUi::answering(&[true]);

        f.dispatcher.dispatch(Intent::ToggleNotifications, &mut ui);

        assert_eq!(ui.confirms, [PERMISSION_PROMPT]);
        assert_eq!(f.prefs.get(NOTIFICATIONS_KEY).as_deref(), Some("true"));
        assert_eq!(ui.label.as_deref(), Some(DISABLE_LABEL));
        assert!(f.dispatcher.notifications_enabled());
    }

    #[test]
    fn search_forwards_trimmed_lowercase_term() {
        let mut f = fixture(&[], None);
        f.flags.set_online(false);
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::Search("  Invoice ".into()), &mut ui);
        f.dispatcher.dispatch(Intent::Search("INVOICE 2".into()), &mut ui);
        assert_eq!(
            f.store.take_calls(),
            [
                StoreCall::ApplyFilter("invoice".into()),
                StoreCall::ApplyFilter("invoice 2".into())
            ]
        );
    }

    #[test]
    fn row_clicks_select_and_ctrl_deselects() {
        let mut f = fixture(&[1, 2], None);
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::RowClick { id: 2, ctrl: false }, &mut ui);
        assert_eq!(f.store.selected_id(), Some(2));
        f.dispatcher.dispatch(Intent::RowClick { id: 2, ctrl: false }, &mut ui);
        assert_eq!(ui.message_pane_shown, 1);

        f.dispatcher.dispatch(Intent::RowClick { id: 9, ctrl: false }, &mut ui);
        assert_eq!(f.store.selected_id(), Some(2));

        f.dispatcher.dispatch(Intent::RowClick { id: 1, ctrl: true }, &mut ui);
        assert_eq!(f.store.selected_id(), None);
    }

    #[test]
    fn format_switch_requires_selection() {
        let mut f = fixture(&[1], None);
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::SelectFormat(MessageFormat::Source), &mut ui);
        assert!(!f.store.take_calls().contains(&StoreCall::UpdateFormat(MessageFormat::Source)));

        f.store.select(1);
        f.dispatcher.dispatch(Intent::SelectFormat(MessageFormat::Source), &mut ui);
        assert!(f.store.take_calls().contains(&StoreCall::UpdateFormat(MessageFormat::Source)));
    }

    #[test]
    fn pane_resize_is_local_and_ungated() {
        let mut f = fixture(&[], None);
        f.flags.set_online(false);
        let mut ui = ScriptedUi::default();
        ui.pane_tops.insert(PaneId::MessageList, 2);
        let handle = ResizeHandle {
            previous: PaneId::MessageList,
            next: PaneId::MessageBody,
            sibling: Sibling::Previous,
        };

        assert!(f.dispatcher.dispatch(
            Intent::PointerDown {
                handle,
                button: PointerButton::Primary
            },
            &mut ui
        ));
        assert!(f.dispatcher.is_dragging());
        f.dispatcher.dispatch(Intent::PointerMove { y: 12 }, &mut ui);
        f.dispatcher.dispatch(Intent::PointerUp, &mut ui);
        assert_eq!(ui.heights, [(PaneId::MessageList, 10)]);
        assert!(!f.dispatcher.is_dragging());
    }

    #[test]
    fn unload_marks_terminating_and_closes_notifications() {
        let mut f = fixture(&[], None);
        let mut ui = ScriptedUi::default();

        f.dispatcher.dispatch(Intent::Unload, &mut ui);

        assert!(f.flags.is_terminating());
        assert!(f.store.take_calls().contains(&StoreCall::CloseNotifications));
    }
}
