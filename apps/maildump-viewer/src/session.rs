//! Glue between the live channel and the rest of the viewer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mailbox_live::{events, ConnectionCallbacks, EventSubscriptions};
use tracing::{info, warn};

use crate::prefs::{get_bool, PreferenceStore, NOTIFICATIONS_KEY};
use crate::store::{MessageId, MessageStore};

/// Connectivity flags shared by the live channel, the dispatcher and the UI.
#[derive(Debug)]
pub struct SessionFlags {
    online: AtomicBool,
    disconnected: AtomicBool,
    terminating: AtomicBool,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFlags {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            disconnected: AtomicBool::new(false),
            terminating: AtomicBool::new(false),
        }
    }

    /// Read on every hotkey; never cache it.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Drives the "disconnected" indicator.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    pub fn mark_terminating(&self) {
        self.terminating.store(true, Ordering::SeqCst);
    }
}

pub struct ViewerCallbacks {
    flags: Arc<SessionFlags>,
    store: Arc<dyn MessageStore>,
}

impl ViewerCallbacks {
    pub fn new(flags: Arc<SessionFlags>, store: Arc<dyn MessageStore>) -> Self {
        Self { flags, store }
    }
}

impl ConnectionCallbacks for ViewerCallbacks {
    fn connected(&self) {
        info!(target = "viewer::session", "SSE: connected");
        self.flags.set_online(true);
        self.flags.disconnected.store(false, Ordering::SeqCst);
        self.store.load_all();
    }

    fn disconnected(&self) {
        if self.flags.is_terminating() {
            return;
        }
        info!(target = "viewer::session", "SSE: disconnected");
        self.flags.disconnected.store(true, Ordering::SeqCst);
        self.flags.set_online(false);
    }
}

fn parse_id(event: &str, payload: &str) -> Option<MessageId> {
    match payload.trim().parse() {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(target = "viewer::session", event, payload, error = %err, "ignoring malformed message id");
            None
        }
    }
}

/// Handlers for the named events of the maildump push channel.
pub fn live_subscriptions(
    store: Arc<dyn MessageStore>,
    prefs: Arc<dyn PreferenceStore>,
) -> EventSubscriptions {
    let added = store.clone();
    let deleted = store.clone();
    EventSubscriptions::builder()
        .on(events::ADD_MESSAGE, move |payload: &str| {
            let Some(id) = parse_id(events::ADD_MESSAGE, payload) else {
                return;
            };
            info!(target = "viewer::session", id, "SSE: received new message");
            added.load(id, get_bool(prefs.as_ref(), NOTIFICATIONS_KEY));
        })
        .on(events::DELETE_MESSAGE, move |payload: &str| {
            let Some(id) = parse_id(events::DELETE_MESSAGE, payload) else {
                return;
            };
            info!(target = "viewer::session", id, "SSE: deleted message");
            if deleted.get(id).is_some() {
                deleted.delete(id, false);
            }
        })
        .on(events::DELETE_MESSAGES, move |_: &str| {
            info!(target = "viewer::session", "SSE: deleted all messages");
            store.delete_all();
        })
        .build()
}
