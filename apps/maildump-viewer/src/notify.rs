use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use clap::ValueEnum;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dispatch::Prompter;
use crate::prefs::{get_bool, PreferenceStore, NOTIFICATIONS_KEY};
use crate::store::MessageSummary;

/// Remembered answer to the notification permission prompt.
pub const PERMISSION_KEY: &str = "notification_permission";

pub const ENABLE_LABEL: &str = "Enable notifications";
pub const DISABLE_LABEL: &str = "Disable notifications";
pub const PERMISSION_PROMPT: &str = "Allow maildump-viewer to show notifications for new messages?";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Default,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Default => "default",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "granted" => Ok(Permission::Granted),
            "denied" => Ok(Permission::Denied),
            "default" => Ok(Permission::Default),
            other => Err(format!("unknown notification permission '{other}'")),
        }
    }
}

pub trait NotificationPermission: Send + Sync {
    /// Whether notifications can be shown at all.
    fn available(&self) -> bool;
    fn check(&self) -> Permission;
    /// Asks the user and remembers the answer. Returns true when granted.
    fn request(&self, prompter: &mut dyn Prompter) -> bool;
}

/// Permission kept in the preference store, optionally pinned from the command line.
/// A pinned `default` only lasts until the prompt is answered.
pub struct StoredPermission {
    prefs: Arc<dyn PreferenceStore>,
    available: bool,
    pinned: Mutex<Option<Permission>>,
}

impl StoredPermission {
    pub fn new(prefs: Arc<dyn PreferenceStore>, available: bool) -> Self {
        Self {
            prefs,
            available,
            pinned: Mutex::new(None),
        }
    }

    pub fn pinned(mut self, permission: Option<Permission>) -> Self {
        *self.pinned.get_mut() = permission;
        self
    }
}

impl NotificationPermission for StoredPermission {
    fn available(&self) -> bool {
        self.available
    }

    fn check(&self) -> Permission {
        if let Some(pinned) = *self.pinned.lock() {
            return pinned;
        }
        match self.prefs.get(PERMISSION_KEY) {
            Some(raw) => raw.parse().unwrap_or_else(|err: String| {
                warn!(target = "viewer::notify", error = %err, "ignoring stored permission");
                Permission::Default
            }),
            None => Permission::Default,
        }
    }

    fn request(&self, prompter: &mut dyn Prompter) -> bool {
        let granted = prompter.confirm(PERMISSION_PROMPT);
        let answer = if granted {
            Permission::Granted
        } else {
            Permission::Denied
        };
        if let Err(err) = self.prefs.set(PERMISSION_KEY, answer.as_str()) {
            warn!(target = "viewer::notify", error = %err, "failed to remember permission");
        }
        let mut pinned = self.pinned.lock();
        if *pinned == Some(Permission::Default) {
            *pinned = Some(answer);
        }
        debug!(target = "viewer::notify", permission = %answer, "notification permission answered");
        granted
    }
}

/// Notifications are on only when both the permission and the stored preference allow it.
pub fn effective_enabled(prefs: &dyn PreferenceStore, permission: &dyn NotificationPermission) -> bool {
    get_bool(prefs, NOTIFICATIONS_KEY) && permission.check() == Permission::Granted
}

pub fn toggle_label(enabled: bool) -> &'static str {
    if enabled {
        DISABLE_LABEL
    } else {
        ENABLE_LABEL
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &MessageSummary);
    fn close_all(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message_id: u64,
    pub title: String,
    pub body: String,
}

/// Toasts kept on screen at once; older ones are dropped.
pub const MAX_TOASTS: usize = 5;

/// In-terminal notifications, newest last. Shown only while the permission allows it.
pub struct Toasts {
    permission: Arc<dyn NotificationPermission>,
    active: Mutex<VecDeque<Toast>>,
}

impl Toasts {
    pub fn new(permission: Arc<dyn NotificationPermission>) -> Self {
        Self {
            permission,
            active: Mutex::new(VecDeque::with_capacity(MAX_TOASTS)),
        }
    }

    pub fn latest(&self) -> Option<Toast> {
        self.active.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

impl Notifier for Toasts {
    fn notify(&self, message: &MessageSummary) {
        if !self.permission.available() || self.permission.check() != Permission::Granted {
            debug!(target = "viewer::notify", id = message.id, "notification suppressed");
            return;
        }
        let toast = Toast {
            message_id: message.id,
            title: format!("New message from {}", message.sender),
            body: message.subject.clone(),
        };
        let mut active = self.active.lock();
        if active.len() == MAX_TOASTS {
            active.pop_front();
        }
        active.push_back(toast);
    }

    fn close_all(&self) {
        self.active.lock().clear();
    }
}
