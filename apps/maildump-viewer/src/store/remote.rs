use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::model::{Edge, MessageDetail, MessageFormat, MessageId, MessageList, MessageSummary, Step};
use super::MessageStore;
use crate::api::MaildumpApi;
use crate::notify::Notifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyState {
    Loading,
    Ready(String),
    Failed(String),
}

/// The selected message as shown in the detail pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailView {
    pub id: MessageId,
    pub detail: Option<MessageDetail>,
    pub format: MessageFormat,
    pub body: BodyState,
}

#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub rows: Vec<MessageSummary>,
    pub total: usize,
    pub filter: String,
    pub selected: Option<MessageId>,
    pub format: MessageFormat,
    pub detail: Option<DetailView>,
}

#[derive(Default)]
struct StoreState {
    list: MessageList,
    format: MessageFormat,
    detail: Option<DetailView>,
}

impl StoreState {
    fn drop_detail_unless_selected(&mut self) {
        if self.detail.as_ref().map(|view| view.id) != self.list.selected() {
            self.detail = None;
        }
    }
}

struct Shared {
    api: MaildumpApi,
    notifier: Arc<dyn Notifier>,
    state: RwLock<StoreState>,
    revision: AtomicU64,
}

impl Shared {
    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = f(&mut self.state.write());
        self.revision.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn fetch_all(&self) {
        match self.api.list_messages().await {
            Ok(rows) => {
                debug!(target = "viewer::store", count = rows.len(), "message list loaded");
                self.mutate(|state| {
                    state.list.replace_all(rows);
                    state.drop_detail_unless_selected();
                });
            }
            Err(err) => warn!(target = "viewer::store", error = %err, "failed to load messages"),
        }
    }

    async fn fetch_one(&self, id: MessageId, notify: bool) {
        let detail = match self.api.message(id).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!(target = "viewer::store", id, error = %err, "failed to load message");
                return;
            }
        };
        let summary = detail.summary.clone();
        let inserted = self.mutate(|state| state.list.insert(summary.clone()));
        if inserted && notify {
            self.notifier.notify(&summary);
        }
    }

    async fn fetch_detail(&self, id: MessageId) {
        let detail = match self.api.message(id).await {
            Ok(detail) => detail,
            Err(err) => {
                warn!(target = "viewer::store", id, error = %err, "failed to load message detail");
                self.mutate(|state| {
                    if let Some(view) = state.detail.as_mut().filter(|view| view.id == id) {
                        view.body = BodyState::Failed(err.to_string());
                    }
                });
                return;
            }
        };
        let format = self.mutate(|state| {
            let preferred = state.format;
            let view = state.detail.as_mut().filter(|view| view.id == id)?;
            let format = detail.pick_format(preferred);
            view.format = format;
            view.detail = Some(detail);
            Some(format)
        });
        if let Some(format) = format {
            self.fetch_body(id, format).await;
        }
    }

    async fn fetch_body(&self, id: MessageId, format: MessageFormat) {
        let body = match self.api.message_body(id, format).await {
            Ok(body) => BodyState::Ready(body),
            Err(err) => {
                warn!(target = "viewer::store", id, format = %format, error = %err, "failed to load message body");
                BodyState::Failed(err.to_string())
            }
        };
        self.mutate(|state| {
            // A newer selection or format switch supersedes this response.
            if let Some(view) = state
                .detail
                .as_mut()
                .filter(|view| view.id == id && view.format == format)
            {
                view.body = body;
            }
        });
    }
}

/// [`MessageStore`] backed by the maildump REST API. Network work is spawned
/// on `runtime` so every method is safe to call from the UI thread.
#[derive(Clone)]
pub struct RemoteMessageStore {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl RemoteMessageStore {
    pub fn new(api: MaildumpApi, runtime: Handle, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                notifier,
                state: RwLock::new(StoreState::default()),
                revision: AtomicU64::new(0),
            }),
            runtime,
        }
    }

    /// Bumped on every change; lets the UI skip redundant snapshots.
    pub fn revision(&self) -> u64 {
        self.shared.revision.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let revision = self.revision();
        let state = self.shared.state.read();
        StoreSnapshot {
            revision,
            rows: state.list.visible().cloned().collect(),
            total: state.list.len(),
            filter: state.list.filter().to_string(),
            selected: state.list.selected(),
            format: state.format,
            detail: state.detail.clone(),
        }
    }

    fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(Arc<Shared>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(task(self.shared.clone()));
    }
}

impl MessageStore for RemoteMessageStore {
    fn load_all(&self) {
        self.spawn(|shared| async move { shared.fetch_all().await });
    }

    fn load(&self, id: MessageId, notify: bool) {
        self.spawn(move |shared| async move { shared.fetch_one(id, notify).await });
    }

    fn delete_all(&self) {
        self.shared.mutate(|state| {
            state.list.clear();
            state.detail = None;
        });
    }

    fn get(&self, id: MessageId) -> Option<MessageSummary> {
        self.shared.state.read().list.get(id).cloned()
    }

    fn selected(&self) -> Option<MessageId> {
        self.shared.state.read().list.selected()
    }

    fn select(&self, id: MessageId) {
        let selected = self.shared.mutate(|state| {
            if !state.list.select(id) {
                return false;
            }
            state.detail = Some(DetailView {
                id,
                detail: None,
                format: state.format,
                body: BodyState::Loading,
            });
            true
        });
        if selected {
            self.spawn(move |shared| async move { shared.fetch_detail(id).await });
        }
    }

    fn deselect(&self) {
        self.shared.mutate(|state| {
            state.list.deselect();
            state.detail = None;
        });
    }

    fn delete(&self, id: MessageId, remote: bool) {
        if remote {
            self.spawn(move |shared| async move {
                if let Err(err) = shared.api.delete_message(id).await {
                    warn!(target = "viewer::store", id, error = %err, "failed to delete message");
                }
            });
            return;
        }
        self.shared.mutate(|state| {
            state.list.remove(id);
            state.drop_detail_unless_selected();
        });
    }

    fn apply_filter(&self, term: &str) {
        self.shared.mutate(|state| state.list.set_filter(term));
    }

    fn update_format(&self, format: MessageFormat) {
        let refetch = self.shared.mutate(|state| {
            state.format = format;
            let view = state.detail.as_mut()?;
            let format = match &view.detail {
                Some(detail) => detail.pick_format(format),
                None => return None,
            };
            if view.format == format && matches!(view.body, BodyState::Ready(_)) {
                return None;
            }
            view.format = format;
            view.body = BodyState::Loading;
            Some((view.id, format))
        });
        if let Some((id, format)) = refetch {
            self.spawn(move |shared| async move { shared.fetch_body(id, format).await });
        }
    }

    fn close_notifications(&self) {
        self.shared.notifier.close_all();
    }

    fn edge_row(&self, edge: Edge) -> Option<MessageId> {
        self.shared.state.read().list.edge(edge)
    }

    fn visible_neighbor(&self, id: MessageId, step: Step) -> Option<MessageId> {
        self.shared.state.read().list.neighbor(id, step)
    }
}
