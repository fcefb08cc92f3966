use std::sync::Arc;

use mailbox_live::{LiveConnection, SseTransport};
use tokio::runtime::Handle;
use tracing::info;

use crate::api::{ApiError, MaildumpApi, RestClient};
use crate::cli::Cli;
use crate::config::ViewerConfig;
use crate::dispatch::{ActionDispatcher, Collaborators};
use crate::error::ViewerError;
use crate::notify::{NotificationPermission, StoredPermission, Toasts};
use crate::prefs::{FilePreferences, PreferenceStore};
use crate::session::{live_subscriptions, SessionFlags, ViewerCallbacks};
use crate::store::{MessageStore, RemoteMessageStore};
use crate::telemetry;
use crate::tui::{self, LiveView, TerminalGuard, TerminalUi};

pub async fn run(cli: Cli) -> Result<(), ViewerError> {
    let config = ViewerConfig::from_cli(&cli)?;
    telemetry::init(&config.log).map_err(|err| ViewerError::Logging(err.to_string()))?;
    info!(
        target = "viewer::app",
        server = %config.server,
        prefs = %config.prefs_path.display(),
        "starting maildump viewer"
    );

    let prefs: Arc<dyn PreferenceStore> = Arc::new(FilePreferences::open(&config.prefs_path)?);
    let http = reqwest::Client::builder().build().map_err(ApiError::from)?;
    let api = MaildumpApi::new(config.server.clone(), http.clone(), config.credentials.clone());
    let runtime = Handle::current();

    let permission: Arc<dyn NotificationPermission> = Arc::new(
        StoredPermission::new(prefs.clone(), config.notifications_available).pinned(config.permission),
    );
    let toasts = Arc::new(Toasts::new(permission.clone()));
    let store = RemoteMessageStore::new(api.clone(), runtime.clone(), toasts.clone());
    let shared_store: Arc<dyn MessageStore> = Arc::new(store.clone());
    let flags = Arc::new(SessionFlags::new());

    let transport = SseTransport::new(&config.server, http)?.with_credentials(config.credentials.clone());
    let live = LiveConnection::new(
        transport,
        live_subscriptions(shared_store.clone(), prefs.clone()),
        ViewerCallbacks::new(flags.clone(), shared_store.clone()),
    )
    .spawn();

    let mut dispatcher = ActionDispatcher::new(Collaborators {
        store: shared_store,
        remote: Arc::new(RestClient::new(api, runtime)),
        prefs,
        permission,
        flags: flags.clone(),
    })
    .map_err(|err| ViewerError::Config(format!("hotkey table: {err}")))?
    .with_live(live.clone());

    let view = LiveView::new(store, flags, toasts, config.notifications_available);
    let outcome = tokio::task::spawn_blocking(move || -> Result<(), ViewerError> {
        let _guard = TerminalGuard::enter()?;
        let mut ui = TerminalUi::stdout(Box::new(view))?;
        tui::run(&mut ui, &mut dispatcher)
    })
    .await
    .map_err(|err| ViewerError::Runtime(err.to_string()))?;

    live.shutdown();
    live.join().await;
    info!(target = "viewer::app", "maildump viewer stopped");
    outcome
}
