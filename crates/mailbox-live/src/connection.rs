use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::machine::{ConnectionMachine, ConnectionStatus, Directive};
use crate::subscriptions::EventSubscriptions;
use crate::transport::{ChannelSignal, PushTransport};

/// Fixed delay between a closed channel and the next attempt. No backoff, no cap.
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

pub trait ConnectionCallbacks: Send + Sync {
    fn connected(&self);
    fn disconnected(&self);
}

impl<T> ConnectionCallbacks for Arc<T>
where
    T: ConnectionCallbacks + ?Sized,
{
    fn connected(&self) {
        (**self).connected()
    }

    fn disconnected(&self) {
        (**self).disconnected()
    }
}

/// Closure pair implementing [`ConnectionCallbacks`].
pub struct StateCallbacks<C, D> {
    on_connected: C,
    on_disconnected: D,
}

impl<C, D> StateCallbacks<C, D>
where
    C: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
{
    pub fn new(on_connected: C, on_disconnected: D) -> Self {
        Self {
            on_connected,
            on_disconnected,
        }
    }
}

impl<C, D> ConnectionCallbacks for StateCallbacks<C, D>
where
    C: Fn() + Send + Sync,
    D: Fn() + Send + Sync,
{
    fn connected(&self) {
        (self.on_connected)()
    }

    fn disconnected(&self) {
        (self.on_disconnected)()
    }
}

impl<T> PushTransport for Arc<T>
where
    T: PushTransport + ?Sized,
{
    fn open(&self) -> crate::transport::SignalStream {
        (**self).open()
    }
}

pub struct LiveConnection {
    transport: Box<dyn PushTransport>,
    subscriptions: Arc<EventSubscriptions>,
    callbacks: Box<dyn ConnectionCallbacks>,
    retry_delay: Duration,
}

impl LiveConnection {
    pub fn new<T, C>(transport: T, subscriptions: EventSubscriptions, callbacks: C) -> Self
    where
        T: PushTransport + 'static,
        C: ConnectionCallbacks + 'static,
    {
        Self {
            transport: Box::new(transport),
            subscriptions: Arc::new(subscriptions),
            callbacks: Box::new(callbacks),
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Starts the connection loop on the current tokio runtime.
    pub fn spawn(self) -> LiveHandle {
        let machine = Arc::new(Mutex::new(ConnectionMachine::new()));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.drive(machine.clone(), shutdown.clone()));
        LiveHandle {
            machine,
            shutdown,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn drive(self, machine: Arc<Mutex<ConnectionMachine>>, shutdown: CancellationToken) {
        loop {
            let Some(generation) = machine.lock().begin_attempt() else {
                break;
            };
            debug!(target = "live::connection", generation, "opening push channel");
            let mut channel = self.transport.open();

            loop {
                let next = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        debug!(target = "live::connection", generation, "push channel closed on shutdown");
                        return;
                    }
                    next = channel.next() => next,
                };
                let (signal, ended) = match next {
                    Some(signal) => (signal, false),
                    None => (ChannelSignal::closed("push channel ended"), true),
                };
                if let ChannelSignal::Error { closed, reason } = &signal {
                    debug!(
                        target = "live::connection",
                        generation,
                        closed = *closed,
                        reason = %reason,
                        "push channel error"
                    );
                }

                let directives = machine.lock().apply(generation, signal);
                let retry = self.perform(generation, directives);
                if retry || ended {
                    break;
                }
            }
            drop(channel);

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(target = "live::connection", generation, "pending reconnect cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    fn perform(&self, generation: u64, directives: Vec<Directive>) -> bool {
        let mut retry = false;
        for directive in directives {
            match directive {
                Directive::ReportConnected => {
                    info!(target = "live::connection", generation, "SSE: connected");
                    self.callbacks.connected();
                }
                Directive::ReportDisconnected => {
                    warn!(target = "live::connection", generation, "SSE: disconnected");
                    self.callbacks.disconnected();
                }
                Directive::Dispatch { name, data } => {
                    debug!(
                        target = "live::events",
                        generation,
                        event = %name,
                        payload = %data,
                        "server event"
                    );
                    self.subscriptions.dispatch(&name, &data);
                }
                Directive::Log { data } => {
                    info!(target = "live::events", generation, data = %data, "unnamed server message");
                }
                Directive::ScheduleRetry => {
                    debug!(
                        target = "live::connection",
                        generation,
                        retry_in_ms = self.retry_delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    retry = true;
                }
            }
        }
        retry
    }
}

/// Cloneable view of a running [`LiveConnection`].
#[derive(Clone)]
pub struct LiveHandle {
    machine: Arc<Mutex<ConnectionMachine>>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LiveHandle {
    pub fn status(&self) -> ConnectionStatus {
        self.machine.lock().status()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn generation(&self) -> u64 {
        self.machine.lock().generation()
    }

    pub fn is_terminating(&self) -> bool {
        self.machine.lock().is_terminating()
    }

    /// Closes the live channel and suppresses every further reconnect.
    pub fn shutdown(&self) {
        self.machine.lock().terminate();
        self.shutdown.cancel();
    }

    /// Waits for the connection loop to exit. Only the first caller waits.
    pub async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(target = "live::connection", error = %err, "connection task failed");
            }
        }
    }
}

impl std::fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let machine = self.machine.lock();
        f.debug_struct("LiveHandle")
            .field("status", &machine.status())
            .field("generation", &machine.generation())
            .field("terminating", &machine.is_terminating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SignalStream;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::time::{sleep, Instant};

    /// Hands out one scripted signal sequence per `open`. A script that does not
    /// end in a closed error stays open forever.
    #[derive(Default)]
    struct ScriptedTransport {
        scripts: StdMutex<VecDeque<Vec<ChannelSignal>>>,
        opens: StdMutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Vec<ChannelSignal>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: StdMutex::new(scripts.into()),
                opens: StdMutex::new(Vec::new()),
            })
        }

        fn opens(&self) -> Vec<Instant> {
            self.opens.lock().unwrap().clone()
        }
    }

    impl PushTransport for ScriptedTransport {
        fn open(&self) -> SignalStream {
            self.opens.lock().unwrap().push(Instant::now());
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            let ends = matches!(script.last(), Some(ChannelSignal::Error { closed: true, .. }));
            if ends {
                stream::iter(script).boxed()
            } else {
                stream::iter(script).chain(stream::pending()).boxed()
            }
        }
    }

    type Log = Arc<StdMutex<Vec<String>>>;

    fn recording_connection(transport: Arc<ScriptedTransport>, log: &Log) -> LiveConnection {
        let subscriptions = {
            let log = log.clone();
            EventSubscriptions::builder()
                .on("add_message", move |id: &str| {
                    log.lock().unwrap().push(format!("add:{id}"));
                })
                .build()
        };
        let on_connected = log.clone();
        let on_disconnected = log.clone();
        let callbacks = StateCallbacks::new(
            move || on_connected.lock().unwrap().push("connected".into()),
            move || on_disconnected.lock().unwrap().push("disconnected".into()),
        );
        LiveConnection::new(transport, subscriptions, callbacks)
    }

    fn event(name: &str, data: &str) -> ChannelSignal {
        ChannelSignal::Event {
            name: name.into(),
            data: data.into(),
        }
    }

    #[test_timeout::tokio_timeout_test(30, paused)]
    async fn reconnects_after_fixed_delay() {
        let transport = ScriptedTransport::new(vec![
            vec![ChannelSignal::closed("refused")],
            vec![ChannelSignal::Opened],
        ]);
        let log: Log = Arc::default();
        let handle = recording_connection(transport.clone(), &log).spawn();

        sleep(Duration::from_secs(5)).await;

        let opens = transport.opens();
        assert_eq!(opens.len(), 2);
        assert!(opens[1] - opens[0] >= RETRY_DELAY);
        assert_eq!(handle.status(), ConnectionStatus::Connected);
        assert_eq!(handle.generation(), 2);
        // The failed first attempt never connected, so nothing reports a disconnect.
        assert_eq!(log.lock().unwrap().as_slice(), ["connected"]);
        handle.shutdown();
        handle.join().await;
    }

    #[test_timeout::tokio_timeout_test(30, paused)]
    async fn no_reconnect_before_delay_elapses() {
        let transport = ScriptedTransport::new(vec![vec![ChannelSignal::closed("refused")]]);
        let log: Log = Arc::default();
        let handle = recording_connection(transport.clone(), &log).spawn();

        sleep(RETRY_DELAY - Duration::from_millis(1)).await;
        assert_eq!(transport.opens().len(), 1);
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(transport.opens().len(), 2);
        handle.shutdown();
        handle.join().await;
    }

    #[test_timeout::tokio_timeout_test(30, paused)]
    async fn dispatches_events_in_order_and_reports_transitions() {
        let transport = ScriptedTransport::new(vec![
            vec![
                ChannelSignal::Opened,
                event("add_message", "1"),
                event("ping", ""),
                ChannelSignal::Message {
                    data: "heartbeat".into(),
                },
                event("add_message", "2"),
                ChannelSignal::closed("server went away"),
            ],
            vec![ChannelSignal::closed("refused")],
            vec![ChannelSignal::Opened, event("add_message", "3")],
        ]);
        let log: Log = Arc::default();
        let handle = recording_connection(transport.clone(), &log).spawn();

        sleep(Duration::from_secs(10)).await;

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["connected", "add:1", "add:2", "disconnected", "connected", "add:3"]
        );
        assert_eq!(transport.opens().len(), 3);
        assert_eq!(handle.generation(), 3);
        handle.shutdown();
        handle.join().await;
    }

    #[test_timeout::tokio_timeout_test(30, paused)]
    async fn shutdown_cancels_pending_reconnect() {
        let transport = ScriptedTransport::new(vec![
            vec![ChannelSignal::Opened, ChannelSignal::closed("reset")],
            vec![ChannelSignal::Opened],
        ]);
        let log: Log = Arc::default();
        let handle = recording_connection(transport.clone(), &log).spawn();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.opens().len(), 1);
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);

        handle.shutdown();
        sleep(Duration::from_secs(5)).await;
        handle.join().await;

        assert_eq!(transport.opens().len(), 1);
        assert!(handle.is_terminating());
        assert_eq!(log.lock().unwrap().as_slice(), ["connected", "disconnected"]);
    }

    #[test_timeout::tokio_timeout_test(30, paused)]
    async fn shutdown_closes_open_channel() {
        let transport = ScriptedTransport::new(vec![vec![ChannelSignal::Opened]]);
        let log: Log = Arc::default();
        let handle = recording_connection(transport.clone(), &log).spawn();

        sleep(Duration::from_millis(10)).await;
        assert!(handle.is_connected());

        handle.shutdown();
        handle.join().await;

        assert_eq!(transport.opens().len(), 1);
        // Teardown is not a reportable disconnect.
        assert_eq!(log.lock().unwrap().as_slice(), ["connected"]);
    }
}
