use crate::transport::ChannelSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

/// Side effects the driver performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ReportConnected,
    ReportDisconnected,
    Dispatch { name: String, data: String },
    Log { data: String },
    ScheduleRetry,
}

/// Connection state for the push channel.
///
/// Every channel instance gets a fresh generation; signals carrying an older
/// generation are dropped so a superseded channel can never drive the viewer.
/// `was_ever_connected` is per instance: failures of a fresh attempt are not
/// reported as disconnects until that attempt has opened once.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    status: ConnectionStatus,
    generation: u64,
    was_ever_connected: bool,
    retry_pending: bool,
    terminating: bool,
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMachine {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            generation: 0,
            was_ever_connected: false,
            retry_pending: false,
            terminating: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn was_ever_connected(&self) -> bool {
        self.was_ever_connected
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Starts a new channel instance and returns its generation.
    /// Returns `None` once the machine is terminating.
    pub fn begin_attempt(&mut self) -> Option<u64> {
        if self.terminating {
            return None;
        }
        self.generation += 1;
        self.status = ConnectionStatus::Connecting;
        self.was_ever_connected = false;
        self.retry_pending = false;
        Some(self.generation)
    }

    pub fn terminate(&mut self) {
        self.terminating = true;
        self.retry_pending = false;
    }

    pub fn apply(&mut self, generation: u64, signal: ChannelSignal) -> Vec<Directive> {
        if self.terminating || generation != self.generation {
            return Vec::new();
        }

        match signal {
            ChannelSignal::Opened => {
                self.was_ever_connected = true;
                self.status = ConnectionStatus::Connected;
                vec![Directive::ReportConnected]
            }
            ChannelSignal::Event { name, data } => vec![Directive::Dispatch { name, data }],
            ChannelSignal::Message { data } => vec![Directive::Log { data }],
            ChannelSignal::Error { closed, .. } => {
                let mut directives = Vec::with_capacity(2);
                if self.was_ever_connected {
                    directives.push(Directive::ReportDisconnected);
                }
                if closed {
                    self.status = ConnectionStatus::Disconnected;
                    if !self.retry_pending {
                        self.retry_pending = true;
                        directives.push(Directive::ScheduleRetry);
                    }
                } else {
                    self.status = ConnectionStatus::Connecting;
                }
                directives
            }
        }
    }
}
