//! Mailbox Live: keeps a maildump viewer in step with the server's event stream.
//!
//! Responsibilities:
//! - opening the `/event-stream` push channel and tracking its connectivity
//! - reconnecting at a fixed interval after the channel closes
//! - routing named server events to the handlers registered at startup
//! - reporting connect/disconnect transitions to the viewer

mod connection;
mod machine;
mod subscriptions;
mod transport;

pub use connection::{ConnectionCallbacks, LiveConnection, LiveHandle, StateCallbacks, RETRY_DELAY};
pub use machine::{ConnectionMachine, ConnectionStatus, Directive};
pub use subscriptions::{EventHandler, EventSubscriptions, EventSubscriptionsBuilder};
pub use transport::{
    BasicCredentials, ChannelSignal, PushTransport, SignalStream, SseTransport, DEFAULT_EVENT,
    EVENT_STREAM_PATH,
};

/// Event names the maildump server publishes on the push channel.
pub mod events {
    pub const ADD_MESSAGE: &str = "add_message";
    pub const DELETE_MESSAGE: &str = "delete_message";
    pub const DELETE_MESSAGES: &str = "delete_messages";
}

#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("invalid event stream url: {0}")]
    InvalidUrl(String),
}

pub type LiveResult<T> = Result<T, LiveError>;
