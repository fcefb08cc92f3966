//! Live viewer for a running maildump server.
//!
//! The viewer follows the server's `/event-stream` push channel through
//! [`mailbox_live`], keeps a local copy of the inbox in [`store`], and turns
//! terminal input into store and REST calls through [`dispatch`].

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod prefs;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod tui;

#[cfg(test)]
mod testing;

pub use error::ViewerError;
