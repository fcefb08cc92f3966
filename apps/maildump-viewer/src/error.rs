use std::io;

use mailbox_live::LiveError;
use thiserror::Error;

use crate::api::ApiError;
use crate::prefs::PrefsError;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("preferences: {0}")]
    Prefs(#[from] PrefsError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("live channel: {0}")]
    Live(#[from] LiveError),
    #[error("logging initialization failed: {0}")]
    Logging(String),
    #[error("terminal runtime error: {0}")]
    Runtime(String),
}
