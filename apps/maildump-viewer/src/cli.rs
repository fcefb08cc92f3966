use clap::{Args, Parser};
use std::path::PathBuf;

use crate::notify::Permission;
use crate::telemetry::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "maildump-viewer",
    about = "📬 Watch a maildump inbox from the terminal",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        env = "MAILDUMP_URL",
        default_value = "http://127.0.0.1:1080/",
        help = "Base URL of the maildump web interface"
    )]
    pub server: String,

    #[arg(
        long,
        env = "MAILDUMP_USERNAME",
        value_name = "USER",
        help = "Username for a password-protected maildump (--htpasswd)"
    )]
    pub username: Option<String>,

    #[arg(
        long,
        env = "MAILDUMP_PASSWORD",
        value_name = "PASSWORD",
        hide_env_values = true,
        help = "Password for a password-protected maildump"
    )]
    pub password: Option<String>,

    #[arg(
        long = "prefs-file",
        env = "MAILDUMP_VIEWER_PREFS",
        value_name = "PATH",
        help = "Preferences file (defaults to ~/.maildump-viewer/preferences.toml)"
    )]
    pub prefs_file: Option<PathBuf>,

    #[arg(
        long = "notification-permission",
        value_enum,
        value_name = "PERMISSION",
        help = "Pin the notification permission instead of asking"
    )]
    pub notification_permission: Option<Permission>,

    #[arg(
        long = "no-notifications",
        action = clap::ArgAction::SetTrue,
        help = "Hide the notification toggle entirely"
    )]
    pub no_notifications: bool,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "MAILDUMP_VIEWER_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "MAILDUMP_VIEWER_LOG_FILE",
        help = "Write logs to the specified file; nothing is logged without one"
    )]
    pub file: Option<PathBuf>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}
