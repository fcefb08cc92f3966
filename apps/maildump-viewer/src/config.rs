use std::path::PathBuf;

use mailbox_live::BasicCredentials;
use url::Url;

use crate::cli::Cli;
use crate::error::ViewerError;
use crate::notify::Permission;
use crate::prefs::FilePreferences;
use crate::telemetry::LogConfig;

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub server: Url,
    pub credentials: Option<BasicCredentials>,
    pub prefs_path: PathBuf,
    pub notifications_available: bool,
    pub permission: Option<Permission>,
    pub log: LogConfig,
}

impl ViewerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ViewerError> {
        let raw = normalize_opt(Some(cli.server.clone()))
            .ok_or_else(|| ViewerError::Config("server url must not be empty".into()))?;
        let server = parse_base_url(&raw)?;

        let credentials = match (
            normalize_opt(cli.username.clone()),
            normalize_opt(cli.password.clone()),
        ) {
            (Some(username), password) => Some(BasicCredentials {
                username,
                password: password.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(ViewerError::Config(
                    "a password was given without a username".into(),
                ))
            }
            (None, None) => None,
        };

        let prefs_path = match cli.prefs_file.clone() {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => FilePreferences::default_path()?,
        };

        Ok(Self {
            server,
            credentials,
            prefs_path,
            notifications_available: !cli.no_notifications,
            permission: cli.notification_permission,
            log: cli.logging.to_config(),
        })
    }
}

/// Relative joins drop the last path segment unless the base ends in `/`.
fn parse_base_url(raw: &str) -> Result<Url, ViewerError> {
    let mut url = Url::parse(raw).map_err(|err| ViewerError::Config(format!("invalid server url '{raw}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ViewerError::Config(format!(
            "unsupported server url scheme '{}'",
            url.scheme()
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn normalize_opt(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
