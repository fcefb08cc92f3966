use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use reqwest_eventsource::{retry, Event, EventSource, ReadyState};
use tracing::{debug, warn};
use url::Url;

use crate::{LiveError, LiveResult};

/// Path of the server-sent event stream, relative to the maildump base url.
pub const EVENT_STREAM_PATH: &str = "event-stream";

/// Event name the SSE framing assigns to messages without an `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// What a single push channel instance reports to the connection driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSignal {
    Opened,
    Event { name: String, data: String },
    /// Unnamed traffic; diagnostics only.
    Message { data: String },
    /// `closed` is true when the channel gave up and will not reconnect on its own.
    Error { closed: bool, reason: String },
}

impl ChannelSignal {
    pub fn from_frame(name: String, data: String) -> Self {
        if name.is_empty() || name == DEFAULT_EVENT {
            ChannelSignal::Message { data }
        } else {
            ChannelSignal::Event { name, data }
        }
    }

    pub fn closed(reason: impl Into<String>) -> Self {
        ChannelSignal::Error {
            closed: true,
            reason: reason.into(),
        }
    }
}

pub type SignalStream = Pin<Box<dyn Stream<Item = ChannelSignal> + Send>>;

/// Opens fresh push channel instances. Dropping the returned stream closes the channel.
pub trait PushTransport: Send + Sync {
    fn open(&self) -> SignalStream;
}

#[derive(Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `reqwest-eventsource` backed transport for `GET /event-stream`.
#[derive(Debug, Clone)]
pub struct SseTransport {
    url: Url,
    http: reqwest::Client,
    credentials: Option<BasicCredentials>,
}

impl SseTransport {
    pub fn new(base_url: &Url, http: reqwest::Client) -> LiveResult<Self> {
        let url = base_url
            .join(EVENT_STREAM_PATH)
            .map_err(|err| LiveError::InvalidUrl(err.to_string()))?;
        Ok(Self {
            url,
            http,
            credentials: None,
        })
    }

    pub fn with_credentials(mut self, credentials: Option<BasicCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self.http.get(self.url.clone());
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        }
    }
}

impl PushTransport for SseTransport {
    fn open(&self) -> SignalStream {
        let mut source = match EventSource::new(self.request()) {
            Ok(source) => source,
            Err(err) => {
                warn!(target = "live::transport", error = %err, "event stream request not cloneable");
                return stream::once(async move { ChannelSignal::closed(err.to_string()) }).boxed();
            }
        };
        // Reconnects are owned by the connection driver.
        source.set_retry_policy(Box::new(retry::Never));
        debug!(target = "live::transport", url = %self.url, "event stream opened");

        stream::unfold(Some(source), |state| async move {
            let mut source = state?;
            match source.next().await {
                Some(Ok(Event::Open)) => Some((ChannelSignal::Opened, Some(source))),
                Some(Ok(Event::Message(message))) => Some((
                    ChannelSignal::from_frame(message.event, message.data),
                    Some(source),
                )),
                Some(Err(err)) => {
                    let closed = matches!(source.ready_state(), ReadyState::Closed);
                    let signal = ChannelSignal::Error {
                        closed,
                        reason: err.to_string(),
                    };
                    if closed {
                        source.close();
                        Some((signal, None))
                    } else {
                        Some((signal, Some(source)))
                    }
                }
                None => Some((ChannelSignal::closed("event stream ended"), None)),
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_event_stream_path() {
        let base = Url::parse("http://127.0.0.1:1080/").unwrap();
        let transport = SseTransport::new(&base, reqwest::Client::new()).unwrap();
        assert_eq!(transport.url().as_str(), "http://127.0.0.1:1080/event-stream");
    }

    #[test]
    fn unnamed_frames_are_diagnostic() {
        assert_eq!(
            ChannelSignal::from_frame("message".into(), "hello".into()),
            ChannelSignal::Message {
                data: "hello".into()
            }
        );
        assert_eq!(
            ChannelSignal::from_frame(String::new(), "hi".into()),
            ChannelSignal::Message { data: "hi".into() }
        );
        assert_eq!(
            ChannelSignal::from_frame("add_message".into(), "7".into()),
            ChannelSignal::Event {
                name: "add_message".into(),
                data: "7".into()
            }
        );
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = BasicCredentials {
            username: "admin".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
