use mailbox_live::BasicCredentials;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use url::Url;

use crate::store::{MessageDetail, MessageFormat, MessageId, MessageListing, MessageSummary};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Status { status: StatusCode, message: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error body of the maildump REST endpoints.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: String,
}

/// Thin client for the maildump REST endpoints.
#[derive(Debug, Clone)]
pub struct MaildumpApi {
    base: Url,
    http: reqwest::Client,
    credentials: Option<BasicCredentials>,
}

impl MaildumpApi {
    pub fn new(base: Url, http: reqwest::Client, credentials: Option<BasicCredentials>) -> Self {
        Self {
            base,
            http,
            credentials,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub async fn list_messages(&self) -> ApiResult<Vec<MessageSummary>> {
        let response = self.send(Method::GET, "messages/").await?;
        let listing: MessageListing = response.json().await?;
        Ok(listing.messages)
    }

    pub async fn message(&self, id: MessageId) -> ApiResult<MessageDetail> {
        let response = self.send(Method::GET, &format!("messages/{id}.json")).await?;
        Ok(response.json().await?)
    }

    pub async fn message_body(&self, id: MessageId, format: MessageFormat) -> ApiResult<String> {
        let response = self
            .send(Method::GET, &format!("messages/{id}.{}", format.as_str()))
            .await?;
        Ok(response.text().await?)
    }

    pub async fn delete_message(&self, id: MessageId) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("messages/{id}")).await?;
        Ok(())
    }

    pub async fn call(&self, call: RestCall) -> ApiResult<()> {
        self.send(call.method(), call.path()).await?;
        Ok(())
    }

    /// `path` is relative to the base url.
    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.base.join(path)?;
        let request = self.http.request(method, url);
        Ok(match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.password)),
            None => request,
        })
    }

    async fn send(&self, method: Method, path: &str) -> ApiResult<Response> {
        debug!(target = "viewer::api", method = %method, path, "request");
        let response = self.request(method, path)?.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&raw)
            .map(|body| body.msg)
            .unwrap_or_else(|_| raw.trim().to_string());
        Err(ApiError::Status { status, message })
    }
}

/// Remote calls that act on the whole server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestCall {
    /// `DELETE /` stops the maildump process.
    Terminate,
    /// `DELETE /messages/`
    ClearMessages,
}

impl RestCall {
    pub fn method(self) -> Method {
        Method::DELETE
    }

    pub fn path(self) -> &'static str {
        match self {
            RestCall::Terminate => "",
            RestCall::ClearMessages => "messages/",
        }
    }
}

/// Fire-and-forget issuer. Outcomes are logged, never returned.
pub trait RemoteCalls: Send + Sync {
    fn issue(&self, call: RestCall);
}

pub struct RestClient {
    api: MaildumpApi,
    runtime: Handle,
}

impl RestClient {
    pub fn new(api: MaildumpApi, runtime: Handle) -> Self {
        Self { api, runtime }
    }
}

impl RemoteCalls for RestClient {
    fn issue(&self, call: RestCall) {
        let api = self.api.clone();
        self.runtime.spawn(async move {
            match api.call(call).await {
                Ok(()) => debug!(target = "viewer::api", call = ?call, "remote call done"),
                Err(err) => warn!(target = "viewer::api", call = ?call, error = %err, "remote call failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{delete, get};
    use axum::{Json, Router};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    async fn serve(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn api(addr: SocketAddr, credentials: Option<BasicCredentials>) -> MaildumpApi {
        let base = Url::parse(&format!("http://{addr}/")).unwrap();
        MaildumpApi::new(base, reqwest::Client::new(), credentials)
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn lists_messages() {
        let app = Router::new().route(
            "/messages/",
            get(|| async {
                Json(json!({"messages": [
                    {"id": 2, "sender": "b@x", "recipients": {"to": ["t@x"], "cc": [], "bcc": []},
                     "subject": "two", "created_at": "2024-01-02 00:00:00", "size": 20},
                    {"id": 1, "sender": "a@x", "recipients": {"to": [], "cc": [], "bcc": []},
                     "subject": "one", "created_at": "2024-01-01 00:00:00", "size": 10}
                ]}))
            }),
        );
        let addr = serve(app).await;

        let messages = api(addr, None).list_messages().await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].subject, "two");
        assert_eq!(messages[0].recipients.to, ["t@x"]);
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn surfaces_server_error_message() {
        let app = Router::new().route(
            "/messages/:id",
            delete(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(json!({"msg": "message does not exist"})),
                )
            }),
        );
        let addr = serve(app).await;

        let err = api(addr, None).delete_message(9).await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "message does not exist");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn sends_basic_auth_on_rest_calls() {
        let seen: Arc<Mutex<Vec<(String, Option<String>)>>> = Arc::default();
        let record = |path: &'static str, seen: Arc<Mutex<Vec<(String, Option<String>)>>>| {
            move |headers: HeaderMap| {
                let seen = seen.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    seen.lock().await.push((path.to_string(), auth));
                    AxumStatus::NO_CONTENT
                }
            }
        };
        let app = Router::new()
            .route("/", delete(record("/", seen.clone())))
            .route("/messages/", delete(record("/messages/", seen.clone())));
        let addr = serve(app).await;

        let client = api(
            addr,
            Some(BasicCredentials {
                username: "admin".into(),
                password: "secret".into(),
            }),
        );
        client.call(RestCall::ClearMessages).await.unwrap();
        client.call(RestCall::Terminate).await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "/messages/");
        assert_eq!(seen[1].0, "/");
        // base64("admin:secret")
        assert_eq!(seen[0].1.as_deref(), Some("Basic YWRtaW46c2VjcmV0"));
    }
}
