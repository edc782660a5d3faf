//! An HTTP transport for checkpointed agent-thread servers.
//!
//! Thread CRUD and history fetch go over plain request/response
//! endpoints; turn invocation opens a server-sent event stream that is
//! surfaced as a [`TurnStream`](weft_protocol::TurnStream).

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod stream;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};
use weft_protocol::{
    AgentListResponse, AgentTransport, CreateThreadResponse, ErrorKind, ThreadInfo, ThreadItem,
    ThreadService, TransportError, TurnRequest,
};

pub use config::{ClientConfig, ClientConfigBuilder};
use io::Sse;
pub use stream::HttpTurnStream;

/// Error type for [`AgentClient`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl TransportError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Classifies an unsuccessful HTTP status.
///
/// Client errors will not succeed on retry, except for rate limiting;
/// everything else (server errors, gateway hiccups) is worth retrying.
fn classify_status(status: StatusCode) -> ErrorKind {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        ErrorKind::Fatal
    } else {
        ErrorKind::Retriable
    }
}

/// Client for an agent-thread server.
#[derive(Clone, Debug)]
pub struct AgentClient {
    client: Client,
    config: Arc<ClientConfig>,
}

impl AgentClient {
    /// Creates a new `AgentClient` with the given configuration.
    #[inline]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn agent_query(&self) -> Vec<(&'static str, String)> {
        self.config
            .agent
            .iter()
            .map(|agent| ("agentBeanName", agent.clone()))
            .collect()
    }

    async fn expect_success(
        resp: reqwest::Result<Response>,
        what: &str,
    ) -> Result<Response, Error> {
        let resp = resp.map_err(|err| Error::new(format!("{what}: {err}"), ErrorKind::Other))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::new(
                format!("{what}: HTTP {status}"),
                classify_status(status),
            ));
        }
        Ok(resp)
    }
}

impl ThreadService for AgentClient {
    type Error = Error;

    async fn list_agents(&self) -> Result<Vec<String>, Error> {
        let resp = self.client.get(self.endpoint("/agents/list")).send().await;
        let resp: AgentListResponse = Self::expect_success(resp, "listing agents")
            .await?
            .json()
            .await
            .map_err(|err| Error::new(format!("listing agents: {err}"), ErrorKind::Other))?;
        Ok(resp.agents)
    }

    fn selected_agent(&self) -> Option<String> {
        self.config.agent.clone()
    }

    fn select_agent(&mut self, agent: Option<&str>) {
        Arc::make_mut(&mut self.config).agent = agent.map(str::to_owned);
    }

    async fn list_threads(&self) -> Result<Vec<ThreadInfo>, Error> {
        let resp = self
            .client
            .get(self.endpoint("/thread/list"))
            .query(&self.agent_query())
            .send()
            .await;
        Self::expect_success(resp, "listing threads")
            .await?
            .json()
            .await
            .map_err(|err| Error::new(format!("listing threads: {err}"), ErrorKind::Other))
    }

    async fn create_thread(&self, title: &str) -> Result<CreateThreadResponse, Error> {
        let body = proto::CreateThreadBody {
            title,
            agent_bean_name: self.config.agent.as_deref(),
        };
        let resp = self
            .client
            .post(self.endpoint("/thread/create"))
            .json(&body)
            .send()
            .await;
        Self::expect_success(resp, "creating thread")
            .await?
            .json()
            .await
            .map_err(|err| Error::new(format!("creating thread: {err}"), ErrorKind::Other))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), Error> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("/thread/{thread_id}")))
            .send()
            .await;
        Self::expect_success(resp, "deleting thread").await?;
        Ok(())
    }

    async fn rename_thread(&self, thread_id: &str, title: &str) -> Result<(), Error> {
        let body = proto::RenameThreadBody { thread_id, title };
        let resp = self
            .client
            .post(self.endpoint("/thread/updateTitle"))
            .json(&body)
            .send()
            .await;
        Self::expect_success(resp, "renaming thread").await?;
        Ok(())
    }

    async fn thread_items(&self, thread_id: &str) -> Result<Vec<ThreadItem>, Error> {
        let resp = self
            .client
            .get(self.endpoint(&format!("/thread/items/{thread_id}")))
            .query(&self.agent_query())
            .send()
            .await;
        Self::expect_success(resp, "fetching thread items")
            .await?
            .json()
            .await
            .map_err(|err| Error::new(format!("fetching thread items: {err}"), ErrorKind::Other))
    }
}

impl AgentTransport for AgentClient {
    type Error = Error;
    type Stream = HttpTurnStream;

    fn run_turn(
        &self,
        req: &TurnRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static {
        let client = self.client.clone();
        let url = self.endpoint("/chat/stream");
        let body = proto::turn_body(req, &self.config);

        async move {
            let backoff = ExponentialBackoff {
                max_elapsed_time: Some(Duration::from_secs(30)),
                ..Default::default()
            };
            let resp = backoff::future::retry(backoff, || {
                let attempt = client
                    .post(&url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::ACCEPT, "text/event-stream")
                    .json(&body)
                    .send();
                async move {
                    let resp = attempt.await.map_err(|err| {
                        backoff::Error::transient(Error::new(
                            format!("opening event stream: {err}"),
                            ErrorKind::Retriable,
                        ))
                    })?;
                    let status = resp.status();
                    if !status.is_success() {
                        let kind = classify_status(status);
                        let err =
                            Error::new(format!("opening event stream: HTTP {status}"), kind);
                        warn!("failed to open event stream: HTTP {status} ({kind:?})");
                        return Err(match kind {
                            ErrorKind::Fatal => backoff::Error::permanent(err),
                            _ => backoff::Error::transient(err),
                        });
                    }
                    Ok(resp)
                }
            })
            .await?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.type_() == mime::TEXT && m.subtype() == mime::EVENT_STREAM)
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Fatal,
                ));
            }

            Ok(HttpTurnStream::from_sse(Sse::from_response(resp)))
        }
    }
}
