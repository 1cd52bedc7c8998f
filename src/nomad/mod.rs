//! Client for the Nomad HTTP API.
//!
//! Request/response endpoints decode into the types in [`crate::models`].
//! Streaming endpoints (logs, events) and the exec websocket are pumped by
//! background tasks into bounded channels; see [`stream`] and [`exec`].

pub mod exec;
pub mod stream;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{
    AllocResourceUsage, AllocStub, FrameError, JobStub, LogKind, NomadConfig, Topics,
};

pub use exec::ExecSession;
pub use stream::{EventsStream, LogsStream};

const TOKEN_HEADER: &str = "X-Nomad-Token";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from talking to the Nomad API
#[derive(Debug, thiserror::Error)]
pub enum NomadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Nomad returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tokio_tungstenite::tungstenite::Error>),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("invalid client configuration: {0}")]
    Config(String),

    #[error("stream closed")]
    StreamClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for NomadError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        NomadError::WebSocket(Box::new(err))
    }
}

pub type NomadResult<T> = Result<T, NomadError>;

/// Cheaply cloneable handle to the Nomad API
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: Client,
    config: NomadConfig,
    base: url::Url,
}

impl NomadClient {
    pub fn new(config: &NomadConfig) -> NomadResult<Self> {
        let base = url::Url::parse(config.address.trim_end_matches('/'))
            .map_err(|e| NomadError::InvalidUrl(format!("{}: {e}", config.address)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(NomadError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                config.address
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value =
                HeaderValue::from_str(token).map_err(|_| NomadError::InvalidHeader(TOKEN_HEADER))?;
            value.set_sensitive(true);
            headers.insert(TOKEN_HEADER, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(config.skip_verify);

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path)
                .map_err(|e| NomadError::Config(format!("reading {}: {e}", path.display())))?;
            let cert = reqwest::Certificate::from_pem(&pem)?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: builder.build()?,
            config: config.clone(),
            base,
        })
    }

    fn endpoint(&self, path: &str) -> url::Url {
        let mut url = self.base.clone();
        url.set_path(path);
        if let Some(region) = self.config.region.as_deref().filter(|r| !r.is_empty()) {
            url.query_pairs_mut().append_pair("region", region);
        }
        url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let mut request = self.http.get(self.endpoint(path));
        if let Some(auth) = self.config.http_auth.as_deref() {
            let (user, password) = match auth.split_once(':') {
                Some((user, password)) => (user, Some(password)),
                None => (auth, None),
            };
            request = request.basic_auth(user, password);
        }
        request
    }

    /// Send a request and fail on non-success status codes
    async fn send(request: RequestBuilder) -> NomadResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NomadError::Status {
                code: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }

    /// GET a JSON document
    ///
    /// The body is read fully before decoding so that a malformed document is
    /// reported as [`NomadError::Decode`] rather than a transport failure.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> NomadResult<T> {
        debug!(path, "GET");
        let response = Self::send(self.get(path).query(query)).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn jobs(&self) -> NomadResult<Vec<JobStub>> {
        self.get_json("/v1/jobs", &[("namespace", self.config.namespace.as_str())])
            .await
    }

    pub async fn job_allocations(&self, job_id: &str, namespace: &str) -> NomadResult<Vec<AllocStub>> {
        self.get_json(
            &format!("/v1/job/{}/allocations", encode_segment(job_id)),
            &[("namespace", namespace)],
        )
        .await
    }

    pub async fn allocations(&self) -> NomadResult<Vec<AllocStub>> {
        self.get_json("/v1/allocations", &[("namespace", self.config.namespace.as_str())])
            .await
    }

    /// Full job specification, kept as raw JSON for display
    pub async fn job_spec(&self, job_id: &str, namespace: &str) -> NomadResult<serde_json::Value> {
        self.get_json(
            &format!("/v1/job/{}", encode_segment(job_id)),
            &[("namespace", namespace)],
        )
        .await
    }

    pub async fn alloc_spec(&self, alloc_id: &str, namespace: &str) -> NomadResult<serde_json::Value> {
        self.get_json(
            &format!("/v1/allocation/{}", encode_segment(alloc_id)),
            &[("namespace", namespace)],
        )
        .await
    }

    pub async fn alloc_stats(&self, alloc_id: &str, namespace: &str) -> NomadResult<AllocResourceUsage> {
        self.get_json(
            &format!("/v1/client/allocation/{}/stats", encode_segment(alloc_id)),
            &[("namespace", namespace)],
        )
        .await
    }

    fn logs_request(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogKind,
        offset: u64,
        namespace: &str,
        follow: bool,
    ) -> RequestBuilder {
        let offset = offset.to_string();
        self.get(&format!("/v1/client/fs/logs/{}", encode_segment(alloc_id)))
            .query(&[
                ("task", task),
                ("type", kind.as_param()),
                ("origin", "end"),
                ("offset", offset.as_str()),
                ("plain", "true"),
                ("follow", if follow { "true" } else { "false" }),
                ("namespace", namespace),
            ])
    }

    /// The last `offset` bytes of a task log, without following
    pub async fn logs(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogKind,
        offset: u64,
        namespace: &str,
    ) -> NomadResult<String> {
        let request = self.logs_request(alloc_id, task, kind, offset, namespace, false);
        let response = Self::send(request).await?;
        Ok(response.text().await?)
    }

    /// Follow a task log from `offset` bytes before its end
    pub async fn open_logs_stream(
        &self,
        alloc_id: &str,
        task: &str,
        kind: LogKind,
        offset: u64,
        namespace: &str,
    ) -> NomadResult<LogsStream> {
        let request = self.logs_request(alloc_id, task, kind, offset, namespace, true);
        let response = Self::send(request).await?;
        debug!(alloc_id, task, %kind, "log stream opened");
        Ok(LogsStream::spawn(
            response,
            stream::LogSubscription {
                alloc_id: alloc_id.to_string(),
                task: task.to_string(),
                kind,
            },
        ))
    }

    /// Subscribe to the event stream for a topic set
    pub async fn open_events_stream(
        &self,
        topics: &Topics,
        namespace: &str,
        fields: &[String],
    ) -> NomadResult<EventsStream> {
        let mut query = topics.query_pairs();
        query.push(("namespace", namespace.to_string()));
        let response = Self::send(self.get("/v1/event/stream").query(&query)).await?;
        debug!(%topics, namespace, "event stream opened");
        Ok(EventsStream::spawn(response, topics.clone(), fields.to_vec()))
    }

    /// Websocket URL of the exec endpoint for one task
    pub fn exec_url(
        &self,
        alloc_id: &str,
        task: &str,
        namespace: &str,
        command: &[String],
    ) -> NomadResult<url::Url> {
        let mut url = self.endpoint(&format!(
            "/v1/client/allocation/{}/exec",
            encode_segment(alloc_id)
        ));
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| NomadError::InvalidUrl(format!("cannot use scheme {scheme}")))?;
        let command = serde_json::to_string(command)?;
        url.query_pairs_mut()
            .append_pair("task", task)
            .append_pair("tty", "true")
            .append_pair("command", &command)
            .append_pair("namespace", namespace);
        Ok(url)
    }
}

/// Percent-encode one path segment
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
