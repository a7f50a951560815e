//! Streaming HTTP fetch pipeline.
//!
//! ### Streaming
//! - The response head is returned as soon as headers arrive.
//! - Body chunks are pumped by a background task into a bounded channel.
//!   Dropping the returned body stream stops the pump, which drops the
//!   underlying connection.
//!
//! ### Shared cache
//! - Complete `200` responses to `GET` requests are written to the shared
//!   response cache once the body has been read, up to `max_bytes`.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, Method, header};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub use self::url::{UrlError, canonicalize, parse_absolute};

use crate::response::ResponseHead;
use folio_core::cache::hash::compute_request_key;
use folio_core::{AppConfig, Error, ResponseStore, StoredResponse};

/// Chunks buffered between the network pump and the consumer.
const BODY_CHANNEL_DEPTH: usize = 16;

/// Progressive response body.
pub type BodyStream = BoxStream<'static, Result<Bytes, Error>>;

/// Request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: ::url::Url,
    pub headers: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn get(url: ::url::Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new() }
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Key of this request in the shared response cache.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.method, self.url.as_str(), self.header("accept").unwrap_or(""))
    }
}

/// A response whose head has arrived and whose body is still streaming.
pub struct StreamingResponse {
    pub head: ResponseHead,
    pub body: BodyStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse").field("head", &self.head).finish_non_exhaustive()
    }
}

/// Streaming fetch primitive.
///
/// Cancellation is by drop: dropping the future or the body stream stops
/// the underlying request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start(&self, request: OutboundRequest) -> Result<StreamingResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "folio/0.1")
    pub user_agent: String,

    /// Largest body copied into the shared cache (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "folio/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Transport`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    store: Option<Arc<dyn ResponseStore>>,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::TransportFailure(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config, store: None })
    }

    /// Write completed `200 GET` responses to `store`.
    pub fn with_response_store(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn build(&self, request: &OutboundRequest) -> Result<reqwest::RequestBuilder, Error> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::UnexpectedResponse(format!("invalid method {}: {}", request.method, e)))?;

        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let (Ok(name), Ok(value)) =
                (header::HeaderName::from_bytes(name.as_bytes()), header::HeaderValue::from_str(value))
            else {
                tracing::debug!("dropping unrepresentable header {}", name);
                continue;
            };
            if name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            headers.append(name, value);
        }

        Ok(self.http.request(method, request.url.as_str()).headers(headers))
    }
}

#[async_trait]
impl Transport for FetchClient {
    async fn start(&self, request: OutboundRequest) -> Result<StreamingResponse, Error> {
        let request = OutboundRequest { url: canonicalize(request.url), ..request };

        let response = self
            .build(&request)?
            .send()
            .await
            .map_err(|e| Error::TransportFailure(format!("network error: {}", e)))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect::<Vec<_>>();
        let head = ResponseHead { status: status.as_u16(), headers };

        tracing::debug!("{} {} -> {}", request.method, request.url, status.as_u16());

        let capture = match &self.store {
            Some(store) if status.as_u16() == 200 && request.method.eq_ignore_ascii_case("GET") => {
                let max_bytes = self.config.max_bytes;
                Some(Capture { store: Arc::clone(store), request, head: head.clone(), max_bytes })
            }
            _ => None,
        };

        let (tx, rx) = mpsc::channel(BODY_CHANNEL_DEPTH);
        tokio::spawn(pump(response, tx, capture));

        let body = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });

        Ok(StreamingResponse { head, body: body.boxed() })
    }
}

/// Pending write of a streamed response into the shared cache.
struct Capture {
    store: Arc<dyn ResponseStore>,
    request: OutboundRequest,
    head: ResponseHead,
    max_bytes: usize,
}

async fn pump(response: reqwest::Response, tx: mpsc::Sender<Result<Bytes, Error>>, capture: Option<Capture>) {
    let mut chunks = response.bytes_stream();
    let mut copy = capture.as_ref().map(|_| Vec::new());

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => {
                if let Some(cap) = capture.as_ref() {
                    let overflow = copy.as_ref().is_some_and(|buf| buf.len() + bytes.len() > cap.max_bytes);
                    if overflow {
                        tracing::debug!("{} exceeds {} bytes, not caching", cap.request.url, cap.max_bytes);
                        copy = None;
                    } else if let Some(buf) = copy.as_mut() {
                        buf.extend_from_slice(&bytes);
                    }
                }
                if tx.send(Ok(bytes)).await.is_err() {
                    tracing::debug!("body receiver dropped, abandoning fetch");
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(Error::TransportFailure(format!("failed to read response: {}", e)))).await;
                return;
            }
        }
    }
    drop(tx);

    if let (Some(body), Some(cap)) = (copy, capture) {
        let stored = StoredResponse {
            key: cap.request.cache_key(),
            method: cap.request.method.to_ascii_uppercase(),
            url: cap.request.url.to_string(),
            status: cap.head.status,
            headers: cap.head.headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = cap.store.store(&stored).await {
            tracing::warn!("failed to cache response for {}: {}", stored.url, e);
        }
    }
}
