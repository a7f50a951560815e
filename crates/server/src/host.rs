//! Loopback HTTP host standing in for the embedded renderer.
//!
//! Every request that is not a control route becomes an intercepted task for
//! `<scheme>://<host><path>?<query>`. The task's events are turned back into
//! an HTTP response: the head answers the request, data chunks stream as the
//! body, and a failure before the head becomes a JSON error. Dropping the
//! response (client disconnect) stops the task.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use axum::routing::{delete, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::HostError;
use folio_client::{InterceptedTask, ResponseHead, SchemeHandler, SchemeRequest, TaskId, TaskSink};
use folio_core::{Article, Error};

/// Headers that describe the upstream connection rather than the payload.
const SKIPPED_HEADERS: [&str; 3] = ["connection", "content-length", "transfer-encoding"];

#[derive(Clone)]
pub struct HostState {
    handler: SchemeHandler,
    next_id: Arc<AtomicU64>,
}

impl HostState {
    pub fn new(handler: SchemeHandler) -> Self {
        Self { handler, next_id: Arc::new(AtomicU64::new(1)) }
    }

    fn scheme_url(&self, uri: &Uri) -> Result<Url, HostError> {
        let urls = &self.handler.config().urls;
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        Url::parse(&format!("{}://{}{}", urls.scheme(), urls.host(), path))
            .map_err(|e| HostError::BadRequest(format!("{path}: {e}")))
    }
}

pub fn router(state: HostState) -> Router {
    Router::new()
        .route("/_articles", post(cache_article))
        .route("/_caches", delete(clear_caches))
        .fallback(intercept)
        .with_state(state)
}

async fn cache_article(State(state): State<HostState>, Json(article): Json<Article>) -> StatusCode {
    tracing::info!("caching article {} ({} sections)", article.key, article.sections.len());
    state.handler.cache_article(article).await;
    StatusCode::NO_CONTENT
}

async fn clear_caches(State(state): State<HostState>) -> StatusCode {
    state.handler.clear_caches().await;
    StatusCode::NO_CONTENT
}

async fn intercept(State(state): State<HostState>, request: Request) -> Result<Response, HostError> {
    let (parts, _body) = request.into_parts();
    let url = state.scheme_url(&parts.uri)?;
    let id = TaskId(state.next_id.fetch_add(1, Ordering::Relaxed));

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink { head: Mutex::new(Some(head_tx)), body: Mutex::new(Some(body_tx)) });

    state.handler.start(InterceptedTask {
        id,
        request: SchemeRequest { url, method: parts.method.to_string(), headers },
        sink,
    });
    let guard = StopOnDrop { handler: state.handler.clone(), id };

    let head = match head_rx.await {
        Ok(Ok(head)) => head,
        Ok(Err(failure)) => return Err(failure),
        Err(_) => return Err(HostError::Internal(format!("{id} ended without a response"))),
    };

    let body = futures_util::stream::unfold((body_rx, guard), |(mut rx, guard)| async move {
        let item = rx.recv().await?;
        Some((item.map_err(|e| std::io::Error::other(e.to_string())), (rx, guard)))
    });

    let mut response = Response::builder().status(StatusCode::from_u16(head.status).unwrap_or(StatusCode::OK));
    for (name, value) in &head.headers {
        if SKIPPED_HEADERS.iter().any(|skip| name.eq_ignore_ascii_case(skip)) {
            continue;
        }
        response = response.header(name, value);
    }
    response
        .body(Body::from_stream(body))
        .map_err(|e| HostError::Internal(e.to_string()))
}

/// Task sink feeding one HTTP exchange.
struct ChannelSink {
    head: Mutex<Option<oneshot::Sender<Result<ResponseHead, HostError>>>>,
    body: Mutex<Option<mpsc::UnboundedSender<Result<Bytes, HostError>>>>,
}

impl ChannelSink {
    fn take_head(&self) -> Option<oneshot::Sender<Result<ResponseHead, HostError>>> {
        self.head.lock().ok().and_then(|mut slot| slot.take())
    }

    fn close_body(&self) -> Option<mpsc::UnboundedSender<Result<Bytes, HostError>>> {
        self.body.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl TaskSink for ChannelSink {
    fn did_receive_response(&self, _id: TaskId, head: &ResponseHead) {
        if let Some(tx) = self.take_head() {
            let _ = tx.send(Ok(head.clone()));
        }
    }

    fn did_receive_data(&self, _id: TaskId, data: &Bytes) {
        if let Ok(slot) = self.body.lock()
            && let Some(tx) = slot.as_ref()
        {
            let _ = tx.send(Ok(data.clone()));
        }
    }

    fn did_finish(&self, _id: TaskId) {
        self.close_body();
    }

    fn did_fail(&self, id: TaskId, error: &Error) {
        tracing::debug!("{} failed: {}", id, error);
        let body = self.close_body();
        match self.take_head() {
            Some(tx) => {
                let _ = tx.send(Err(HostError::from(error)));
            }
            None => {
                if let Some(tx) = body {
                    let _ = tx.send(Err(HostError::from(error)));
                }
            }
        }
    }
}

/// Stops the task when the HTTP exchange is dropped.
struct StopOnDrop {
    handler: SchemeHandler,
    id: TaskId,
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.handler.stop(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_client::{HandlerConfig, OutboundRequest, StreamingResponse, Transport};
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Transport whose requests never complete.
    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn start(&self, _request: OutboundRequest) -> Result<StreamingResponse, Error> {
            std::future::pending().await
        }
    }

    fn create_test_app(assets: &std::path::Path) -> (Router, SchemeHandler) {
        let config = HandlerConfig { asset_root: assets.to_path_buf(), ..Default::default() };
        let handler = SchemeHandler::new(config, Arc::new(Stalled));
        (router(HostState::new(handler.clone())), handler)
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn article_json() -> serde_json::Value {
        json!({
            "key": "Rust",
            "base_url": "https://en.example.org/wiki/Rust",
            "sections": [
                {"id": 0, "line": "", "level": 1, "anchor": "", "html": "<p>Lead</p>"},
                {"id": 1, "line": "History", "level": 2, "anchor": "History", "html": "<img src=\"a.jpg\">"}
            ]
        })
    }

    async fn post_article(app: &Router) -> StatusCode {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/_articles")
            .header("content-type", "application/json")
            .body(Body::from(article_json().to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_serves_bundled_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        let (app, _) = create_test_app(dir.path());

        let response = app.oneshot(get("/file/app.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("content-type").unwrap(), "text/css");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"body{}");
    }

    #[tokio::test]
    async fn test_missing_file_is_json_404() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path());

        let response = app.oneshot(get("/file/missing.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_root_is_unroutable() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path());

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "UNROUTABLE");
    }

    #[tokio::test]
    async fn test_section_data_after_posting_article() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path());
        let uri = "/article-section-data?key=Rust&width=320";

        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(post_article(&app).await, StatusCode::NO_CONTENT);

        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let sections = json["mobileview"]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert!(sections[1]["text"].as_str().unwrap().contains("app://host/"));
    }

    #[tokio::test]
    async fn test_clear_caches_route() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = create_test_app(dir.path());
        post_article(&app).await;

        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/_caches")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/article-section-data?key=Rust&width=320")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_caches_keeps_persisted_articles() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(folio_core::CacheDb::open_in_memory().await.unwrap());
        let config = HandlerConfig { asset_root: dir.path().to_path_buf(), ..Default::default() };
        let handler = SchemeHandler::new(config, Arc::new(Stalled)).with_object_store(db);
        let app = router(HostState::new(handler));
        post_article(&app).await;

        let request = axum::http::Request::builder()
            .method("DELETE")
            .uri("/_caches")
            .body(Body::empty())
            .unwrap();
        assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/article-section-data?key=Rust&width=320")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["mobileview"]["sections"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_request_stops_task() {
        let dir = tempfile::tempdir().unwrap();
        let (app, handler) = create_test_app(dir.path());
        let original = Url::parse("https://upload.example.org/a.png").unwrap();
        let proxied = folio_client::SchemeUrls::default().proxy_url(&original);

        let pending = tokio::spawn(app.oneshot(get(proxied.path())));
        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.active_tasks().await == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        pending.abort();
        tokio::time::timeout(Duration::from_secs(5), async {
            while handler.active_tasks().await != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
