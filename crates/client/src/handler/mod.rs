//! Request dispatcher for the synthetic scheme.
//!
//! [`SchemeHandler::start`] registers a task, classifies its URL and spawns a
//! worker for the route. Workers never touch the renderer directly: every
//! event goes through the [`TaskManager`], so a task stopped mid-fetch sees
//! nothing further even if the worker finishes later.
//!
//! ### Routes
//! - `file/<path>` - bundled asset from `asset_root`, cached by path
//! - `article-section-data` - article sections rewritten for a width
//! - `api/<host>/<seg1>/<seg2>` - streamed from `https://<host>/<seg1>/<seg2>`
//! - anything else - opaque proxy, shared response cache first

mod files;
mod proxy;
mod sections;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::fetch::{Transport, UrlError};
use crate::response::Payload;
use crate::rewrite::{ImagePolicy, ImageRewriter};
use crate::route::{Route, SchemeUrls, classify};
use crate::task::{InterceptedTask, SchemeRequest, TaskId, TaskManager};
use folio_core::{AppConfig, Article, Error, FifoCache, ObjectStore, ResponseStore};

/// Object store namespace for persisted articles.
pub const ARTICLE_NAMESPACE: &str = "articles";

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Directory bundled assets are served from.
    pub asset_root: PathBuf,
    /// Capacity of the bundled-file cache.
    pub response_cache_capacity: usize,
    /// Capacity of the in-memory article cache.
    pub article_cache_capacity: usize,
    /// Value of the `X-Client-Version` header on API requests.
    pub client_version_header: String,
    pub urls: SchemeUrls,
    pub policy: ImagePolicy,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("./assets"),
            response_cache_capacity: 6,
            article_cache_capacity: 6,
            client_version_header: format!("folio/{}", env!("CARGO_PKG_VERSION")),
            urls: SchemeUrls::default(),
            policy: ImagePolicy::default(),
        }
    }
}

impl HandlerConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, UrlError> {
        Ok(Self {
            asset_root: config.asset_root.clone(),
            response_cache_capacity: config.response_cache_capacity,
            article_cache_capacity: config.article_cache_capacity,
            client_version_header: config.client_version_header.clone(),
            urls: SchemeUrls::new(&config.scheme, &config.scheme_host)?,
            policy: ImagePolicy {
                min_gallery_width: config.min_gallery_width,
                min_gallery_height: config.min_gallery_height,
            },
        })
    }
}

/// Interceptor for one hosting view.
///
/// Owns its caches and its set of active tasks. Clones share both.
#[derive(Clone)]
pub struct SchemeHandler {
    config: Arc<HandlerConfig>,
    tasks: TaskManager,
    transport: Arc<dyn Transport>,
    responses: Option<Arc<dyn ResponseStore>>,
    objects: Option<Arc<dyn ObjectStore>>,
    files: Arc<Mutex<FifoCache<String, Payload>>>,
    articles: Arc<Mutex<FifoCache<String, Arc<Article>>>>,
    rewriter: ImageRewriter,
}

impl SchemeHandler {
    /// Create a handler. Must be called inside a tokio runtime.
    pub fn new(config: HandlerConfig, transport: Arc<dyn Transport>) -> Self {
        let files = FifoCache::new(config.response_cache_capacity);
        let articles = FifoCache::new(config.article_cache_capacity);
        let rewriter = ImageRewriter::new(config.policy, config.urls.clone());

        Self {
            config: Arc::new(config),
            tasks: TaskManager::spawn(),
            transport,
            responses: None,
            objects: None,
            files: Arc::new(Mutex::new(files)),
            articles: Arc::new(Mutex::new(articles)),
            rewriter,
        }
    }

    /// Replay opaque-proxy requests from `store` when it has them.
    pub fn with_response_store(mut self, store: Arc<dyn ResponseStore>) -> Self {
        self.responses = Some(store);
        self
    }

    /// Persist cached articles to `store` and fall back to it on a miss.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(store);
        self
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Begin serving `task`. Returns immediately; all results arrive through
    /// the task's sink.
    pub fn start(&self, task: InterceptedTask) {
        let InterceptedTask { id, request, sink } = task;
        self.tasks.register(id, sink);

        let route = classify(&request.url);
        tracing::debug!("{} {} {} -> {}", id, request.method, request.url, route.kind());

        if route == Route::Unroutable {
            self.tasks.deliver(id, Err(Error::Unroutable(request.url.to_string())));
            return;
        }

        let handler = self.clone();
        let worker = tokio::spawn(async move { handler.serve(id, route, request).await });
        self.tasks.attach(id, worker.abort_handle());
    }

    /// Stop `id`: no further events are delivered and its worker is aborted.
    pub fn stop(&self, id: TaskId) {
        self.tasks.cancel(id);
    }

    /// Number of tasks that have not yet finished, failed or been stopped.
    pub async fn active_tasks(&self) -> usize {
        self.tasks.active_count().await
    }

    /// Make `article` available to section-data requests.
    ///
    /// Persisting to the object store is best-effort.
    pub async fn cache_article(&self, article: Article) {
        let article = Arc::new(article);
        let evicted = self
            .articles
            .lock()
            .await
            .put(article.key.clone(), Arc::clone(&article));
        if let Some(evicted) = evicted {
            tracing::debug!("article cache evicted {}", evicted);
        }

        let Some(store) = &self.objects else {
            return;
        };
        match serde_json::to_vec(article.as_ref()) {
            Ok(bytes) => {
                if let Err(e) = store.save(ARTICLE_NAMESPACE, &article.key, &bytes).await {
                    tracing::warn!("failed to persist article {}: {}", article.key, e);
                }
            }
            Err(e) => tracing::warn!("failed to serialize article {}: {}", article.key, e),
        }
    }

    /// Drop every cached file and article held in memory.
    ///
    /// Persisted stores are left alone: an article saved to the object store
    /// is restored into the FIFO on its next section-data request.
    pub async fn clear_caches(&self) {
        self.files.lock().await.clear();
        self.articles.lock().await.clear();
    }

    async fn serve(self, id: TaskId, route: Route, request: SchemeRequest) {
        match route {
            Route::File { path } => {
                let outcome = self.load_file(&path).await;
                self.tasks.deliver(id, outcome.map(Some));
            }
            Route::SectionData { key, width } => {
                let outcome = self.section_data(&key, width).await;
                self.tasks.deliver(id, outcome.map(Some));
            }
            Route::ApiProxy { host, path } => match self.api_request(&host, &path, &request) {
                Ok(outbound) => self.stream(id, outbound).await,
                Err(e) => self.tasks.fail(id, e),
            },
            Route::OpaqueProxy { url } => self.proxy(id, url, &request).await,
            Route::Unroutable => self.tasks.deliver(id, Err(Error::Unroutable(request.url.to_string()))),
        }
    }
}
