//! Section-data route: cached article sections rewritten for a width.

use std::sync::Arc;

use super::{ARTICLE_NAMESPACE, SchemeHandler};
use crate::response::Payload;
use folio_core::{Article, Error, SectionDataResponse, SectionRecord};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

impl SchemeHandler {
    pub(super) async fn section_data(&self, key: &str, width: u32) -> Result<Payload, Error> {
        if width == 0 {
            return Err(Error::NotFound("width must be positive".into()));
        }
        let article = self
            .article(key)
            .await
            .ok_or_else(|| Error::NotFound(format!("article {key} is not cached")))?;

        let records = article
            .sections
            .iter()
            .filter_map(|section| {
                let text = self.rewriter.rewrite(&section.html, &article.base_url, width);
                (!text.trim().is_empty()).then(|| SectionRecord::new(section, text))
            })
            .collect();

        let body = serde_json::to_vec(&SectionDataResponse::new(records))?;
        Ok(Payload::ok(JSON_CONTENT_TYPE, body))
    }

    /// Article from the in-memory cache, else from the object store.
    async fn article(&self, key: &str) -> Option<Arc<Article>> {
        if let Some(hit) = self.articles.lock().await.get(key) {
            return Some(Arc::clone(hit));
        }

        let store = self.objects.as_ref()?;
        let bytes = match store.load(ARTICLE_NAMESPACE, key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("failed to load persisted article {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_slice::<Article>(&bytes) {
            Ok(article) => {
                tracing::debug!("article {} restored from object store", key);
                let article = Arc::new(article);
                self.articles
                    .lock()
                    .await
                    .put(key.to_string(), Arc::clone(&article));
                Some(article)
            }
            Err(e) => {
                tracing::warn!("discarding unreadable persisted article {}: {}", key, e);
                None
            }
        }
    }
}
