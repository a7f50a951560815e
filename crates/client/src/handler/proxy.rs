//! API and opaque proxy routes.

use futures_util::StreamExt;
use url::Url;

use super::SchemeHandler;
use crate::fetch::OutboundRequest;
use crate::response::Payload;
use crate::task::{SchemeRequest, TaskId};
use folio_core::Error;

/// Header identifying this client to API hosts.
pub const CLIENT_VERSION_HEADER: &str = "X-Client-Version";

impl SchemeHandler {
    /// `https://<host><path>` with the request's query and headers.
    pub(super) fn api_request(
        &self, host: &str, path: &str, request: &SchemeRequest,
    ) -> Result<OutboundRequest, Error> {
        let mut url = Url::parse(&format!("https://{host}{path}"))
            .map_err(|e| Error::Unroutable(format!("invalid API host {host}: {e}")))?;
        url.set_query(request.url.query());

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(CLIENT_VERSION_HEADER))
            .cloned()
            .collect();
        headers.push((CLIENT_VERSION_HEADER.to_string(), self.config.client_version_header.clone()));

        Ok(OutboundRequest { method: request.method.clone(), url, headers })
    }

    /// Replay `url` from the shared response cache, or stream it.
    pub(super) async fn proxy(&self, id: TaskId, url: Url, request: &SchemeRequest) {
        let outbound = OutboundRequest { method: request.method.clone(), url, headers: request.headers.clone() };

        if let Some(store) = &self.responses
            && outbound.method.eq_ignore_ascii_case("GET")
        {
            match store.lookup(&outbound.cache_key()).await {
                Ok(Some(hit)) => {
                    tracing::debug!("shared cache hit: {}", outbound.url);
                    self.tasks.deliver(id, Ok(Some(Payload::from(hit))));
                    return;
                }
                Ok(None) => tracing::debug!("shared cache miss: {}", outbound.url),
                Err(e) => tracing::warn!("shared cache lookup failed for {}: {}", outbound.url, e),
            }
        }

        self.stream(id, outbound).await;
    }

    /// Forward a streamed fetch to the task: head, chunks in order, then
    /// finish. A non-200 head drops the body and fails the task.
    pub(super) async fn stream(&self, id: TaskId, request: OutboundRequest) {
        let url = request.url.clone();
        let response = match self.transport.start(request).await {
            Ok(response) => response,
            Err(e) => {
                self.tasks.fail(id, e);
                return;
            }
        };

        let status = response.head.status;
        if status != 200 {
            drop(response);
            tracing::debug!("{} returned {}", url, status);
            self.tasks.fail(id, Error::HttpStatus(status));
            return;
        }

        self.tasks.respond(id, response.head);
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => self.tasks.send_data(id, bytes),
                Err(e) => {
                    self.tasks.fail(id, e);
                    return;
                }
            }
        }
        self.tasks.finish(id);
    }
}
