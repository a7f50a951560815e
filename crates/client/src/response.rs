//! Response metadata and payloads delivered to the renderer.

use bytes::Bytes;
use folio_core::StoredResponse;

/// Status line and headers of a response, delivered before any data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// A `200 OK` with `Content-Type` (when non-empty) and `Content-Length`.
    pub fn ok(content_type: &str, content_length: usize) -> Self {
        let mut headers = Vec::with_capacity(2);
        if !content_type.is_empty() {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }
        headers.push(("Content-Length".to_string(), content_length.to_string()));
        Self { status: 200, headers }
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// A complete response: head plus optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub head: ResponseHead,
    pub body: Option<Bytes>,
}

impl Payload {
    /// A `200 OK` payload carrying `body`.
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self { head: ResponseHead::ok(content_type, body.len()), body: Some(body) }
    }
}

impl From<StoredResponse> for Payload {
    fn from(stored: StoredResponse) -> Self {
        Self {
            head: ResponseHead { status: stored.status, headers: stored.headers },
            body: Some(Bytes::from(stored.body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_head() {
        let head = ResponseHead::ok("text/css", 12);
        assert_eq!(head.status, 200);
        assert_eq!(head.content_type(), Some("text/css"));
        assert_eq!(head.header("content-length"), Some("12"));
    }

    #[test]
    fn test_ok_head_without_content_type() {
        let head = ResponseHead::ok("", 0);
        assert_eq!(head.content_type(), None);
        assert_eq!(head.headers.len(), 1);
    }

    #[test]
    fn test_payload_from_stored() {
        let stored = StoredResponse {
            key: "k".into(),
            method: "GET".into(),
            url: "https://example.org/a.png".into(),
            status: 200,
            headers: vec![("Content-Type".into(), "image/png".into())],
            body: vec![1, 2, 3],
            stored_at: "2026-01-01T00:00:00Z".into(),
        };
        let payload = Payload::from(stored);
        assert_eq!(payload.head.content_type(), Some("image/png"));
        assert_eq!(payload.body.as_deref(), Some(&[1u8, 2, 3][..]));
    }
}
