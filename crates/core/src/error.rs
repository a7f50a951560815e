//! Unified error types for the scheme interceptor.
//!
//! Every failure is scoped to a single intercepted task. The renderer only
//! ever sees a failed load, so each variant maps onto an HTTP status via
//! [`Error::status_code`].

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the dispatcher, transport and stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unsupported synthetic URL.
    #[error("UNROUTABLE: {0}")]
    Unroutable(String),

    /// Missing local file, missing cached article, or invalid query parameter.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The underlying fetch failed (connect, TLS, read, timeout).
    #[error("TRANSPORT_FAILURE: {0}")]
    TransportFailure(String),

    /// Upstream replied with something that is not a usable HTTP response.
    #[error("UNEXPECTED_RESPONSE: {0}")]
    UnexpectedResponse(String),

    /// Upstream replied with a status other than 200.
    #[error("HTTP_STATUS: {0}")]
    HttpStatus(u16),

    /// Section data could not be assembled into JSON.
    #[error("SERIALIZATION_FAILURE: {0}")]
    SerializationFailure(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Local filesystem error outside of the not-found case.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status reported to the renderer for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Unroutable(_) | Error::NotFound(_) | Error::SerializationFailure(_) => 404,
            Error::HttpStatus(status) => *status,
            Error::TransportFailure(_) | Error::UnexpectedResponse(_) => 502,
            Error::Database(_) | Error::MigrationFailed(_) | Error::Io(_) => 500,
        }
    }

    /// Stable machine-readable code, matching the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unroutable(_) => "UNROUTABLE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::TransportFailure(_) => "TRANSPORT_FAILURE",
            Error::UnexpectedResponse(_) => "UNEXPECTED_RESPONSE",
            Error::HttpStatus(_) => "HTTP_STATUS",
            Error::SerializationFailure(_) => "SERIALIZATION_FAILURE",
            Error::Database(_) | Error::MigrationFailed(_) => "CACHE_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the renderer should treat this as a plain 404.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("article Foo".to_string());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(err.to_string().contains("article Foo"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unroutable("x".into()).status_code(), 404);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::SerializationFailure("x".into()).status_code(), 404);
        assert_eq!(Error::HttpStatus(503).status_code(), 503);
        assert_eq!(Error::TransportFailure("x".into()).status_code(), 502);
        assert_eq!(Error::UnexpectedResponse("x".into()).status_code(), 502);
        assert_eq!(Error::MigrationFailed("x".into()).status_code(), 500);
    }

    #[test]
    fn test_code_matches_display_prefix() {
        let errors = [
            Error::Unroutable("x".into()),
            Error::HttpStatus(418),
            Error::MigrationFailed("x".into()),
            Error::Io(std::io::Error::other("x")),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::Unroutable("x".into()).is_not_found());
        assert!(!Error::TransportFailure("x".into()).is_not_found());
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::SerializationFailure(_)));
    }
}
