//! Bundled asset route.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::SchemeHandler;
use crate::response::Payload;
use folio_core::Error;

impl SchemeHandler {
    /// Serve `path` from the asset root, consulting the file cache first.
    pub(super) async fn load_file(&self, path: &str) -> Result<Payload, Error> {
        let relative = confined_path(path).ok_or_else(|| Error::NotFound(format!("refusing asset path {path}")))?;

        if let Some(hit) = self.files.lock().await.get(path) {
            tracing::debug!("file cache hit: {}", path);
            return Ok(hit.clone());
        }

        let full = self.config.asset_root.join(&relative);
        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| file_error(e, path))?;
        if !metadata.is_file() {
            return Err(Error::NotFound(format!("{path} is not a file")));
        }

        let bytes = tokio::fs::read(&full).await.map_err(|e| file_error(e, path))?;
        let payload = Payload::ok(content_type_for(&relative), bytes);

        if let Some(evicted) = self.files.lock().await.put(path.to_string(), payload.clone()) {
            tracing::debug!("file cache evicted {}", evicted);
        }
        Ok(payload)
    }
}

/// `path` as a relative path that cannot leave the asset root.
///
/// Rejects empty, `.` and `..` components, absolute paths and backslashes.
fn confined_path(path: &str) -> Option<PathBuf> {
    if path.is_empty() || path.contains(['\\', '\0']) {
        return None;
    }

    let mut relative = PathBuf::new();
    for component in path.split('/') {
        if component.is_empty() || component == "." || component == ".." || component.contains(':') {
            return None;
        }
        relative.push(component);
    }
    Some(relative)
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("css") => "text/css",
        Some("html") => "text/html",
        Some("js") => "application/javascript",
        _ => "",
    }
}

fn file_error(err: std::io::Error, path: &str) -> Error {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => Error::NotFound(format!("no asset at {path}")),
        _ => Error::Io(err),
    }
}
