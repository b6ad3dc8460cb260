//! Static file stage and SPA entry file for the bundled client.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::state::AppState;

/// Location of the client build on disk.
#[derive(Clone, Debug)]
pub struct ClientAssets {
    root: Arc<PathBuf>,
}

impl ClientAssets {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: Arc::new(root.as_ref().to_path_buf()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> PathBuf {
        self.root.join("index.html")
    }

    /// Maps a request path onto the asset directory.
    ///
    /// Returns `None` for anything that could escape the root (`..`, backslashes, encoded
    /// traversal, null bytes) and for the bare root itself.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        if contains_path_traversal(request_path) {
            return None;
        }
        let relative = Path::new(request_path.trim_start_matches('/'));
        if relative.as_os_str().is_empty() {
            return None;
        }
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Regular file (not directory) for the request path, if one exists.
    ///
    /// The raw path is screened for encoded traversal before it is percent-decoded, so
    /// `/my%20logo.png` finds `my logo.png` while `/%2e%2e/secret` never does.
    pub async fn file_for(&self, request_path: &str) -> Option<PathBuf> {
        if contains_path_traversal(request_path) {
            return None;
        }
        let decoded = urlencoding::decode(request_path).ok()?;
        let path = self.resolve(&decoded)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }

    pub async fn has_index(&self) -> bool {
        matches!(tokio::fs::metadata(self.index()).await, Ok(meta) if meta.is_file())
    }
}

fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.starts_with("..") || path.contains('\\') || path.contains('\0') {
        return true;
    }

    // URL-encoded variants (single and double encoding)
    let encoded_patterns = ["%2e", "%252e", "%2f", "%5c", "%00"];
    encoded_patterns.iter().any(|pattern| lower.contains(pattern))
}

fn is_read(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

/// Serves a file from the client build when the request path names one; otherwise the
/// request continues down the pipeline untouched.
pub async fn serve_static(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_read(req.method()) {
        return next.run(req).await;
    }
    match state.client.file_for(req.uri().path()).await {
        Some(file) => send_file(file, req).await,
        None => next.run(req).await,
    }
}

/// Responds with the SPA entry file when the request is a read and the client build has one.
/// Hands the request back otherwise.
pub async fn serve_index(client: &ClientAssets, req: Request) -> Result<Response, Request> {
    if is_read(req.method()) && client.has_index().await {
        Ok(send_file(client.index(), req).await)
    } else {
        Err(req)
    }
}

async fn send_file(path: PathBuf, req: Request) -> Response {
    match ServeFile::new(path).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}
