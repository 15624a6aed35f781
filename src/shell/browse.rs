//! Embedded HTTP file browser behind `browse`/`lbrowse`.
//!
//! Serves one backend's tree read-only on a loopback port. Backend calls
//! block on SSH round-trips, so every handler hops onto a blocking thread
//! before touching them.

use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::Result;
use crate::shell::backend::Backend;
use crate::shell::path;

struct BrowseState {
    backend: Arc<dyn Backend>,
    root: String,
}

/// A running browse server. Dropping it without calling `stop` leaves the
/// task serving until the runtime shuts down.
pub struct BrowseServer {
    pub url: String,
    shutdown: Option<oneshot::Sender<()>>,
}

impl BrowseServer {
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind a loopback listener and serve `root` from `backend`. Called from
/// the shell's blocking thread, hence the explicit runtime handle.
pub fn spawn(handle: &Handle, backend: Arc<dyn Backend>, root: String) -> Result<BrowseServer> {
    let state = Arc::new(BrowseState { backend, root });
    let app = Router::new()
        .route("/", get(serve_root))
        .route("/{*path}", get(serve_path))
        .with_state(state);

    let listener = handle.block_on(TcpListener::bind("127.0.0.1:0"))?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();

    handle.spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = rx.await;
        });
        if let Err(e) = server.await {
            warn!("browse server exited: {}", e);
        }
    });

    Ok(BrowseServer {
        url: format!("http://{}", addr),
        shutdown: Some(tx),
    })
}

enum Fetched {
    Dir(Vec<(String, bool)>),
    File(Vec<u8>),
}

async fn serve_root(State(state): State<Arc<BrowseState>>) -> Response {
    render(state, String::new()).await
}

async fn serve_path(
    State(state): State<Arc<BrowseState>>,
    UrlPath(rel): UrlPath<String>,
) -> Response {
    render(state, rel).await
}

/// Prefix containment with a separator boundary, so a sibling directory
/// whose name merely extends the root's is not considered inside it.
fn within_root(root: &str, abs: &str) -> bool {
    let root = root.trim_end_matches('/');
    abs == root || abs.starts_with(&format!("{}/", root))
}

async fn render(state: Arc<BrowseState>, rel: String) -> Response {
    let abs = path::clean(&path::join(&state.root, &rel));
    if !within_root(&state.root, &abs) {
        return (StatusCode::FORBIDDEN, "path escapes served root").into_response();
    }

    let backend = state.backend.clone();
    let fetch_path = abs.clone();
    let fetched = tokio::task::spawn_blocking(move || -> Result<Fetched> {
        let info = backend.stat(&fetch_path)?;
        if info.is_dir() {
            let entries = backend
                .read_dir(&fetch_path)?
                .into_iter()
                .map(|e| (e.name, e.kind == crate::shell::backend::FileKind::Dir))
                .collect();
            Ok(Fetched::Dir(entries))
        } else {
            let mut reader = backend.open_read(&fetch_path)?;
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut reader, &mut buf)?;
            Ok(Fetched::File(buf))
        }
    })
    .await;

    match fetched {
        Ok(Ok(Fetched::Dir(entries))) => Html(render_listing(&rel, &entries)).into_response(),
        Ok(Ok(Fetched::File(bytes))) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Ok(Err(e)) if e.is_not_found() => (StatusCode::NOT_FOUND, "not found").into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn render_listing(rel: &str, entries: &[(String, bool)]) -> String {
    let mut out = String::from("<!doctype html><meta charset=\"utf-8\"><ul>\n");
    if !rel.is_empty() {
        let parent = match rel.trim_end_matches('/').rfind('/') {
            Some(i) => &rel[..i],
            None => "",
        };
        out.push_str(&format!("<li><a href=\"/{}\">..</a></li>\n", escape(parent)));
    }
    for (name, is_dir) in entries {
        let href = if rel.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", rel.trim_end_matches('/'), name)
        };
        let suffix = if *is_dir { "/" } else { "" };
        out.push_str(&format!(
            "<li><a href=\"/{}\">{}{}</a></li>\n",
            escape(&href),
            escape(name),
            suffix
        ));
    }
    out.push_str("</ul>\n");
    out
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::backend::LocalBackend;

    #[test]
    fn test_within_root_needs_separator_boundary() {
        assert!(within_root("/x/app", "/x/app"));
        assert!(within_root("/x/app", "/x/app/file"));
        assert!(!within_root("/x/app", "/x/application/secret.txt"));
        assert!(within_root("/", "/etc/hosts"));
    }

    #[test]
    fn test_render_rejects_sibling_prefix_escape() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        std::fs::create_dir(&root).unwrap();
        let sibling = dir.path().join("application");
        std::fs::create_dir(&sibling).unwrap();
        std::fs::write(sibling.join("secret.txt"), b"s").unwrap();

        let state = Arc::new(BrowseState {
            backend: Arc::new(LocalBackend),
            root: root.to_str().unwrap().to_string(),
        });
        let resp = rt.block_on(render(state, "../application/secret.txt".to_string()));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_listing_links() {
        let entries = vec![("docs".to_string(), true), ("a.txt".to_string(), false)];
        let html = render_listing("", &entries);
        assert!(html.contains("<a href=\"/docs\">docs/</a>"));
        assert!(html.contains("<a href=\"/a.txt\">a.txt</a>"));
    }

    #[test]
    fn test_listing_parent_link() {
        let html = render_listing("a/b", &[]);
        assert!(html.contains("<a href=\"/a\">..</a>"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
