//! Local preview server for a built output directory.
//!
//! The bootstrap page fetches its bundle with XHR, which browsers refuse on
//! `file://`, so the output has to be served over HTTP to be tried locally.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tiny_http::{Header, Request, Response, Server};

use crate::bootstrap::INDEX_FILE;

/// Serve `dir` on `127.0.0.1:<port>` until the process is stopped.
pub fn run_preview_server(
    dir: &Path,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(("127.0.0.1", port))?;
    eprintln!("preview server");
    eprintln!("  dir:  {}", dir.display());
    eprintln!("  open: http://localhost:{port}/");

    for request in server.incoming_requests() {
        if let Err(e) = handle(dir, request) {
            tracing::warn!(error = %e, "failed to send response");
        }
    }
    Ok(())
}

fn handle(dir: &Path, request: Request) -> std::io::Result<()> {
    let url = request.url().to_string();
    let Some(path) = resolve_request(dir, &url) else {
        tracing::debug!(url = %url, "rejected");
        return request.respond(Response::from_string("bad request").with_status_code(400));
    };

    match fs::read(&path) {
        Ok(bytes) => {
            tracing::debug!(url = %url, bytes = bytes.len(), "200");
            let mut response = Response::from_data(bytes);
            if let Ok(header) = format!("Content-Type: {}", content_type(&path)).parse::<Header>() {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        Err(_) => {
            tracing::debug!(url = %url, "404");
            request.respond(Response::from_string("not found").with_status_code(404))
        }
    }
}

/// Map a request URL onto a file under `dir`. `None` when the URL tries to
/// leave the directory or does not decode to UTF-8.
pub fn resolve_request(dir: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    let path = urlencoding::decode(path).ok()?;
    let rel = path.trim_start_matches('/');
    let rel = if rel.is_empty() || rel.ends_with('/') {
        format!("{rel}{INDEX_FILE}")
    } else {
        rel.to_string()
    };

    let rel = Path::new(&rel);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(dir.join(rel))
}

pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("wasm") => "application/wasm",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
