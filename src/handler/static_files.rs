//! Static file serving module
//!
//! Resolves request paths under the root and loads files, index files and
//! directory listings.

use crate::config::AppState;
use crate::error::ServeError;
use crate::handler::listing;
use crate::handler::router::RequestContext;
use crate::http::{self, date, path};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fs::Metadata;
use std::path::Path;
use tokio::fs;

/// Serve whatever the request path names under the root
pub async fn serve_path(
    ctx: &RequestContext<'_>,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, ServeError> {
    let decoded = path::decode_path(ctx.path)?;
    let target = path::resolve(&state.root, &decoded)?;

    let metadata = fs::metadata(&target)
        .await
        .map_err(|e| ServeError::from_lookup(e, ctx.path))?;
    ensure_within_root(&target, &state.root, ctx.path).await?;

    if metadata.is_dir() {
        return serve_directory(ctx, state, &target, &decoded).await;
    }

    serve_file(ctx, state, &target, &metadata).await
}

/// Serve a directory: redirect to the slash form, then index file, then listing
async fn serve_directory(
    ctx: &RequestContext<'_>,
    state: &AppState,
    dir: &Path,
    decoded: &str,
) -> Result<Response<Full<Bytes>>, ServeError> {
    if !ctx.path.ends_with('/') {
        // A leading `//` would make the location scheme-relative (another host)
        let local = format!("/{}/", ctx.path.trim_start_matches('/'));
        let location = match ctx.query {
            Some(query) => format!("{local}?{query}"),
            None => local,
        };
        return Ok(http::build_redirect_response(&location));
    }

    for index_file in &state.config.http.index_files {
        let index_path = dir.join(index_file);
        if let Ok(metadata) = fs::metadata(&index_path).await {
            if metadata.is_file() {
                ensure_within_root(&index_path, &state.root, ctx.path).await?;
                return serve_file(ctx, state, &index_path, &metadata).await;
            }
        }
    }

    if !state.config.http.directory_listing {
        return Err(ServeError::Forbidden(format!(
            "directory listing disabled: {}",
            ctx.path
        )));
    }

    let entries = listing::read_entries(dir)
        .await
        .map_err(|e| ServeError::from_io(e, ctx.path))?;
    Ok(http::build_html_response(
        listing::render(decoded, &entries),
        ctx.is_head,
    ))
}

/// Serve a single regular file with its MIME type and modification time
async fn serve_file(
    ctx: &RequestContext<'_>,
    state: &AppState,
    file_path: &Path,
    metadata: &Metadata,
) -> Result<Response<Full<Bytes>>, ServeError> {
    // Pipes and devices would block or stream forever
    if !metadata.is_file() {
        return Err(ServeError::Forbidden(format!("not a regular file: {}", ctx.path)));
    }

    let modified = metadata.modified().ok();
    let last_modified = modified.map(date::format_http_date);

    if let (Some(modified), Some(last_modified)) = (modified, last_modified.as_deref()) {
        if date::not_modified_since(modified, ctx.if_modified_since.as_deref()) {
            return Ok(http::build_304_response(last_modified));
        }
    }

    let content = fs::read(file_path)
        .await
        .map_err(|e| ServeError::from_io(e, ctx.path))?;
    let content_type = state.mime.for_path(file_path);

    Ok(http::build_file_response(
        Bytes::from(content),
        content_type,
        last_modified.as_deref(),
        ctx.is_head,
    ))
}

/// Reject targets whose real location (after symlinks) is outside the root
async fn ensure_within_root(target: &Path, root: &Path, request_path: &str) -> Result<(), ServeError> {
    let canonical = fs::canonicalize(target)
        .await
        .map_err(|e| ServeError::from_lookup(e, request_path))?;

    if canonical.starts_with(root) {
        Ok(())
    } else {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            request_path,
            canonical.display()
        ));
        Err(ServeError::Forbidden(request_path.to_string()))
    }
}
