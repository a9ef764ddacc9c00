//! Request dispatch module
//!
//! Entry point for HTTP request processing: method validation, dispatch to
//! the static file server, and error to response conversion.

use crate::config::AppState;
use crate::error::ServeError;
use crate::handler::static_files;
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Raw (still percent-encoded) URI path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_modified_since: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// Never fails: every error becomes a response, and every response carries
/// the development headers.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method();
    let uri = req.uri();
    let is_head = *method == Method::HEAD;

    logger::log_request(method, uri, req.version());
    if state.config.logging.show_headers {
        logger::log_headers_count(req.headers().len());
    }

    let result = match check_http_method(method) {
        Some(err) => Err(err),
        None => {
            let ctx = RequestContext {
                path: uri.path(),
                query: uri.query(),
                is_head,
                if_modified_since: req
                    .headers()
                    .get("if-modified-since")
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string),
            };
            static_files::serve_path(&ctx, &state).await
        }
    };

    let mut response = result.unwrap_or_else(|err| {
        log_serve_error(&err);
        http::build_error_response(&err, is_head)
    });
    http::apply_dev_headers(&mut response, &state.config.http.server_name);
    Ok(response)
}

/// Only GET and HEAD are served
fn check_http_method(method: &Method) -> Option<ServeError> {
    match *method {
        Method::GET | Method::HEAD => None,
        _ => Some(ServeError::MethodNotAllowed(method.to_string())),
    }
}

fn log_serve_error(err: &ServeError) {
    match err {
        ServeError::Io(_) => logger::log_error(&err.to_string()),
        ServeError::MethodNotAllowed(_) | ServeError::BadRequest(_) => {
            logger::log_warning(&err.to_string());
        }
        ServeError::Forbidden(_) | ServeError::NotFound(_) => logger::log_debug(&err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// Temporary tree: `<base>/outside.txt` and `<base>/root/...`
    struct Fixture {
        base: PathBuf,
        state: Arc<AppState>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(|_| {})
        }

        fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
            let base = std::env::temp_dir().join(format!(
                "devserve-router-{}-{}",
                std::process::id(),
                NEXT_DIR.fetch_add(1, Ordering::SeqCst)
            ));
            let root = base.join("root");
            std::fs::create_dir_all(root.join("docs")).unwrap();
            std::fs::create_dir_all(root.join("site")).unwrap();
            std::fs::write(base.join("outside.txt"), b"top secret").unwrap();
            std::fs::write(root.join("app.js"), b"x=1").unwrap();
            std::fs::write(root.join("data.json"), b"{}").unwrap();
            std::fs::write(root.join("docs").join("readme.txt"), b"hello").unwrap();
            std::fs::write(root.join("site").join("index.html"), b"<h1>home</h1>").unwrap();

            let overrides = Overrides {
                root: Some(root.to_string_lossy().into_owned()),
                ..Overrides::default()
            };
            let mut config = Config::load_from("/nonexistent/devserve-test", &overrides).unwrap();
            adjust(&mut config);
            let state = Arc::new(AppState::new(config).unwrap());
            Self { base, state }
        }

        fn root(&self) -> &Path {
            &self.state.root
        }

        async fn send(&self, method: Method, uri: &str) -> Response<Full<Bytes>> {
            let req = Request::builder().method(method).uri(uri).body(()).unwrap();
            handle_request(req, Arc::clone(&self.state)).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response<Full<Bytes>> {
            self.send(Method::GET, uri).await
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.base);
        }
    }

    async fn body_of(resp: Response<Full<Bytes>>) -> Bytes {
        resp.into_body().collect().await.unwrap().to_bytes()
    }

    fn assert_dev_headers(resp: &Response<Full<Bytes>>) {
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET");
        assert_eq!(headers["cache-control"], "no-store, no-cache, must-revalidate");
    }

    #[tokio::test]
    async fn test_serves_js_with_forced_type() {
        let fx = Fixture::new();
        let resp = fx.get("/app.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/javascript");
        assert!(resp.headers().contains_key("last-modified"));
        assert_dev_headers(&resp);
        assert_eq!(&body_of(resp).await[..], b"x=1");
    }

    #[tokio::test]
    async fn test_serves_json_with_forced_type() {
        let fx = Fixture::new();
        let resp = fx.get("/data.json?v=2").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert_eq!(&body_of(resp).await[..], b"{}");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let fx = Fixture::new();
        let resp = fx.get("/missing.txt").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_dev_headers(&resp);
    }

    #[tokio::test]
    async fn test_path_through_file_is_404() {
        let fx = Fixture::new();
        let resp = fx.get("/app.js/x").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_dev_headers(&resp);
    }

    #[tokio::test]
    async fn test_overlong_name_is_404() {
        let fx = Fixture::new();
        let resp = fx.get(&format!("/{}.txt", "a".repeat(300))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_dev_headers(&resp);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        let locked = fx.root().join("locked.txt");
        std::fs::write(&locked, b"private").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores file modes
        if std::fs::read(&locked).is_ok() {
            return;
        }

        let resp = fx.get("/locked.txt").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_dev_headers(&resp);
        assert_ne!(&body_of(resp).await[..], b"private");
    }

    #[tokio::test]
    async fn test_traversal_never_leaks() {
        let fx = Fixture::new();
        for uri in ["/../outside.txt", "/docs/../../outside.txt", "/%2e%2e/outside.txt"] {
            let resp = fx.get(uri).await;
            assert!(
                resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::NOT_FOUND,
                "{uri} returned {}",
                resp.status()
            );
            assert_dev_headers(&resp);
            assert_ne!(&body_of(resp).await[..], b"top secret");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_forbidden() {
        let fx = Fixture::new();
        std::os::unix::fs::symlink(fx.base.join("outside.txt"), fx.root().join("leak.txt")).unwrap();
        let resp = fx.get("/leak.txt").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_ne!(&body_of(resp).await[..], b"top secret");
    }

    #[tokio::test]
    async fn test_directory_index_file() {
        let fx = Fixture::new();
        let resp = fx.get("/site/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/html");
        assert_eq!(&body_of(resp).await[..], b"<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_directory_redirects_to_slash() {
        let fx = Fixture::new();
        let resp = fx.get("/site?tab=1").await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["location"], "/site/?tab=1");
        assert_dev_headers(&resp);
    }

    #[tokio::test]
    async fn test_redirect_collapses_leading_slashes() {
        let fx = Fixture::new();
        let resp = fx.get("//site").await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()["location"], "/site/");
    }

    #[tokio::test]
    async fn test_directory_listing() {
        let fx = Fixture::new();
        let resp = fx.get("/docs/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/html; charset=utf-8");
        let body = body_of(resp).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("Directory listing for /docs/"));
        assert!(html.contains("href=\"readme.txt\""));
    }

    #[tokio::test]
    async fn test_root_listing() {
        let fx = Fixture::new();
        let resp = fx.get("/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_of(resp).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("href=\"app.js\""));
        assert!(html.contains("href=\"site/\""));
    }

    #[tokio::test]
    async fn test_listing_disabled() {
        let fx = Fixture::with_config(|c| c.http.directory_listing = false);
        let resp = fx.get("/docs/").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        // index files still work
        assert_eq!(fx.get("/site/").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let fx = Fixture::new();
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS] {
            let resp = fx.send(method, "/app.js").await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(resp.headers()["allow"], "GET, HEAD");
            assert_dev_headers(&resp);
        }
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let fx = Fixture::new();
        let resp = fx.send(Method::HEAD, "/app.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "application/javascript");
        assert_eq!(resp.headers()["content-length"], "3");
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_percent_encoding() {
        let fx = Fixture::new();
        let resp = fx.get("/%FF%FE.js").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_dev_headers(&resp);
    }

    #[tokio::test]
    async fn test_percent_encoded_name() {
        let fx = Fixture::new();
        std::fs::write(fx.root().join("my file.js"), b"y=2").unwrap();
        let resp = fx.get("/my%20file.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(&body_of(resp).await[..], b"y=2");
    }

    #[tokio::test]
    async fn test_if_modified_since() {
        let fx = Fixture::new();
        let first = fx.get("/app.js").await;
        let last_modified = first.headers()["last-modified"].to_str().unwrap().to_string();

        let req = Request::builder()
            .uri("/app.js")
            .header("If-Modified-Since", &last_modified)
            .body(())
            .unwrap();
        let resp = handle_request(req, Arc::clone(&fx.state)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
        assert_dev_headers(&resp);

        let req = Request::builder()
            .uri("/app.js")
            .header("If-Modified-Since", "Thu, 01 Jan 1970 00:00:00 GMT")
            .body(())
            .unwrap();
        let resp = handle_request(req, Arc::clone(&fx.state)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_configured_mime_override() {
        let fx = Fixture::with_config(|c| {
            c.http
                .mime_types
                .insert("txt".to_string(), "text/plain; charset=utf-8".to_string());
        });
        let resp = fx.get("/docs/readme.txt").await;
        assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    }
}
