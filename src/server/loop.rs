// Server loop module
// Accepts connections until shutdown is requested

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Pause after a failed accept (e.g. out of file descriptors) before retrying
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections on `listener` until `shutdown` is notified.
///
/// Each connection is served on its own task. In-flight connections are not
/// waited for once the loop returns.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }

            () = shutdown.notified() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use crate::server::create_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_state(name: &str) -> (std::path::PathBuf, Arc<AppState>) {
        let root = std::env::temp_dir().join(format!("devserve-loop-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("app.js"), b"x=1").unwrap();
        std::fs::write(root.join("data.json"), b"{}").unwrap();

        let overrides = Overrides {
            root: Some(root.to_string_lossy().into_owned()),
            ..Overrides::default()
        };
        let config = Config::load_from("/nonexistent/devserve-test", &overrides).unwrap();
        (root, Arc::new(AppState::new(config).unwrap()))
    }

    async fn raw_request(addr: std::net::SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).to_ascii_lowercase()
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_stops() {
        let (root, state) = test_state("tcp");
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let js = raw_request(
            addr,
            "GET /app.js HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(js.starts_with("http/1.1 200 ok"), "{js}");
        assert!(js.contains("content-type: application/javascript"));
        assert!(js.contains("access-control-allow-origin: *"));
        assert!(js.contains("cache-control: no-store, no-cache, must-revalidate"));
        assert!(js.ends_with("\r\n\r\nx=1"));

        let missing = raw_request(
            addr,
            "GET /missing.txt HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(missing.starts_with("http/1.1 404 not found"), "{missing}");
        assert!(missing.contains("access-control-allow-origin: *"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server loop should stop after shutdown")
            .unwrap();

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_serves_two_requests() {
        let (root, state) = test_state("keepalive");
        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let both = raw_request(
            addr,
            "GET /app.js HTTP/1.1\r\nHost: localhost\r\n\r\n\
             GET /data.json HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(both.matches("http/1.1 200 ok").count(), 2, "{both}");
        assert!(both.contains("content-type: application/json"));

        shutdown.notify_one();
        server.await.unwrap();
        std::fs::remove_dir_all(&root).unwrap();
    }
}
