//! Development server implementation.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use crate::livereload::{client_script, ReloadHub, ReloadMessage, CLIENT_PATH, WS_PATH};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve (the build output root)
    pub root: PathBuf,

    /// Address to bind to
    pub host: IpAddr,

    /// Port to listen on; 0 picks a free port
    pub port: u16,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("build"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            open: false,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Development server: static files plus the live reload socket.
pub struct DevServer {
    config: DevServerConfig,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server broadcasting from `hub`.
    pub fn new(config: DevServerConfig, hub: ReloadHub) -> Self {
        Self { config, hub }
    }

    /// Routes: the reload socket, the client script, and the output tree
    /// with the client injected into HTML pages.
    pub fn router(&self) -> Router {
        Router::new()
            .route(WS_PATH, get(ws_handler))
            .route(CLIENT_PATH, get(client_handler))
            .fallback_service(ServeDir::new(&self.config.root))
            .layer(middleware::map_response(inject_client))
            .with_state(self.hub.clone())
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = SocketAddr::new(self.config.host, self.config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(BoundServer {
            app: self.router(),
            listener,
            local_addr,
            open: self.config.open,
        })
    }
}

/// A server whose socket is bound but which is not yet accepting.
pub struct BoundServer {
    app: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
    open: bool,
}

impl BoundServer {
    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Serve until the process exits.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` completes.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let url = self.url();
        tracing::info!("Serving at {}", url);

        if self.open {
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(ServerError::Serve)
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Forward hub messages to one browser until either side goes away.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Client lagged by {} messages, reloading", skipped);
                        ReloadMessage::Reload
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live reload client script.
async fn client_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        client_script(),
    )
}

/// Add the client script to successful HTML responses.
async fn inject_client(response: Response) -> Response {
    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));

    if !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read page body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Insert the client `<script>` before the last `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, CLIENT_PATH);

    match html.to_ascii_lowercase().rfind("</body>") {
        Some(pos) => format!("{}{}\n{}", &html[..pos], tag, &html[pos..]),
        None => format!("{}\n{}", html, tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    #[test]
    fn injects_before_closing_body() {
        let html = "<html><body><p>hi</p></BODY></html>";
        assert_eq!(
            inject_script(html),
            "<html><body><p>hi</p><script src=\"/__gantry/client.js\"></script>\n</BODY></html>"
        );
    }

    #[test]
    fn appends_when_body_is_missing() {
        let html = inject_script("<p>fragment</p>");
        assert!(html.ends_with("<script src=\"/__gantry/client.js\"></script>"));
    }

    #[test]
    fn defaults_to_loopback_and_ephemeral_port() {
        let config = DevServerConfig::default();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 0);
    }

    #[tokio::test]
    async fn serves_output_with_client_injected() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<!DOCTYPE html><html><body><h1>Home</h1></body></html>",
        )
        .unwrap();
        fs::write(temp.path().join("main.css"), "body{margin:0}").unwrap();

        let server = DevServer::new(
            DevServerConfig {
                root: temp.path().to_path_buf(),
                ..Default::default()
            },
            ReloadHub::new(),
        )
        .bind()
        .await
        .unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);
        tokio::spawn(server.serve());

        let page = get(addr, "/").await;
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains("<h1>Home</h1><script src=\"/__gantry/client.js\"></script>"));

        let css = get(addr, "/main.css").await;
        assert!(css.contains("body{margin:0}"));
        assert!(!css.contains("__gantry"));

        let client = get(addr, CLIENT_PATH).await;
        assert!(client.contains("application/javascript"));
        assert!(client.contains("new WebSocket"));

        let missing = get(addr, "/nope.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"));
    }
}
