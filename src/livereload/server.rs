//! LiveReload HTTP/WebSocket server
//!
//! Routes:
//! - `GET /livereload`: WebSocket endpoint for browser extensions
//! - `GET /livereload.js`: client script for pages without the extension
//! - `GET /changed?files=a,b` and `POST /changed`: trigger a reload by hand
//! - `GET /`: status

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use super::protocol::{ClientMessage, ServerMessage, SERVER_NAME};
use crate::items::ItemList;

/// Error starting or running the live-reload server
#[derive(Debug, Error)]
pub enum LiveReloadError {
    /// Async runtime could not be created
    #[error("Failed to start live reload runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Address could not be bound
    #[error("Failed to listen for live reload on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// Server stopped with an error
    #[error("Live reload server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Broadcast channel shared by the server and the file watchers.
///
/// Cloning is cheap; every clone notifies the same browsers.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ServerMessage>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Tell every connected browser that `path` changed.
    ///
    /// Returns the number of clients notified.
    pub fn changed(&self, path: impl Into<String>) -> usize {
        let path = path.into();
        debug!("Live reload: {}", path);
        self.tx.send(ServerMessage::reload(path)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Number of connected browsers.
    pub fn clients(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(status))
            .route("/livereload", get(livereload_ws))
            .route("/livereload.js", get(client_script))
            .route("/changed", get(changed_query).post(changed_body))
            .with_state(self.clone())
    }
}

/// Browser client served at `/livereload.js`.
pub const CLIENT_SCRIPT: &str = include_str!("livereload.js");

#[derive(Debug, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    pub version: String,
    pub clients: usize,
}

#[derive(Debug, Deserialize)]
struct ChangedQuery {
    #[serde(default)]
    files: String,
}

#[derive(Debug, Deserialize)]
struct ChangedBody {
    #[serde(default)]
    files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub clients: usize,
    pub files: Vec<String>,
}

async fn status(State(reload): State<LiveReload>) -> Json<Status> {
    Json(Status {
        name: SERVER_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        clients: reload.clients(),
    })
}

async fn client_script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript; charset=utf-8")], CLIENT_SCRIPT)
}

async fn changed_query(
    State(reload): State<LiveReload>,
    Query(query): Query<ChangedQuery>,
) -> Json<ChangedResponse> {
    Json(notify_files(&reload, ItemList::from_items(query.files)))
}

async fn changed_body(
    State(reload): State<LiveReload>,
    Json(body): Json<ChangedBody>,
) -> Json<ChangedResponse> {
    Json(notify_files(&reload, ItemList::from_items(body.files)))
}

fn notify_files(reload: &LiveReload, files: ItemList) -> ChangedResponse {
    for file in &files {
        reload.changed(file.as_str());
    }
    ChangedResponse { clients: reload.clients(), files: files.items().to_vec() }
}

async fn livereload_ws(ws: WebSocketUpgrade, State(reload): State<LiveReload>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, reload))
}

async fn handle_socket(socket: WebSocket, reload: LiveReload) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut broadcasts = reload.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerMessage>();

    debug!("Live reload client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(message) => message,
                    None => break,
                },
                broadcast = broadcasts.recv() => match broadcast {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            let Ok(text) = serde_json::to_string(&message) else { continue };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Hello { .. }) => {
                    let _ = reply_tx.send(ServerMessage::hello());
                }
                Ok(ClientMessage::Info { url }) => {
                    debug!("Live reload client page: {}", url.unwrap_or_default());
                }
                Ok(ClientMessage::Unknown) | Err(_) => {}
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    send_task.abort();
    debug!("Live reload client disconnected");
}

/// Serve `reload` on an already-bound listener until the process ends.
pub async fn serve(listener: TcpListener, reload: LiveReload) -> Result<(), LiveReloadError> {
    axum::serve(listener, reload.router()).await.map_err(LiveReloadError::Serve)
}

/// Bind `host:port` and serve on a single-threaded runtime. Blocks.
pub fn run_server(host: &str, port: u16, reload: LiveReload) -> Result<(), LiveReloadError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(LiveReloadError::Runtime)?;

    let addr = format!("{}:{}", host, port);
    runtime.block_on(async move {
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| LiveReloadError::Bind { addr: addr.clone(), source })?;
        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!("Live reload listening on {}", local.map(|a| a.to_string()).unwrap_or(addr));
        serve(listener, reload).await
    })
}
