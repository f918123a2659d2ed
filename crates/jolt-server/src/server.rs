//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State, WebSocketUpgrade},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, HOST},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
    Router,
};
use jolt_build::{BuildConfiguration, Bundler};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::assets::SearchPath;
use crate::inject::{inject_reload_script, reload_socket_url};
use crate::rebuild::Rebuilder;
use crate::watcher::SourceWatcher;
use crate::websocket::{handle_socket, ReloadChannel, RELOAD_PATH};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Static assets, served ahead of build output
    pub public_dir: PathBuf,

    /// Sources watched for changes
    pub source_dir: PathBuf,

    /// Bundler output
    pub build_dir: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            source_dir: PathBuf::from("src"),
            build_dir: PathBuf::from("build"),
            port: 3000,
            host: "localhost".to_string(),
            open: false,
        }
    }
}

impl DevServerConfig {
    /// Roots consulted for every request, in priority order.
    pub fn search_path(&self) -> SearchPath {
        SearchPath::new(vec![self.public_dir.clone(), self.build_dir.clone()])
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    BindError(String, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared by every request.
#[derive(Debug)]
pub struct ServerState {
    search: SearchPath,
    channel: ReloadChannel,
    /// `host:port` used in the reload URL when the request has no usable Host
    authority: String,
}

impl ServerState {
    /// Create request state over `search`, falling back to `authority` for
    /// the reload URL.
    pub fn new(search: SearchPath, channel: ReloadChannel, authority: String) -> Self {
        Self {
            search,
            channel,
            authority,
        }
    }

    /// Channel that upgraded reload sockets bind to.
    pub fn channel(&self) -> &ReloadChannel {
        &self.channel
    }

    fn reload_authority(&self, headers: &HeaderMap) -> String {
        headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| is_plain_authority(host))
            .map_or_else(|| self.authority.clone(), str::to_string)
    }
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    build: BuildConfiguration,
    bundler: Arc<dyn Bundler>,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(
        config: DevServerConfig,
        build: BuildConfiguration,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        Self {
            config,
            build,
            bundler,
        }
    }

    /// Build once, start watching, then serve until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let prepared = self.prepare().await?;

        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServerError::BindError(bind_addr.clone(), e.to_string()))?;

        prepared.serve(listener).await
    }

    /// Run the initial build, then start the watcher and the rebuild loop.
    ///
    /// The build is awaited, so anything served afterwards sees its output.
    pub async fn prepare(self) -> Result<PreparedServer, ServerError> {
        let channel = ReloadChannel::new();
        let rebuilder = Rebuilder::new(self.bundler, Arc::new(self.build), channel.clone());

        // Serve something straight away, even if it is stale
        rebuilder.build_once().await;

        let (watcher, events) = SourceWatcher::new(&self.config.source_dir)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;
        tracing::info!("Watching {}", self.config.source_dir.display());

        tokio::spawn(async move {
            rebuilder.run(events).await;
            // Keep watcher alive
            drop(watcher);
        });

        Ok(PreparedServer {
            config: self.config,
            channel,
        })
    }
}

/// A dev server whose initial build has finished and whose watcher is running.
pub struct PreparedServer {
    config: DevServerConfig,
    channel: ReloadChannel,
}

impl PreparedServer {
    /// Channel the rebuild loop pushes reload signals through.
    pub fn channel(&self) -> &ReloadChannel {
        &self.channel
    }

    /// Serve on an already bound listener until the process is stopped.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let port = listener.local_addr()?.port();
        let authority = format!("{}:{}", self.config.host, port);

        let state = Arc::new(ServerState::new(
            self.config.search_path(),
            self.channel,
            authority.clone(),
        ));

        let url = format!("http://{}", authority);
        tracing::info!("Starting dev server at {}", url);

        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(
            listener,
            router(state).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }
}

/// Build the router. Everything goes through one dispatcher so the reload
/// path can be matched as a suffix.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn dispatch(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    if path.ends_with(RELOAD_PATH) {
        return upgrade(state, request).await;
    }

    serve_asset(&state, &path, request.headers()).await
}

/// Handler for the reload socket.
async fn upgrade(state: Arc<ServerState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (mut parts, _body) = request.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => {
            let channel = state.channel.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, channel, peer))
        }
        Err(rejection) => {
            tracing::debug!("Rejected reload upgrade: {}", rejection);
            (StatusCode::BAD_REQUEST, "Bad Request").into_response()
        }
    }
}

async fn serve_asset(state: &ServerState, path: &str, headers: &HeaderMap) -> Response {
    let Some(asset) = state.search.find(path).await else {
        tracing::debug!("Not found: {}", path);
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let body = if asset.is_html() {
        let url = reload_socket_url(&state.reload_authority(headers));
        match inject_reload_script(&asset.bytes, &url) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("{}: {}", asset.path.display(), e);
                asset.bytes
            }
        }
    } else {
        asset.bytes
    };

    (
        [(CONTENT_TYPE, asset.content_type), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}

/// Whether a Host header is safe to embed in the injected script.
fn is_plain_authority(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}
