//! `NesplayServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use nesplay_core::{ConnectionId, RelayDispatcher, Session};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::client;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::health::{self, HealthResponse};
use crate::roms::RomLibrary;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::{SessionOptions, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay dispatcher handed to every connection task.
    pub dispatcher: RelayDispatcher<BroadcastManager>,
    /// Live connection table.
    pub broadcast: Arc<BroadcastManager>,
    /// Games found at startup.
    pub library: Arc<RomLibrary>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The nesplay relay server.
pub struct NesplayServer {
    config: Arc<ServerConfig>,
    library: Arc<RomLibrary>,
    session: Arc<Session>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
    start_time: Instant,
}

impl NesplayServer {
    /// Create a server, scanning the configured ROM directory.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let library = RomLibrary::scan(&config.rom_dir)?;
        Ok(Self {
            config: Arc::new(config),
            library: Arc::new(library),
            session: Arc::new(Session::new()),
            broadcast: Arc::new(BroadcastManager::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
            start_time: Instant::now(),
        })
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: RelayDispatcher::new(Arc::clone(&self.session), Arc::clone(&self.broadcast)),
            broadcast: Arc::clone(&self.broadcast),
            library: Arc::clone(&self.library),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        let mut router = Router::new()
            .route("/", get(index_handler))
            .route("/ws", get(ws_handler))
            .route("/romlist", get(romlist_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .nest_service("/roms", ServeDir::new(self.library.dir()));

        router = match &self.config.assets_dir {
            Some(assets) => router
                .nest_service("/public", ServeDir::new(assets.join("public")))
                .nest_service("/jsnes", ServeDir::new(assets.join("jsnes"))),
            None => router.route("/public/{file}", get(client::public_handler)),
        };

        router
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and serve until shutdown is signalled.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let bind_error = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%error, "http server failed");
            }
        });

        info!(%local_addr, "nesplay server started");
        Ok((local_addr, handle))
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Games found at startup.
    pub fn library(&self) -> &RomLibrary {
        &self.library
    }

    /// The shared session registry.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The live connection table.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

#[derive(Serialize)]
struct RomList {
    roms: Vec<String>,
}

/// GET /
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    if let Some(dir) = &state.config.assets_dir {
        let path = dir.join("index.html");
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => return Html(body),
            Err(error) => debug!(path = %path.display(), %error, "using built-in index"),
        }
    }
    Html(client::INDEX_HTML.to_string())
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let open = state.broadcast.connection_count();
    if open >= state.config.max_connections {
        warn!(open, max = state.config.max_connections, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let options = SessionOptions::from(state.config.as_ref());
    let dispatcher = state.dispatcher.clone();
    let coordinator = Arc::clone(&state.shutdown);
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            let session = run_ws_session(
                socket,
                ConnectionId::new(),
                dispatcher,
                options,
                coordinator.token(),
            );
            coordinator.track_session(session)
        })
        .into_response()
}

/// GET /romlist
async fn romlist_handler(State(state): State<AppState>) -> Json<RomList> {
    Json(RomList {
        roms: state.library.names(),
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.connection_count();
    let roles = state.dispatcher.session().roles();
    Json(health::health_check(state.start_time, connections, &roles))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
