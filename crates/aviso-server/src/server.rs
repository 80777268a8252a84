//! `AvisoServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::notifications::registry::SessionRegistry;
use crate::notifications::scheduler::NotificationScheduler;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{SessionContext, run_session};
use crate::websocket::transport;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-session dependencies.
    pub session_ctx: SessionContext,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
    /// Tracks upgraded sessions so shutdown can wait for them.
    pub sessions: TaskTracker,
}

/// The main aviso server.
pub struct AvisoServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl AvisoServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Dependencies handed to every accepted session.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: self.registry.clone(),
            shutdown: self.shutdown.token(),
            max_message_bytes: self.config.max_message_size,
            send_timeout: self.config.send_timeout(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session_ctx: self.session_context(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            sessions: self.shutdown.sessions().clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Build the notification scheduler for this server's registry.
    pub fn scheduler(&self) -> NotificationScheduler {
        NotificationScheduler::new(
            self.registry.clone(),
            self.config.notifications.interval(),
            self.config.notifications.message.clone(),
            self.config.send_timeout(),
        )
    }

    /// Bind, start serving, and start the scheduler (if enabled).
    ///
    /// Returns the bound address and a handle that completes once the server
    /// and scheduler have both stopped after shutdown.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let scheduler = self
            .config
            .notifications
            .enabled
            .then(|| self.scheduler().spawn(self.shutdown.token()));

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
            if let Some(scheduler) = scheduler {
                let _ = scheduler.await;
            }
        });

        info!(%local_addr, "aviso server listening");
        Ok((local_addr, handle))
    }

    /// The current-session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws: upgrade and hand the socket to a new session.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let max = state.session_ctx.max_message_bytes;
    let sessions = state.sessions.clone();
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| sessions.track_future(on_connection_accepted(socket, state)))
}

/// Entry point invoked once per upgraded connection.
async fn on_connection_accepted(socket: WebSocket, state: AppState) {
    let (source, sink) = transport::split(socket);
    let _ = run_session(source, Box::new(sink), &state.session_ctx).await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.session_ctx.registry.has_open_session();
    Json(health::health_check(state.start_time, active))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
