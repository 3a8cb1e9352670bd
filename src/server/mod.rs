//! HTTP API over the engine.
//!
//! Routes are built once by [`router`]; [`HttpServer`] binds the listener,
//! serves the router on a background task and shuts it down gracefully.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ServerError;
use crate::exec::{CommandGateway, ScriptRunner};
use crate::llm::TextGenerator;
use crate::preview::{Composer, FrameRegistry, PreviewSessions, SandboxPolicy};

/// Shared state for all handlers.
pub struct AppState {
    pub gateway: CommandGateway,
    pub runner: ScriptRunner,
    pub composer: Composer,
    pub previews: PreviewSessions,
    pub policy: SandboxPolicy,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gateway: config.command_gateway(),
            runner: config.script_runner(),
            composer: Composer::new().with_resize_bridge(true),
            previews: PreviewSessions::new(FrameRegistry::new(), config.sandbox_policy()),
            policy: config.sandbox_policy(),
            generator: config.text_generator(),
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/extract", post(handlers::extract))
        .route("/api/execute", post(handlers::execute))
        .route("/api/python", post(handlers::python))
        .route("/api/compose", post(handlers::compose))
        .route("/api/preview", post(handlers::preview))
        .route("/api/chat", post(handlers::chat))
        .route("/api/generate", post(handlers::generate))
        .route("/api/previews", post(handlers::create_preview))
        .route(
            "/api/previews/{id}",
            get(handlers::preview_status)
                .put(handlers::refresh_preview)
                .delete(handlers::close_preview),
        )
        .route("/api/previews/{id}/retry", post(handlers::retry_preview))
        .route("/api/previews/{id}/messages", post(handlers::preview_message))
        .route("/frames/{id}", get(handlers::serve_frame))
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Owns the listening socket and the serving task.
pub struct HttpServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind and start serving `app`. Returns the bound address, which differs
    /// from the configured one when port 0 was requested.
    pub async fn start(&mut self, app: Router) -> Result<SocketAddr, ServerError> {
        if self.handle.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                addr: self.addr,
                reason: e.to_string(),
            })?;
        let bound = listener.local_addr().map_err(|e| ServerError::BindFailed {
            addr: self.addr,
            reason: e.to_string(),
        })?;

        tracing::info!("HTTP server listening on {}", bound);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                    tracing::info!("HTTP server shutting down");
                })
                .await
            {
                tracing::error!("HTTP server error: {}", e);
            }
        });

        self.handle = Some(handle);
        Ok(bound)
    }

    /// Signal graceful shutdown and wait for the serving task to finish.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Wait until the serving task exits.
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
