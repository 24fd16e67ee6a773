//! HTTP backend for the chat widget
//!
//! `POST /api/chat` answers as the configured persona, `GET /api/health`
//! reports liveness, and everything else falls through to the static
//! front end when one is configured.

pub mod chat;
pub mod health;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use chat::{PersonaResponder, Responder};

use crate::Result;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub responder: Arc<dyn Responder>,
}

/// HTTP server for the chat backend
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Create a server answering through `responder`
    #[must_use]
    pub fn new(responder: Arc<dyn Responder>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { responder }),
            port,
            static_dir: None,
        }
    }

    /// Serve files from `dir`, falling back to its `index.html`
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let api = chat::router(self.state.clone()).merge(health::router());
        let mut router = Router::new().nest("/api", api);

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // The widget may be served from another origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Bind to the configured port and serve until the process exits
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self, listener: TcpListener) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.serve(listener).await })
    }
}
