//! HTTP API server for the Parley gateway

pub mod health;
pub mod voice;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::Config;
use crate::session::{Pipeline, SessionRegistry};

/// Shared state for API handlers
pub struct ApiState {
    /// Shim stack shared by every session and the stateless voice routes
    pub pipeline: Arc<Pipeline>,
    pub sessions: Arc<SessionRegistry>,
    /// Greeting seeded into sessions created over WebSocket
    pub greeting: String,
}

/// Builder for the API server
pub struct ApiServerBuilder {
    pipeline: Arc<Pipeline>,
    port: u16,
    greeting: String,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, port: u16) -> Self {
        Self {
            pipeline,
            port,
            greeting: crate::config::DEFAULT_GREETING.to_string(),
        }
    }

    /// Set the assistant greeting for new sessions
    #[must_use]
    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Build the server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let sessions = Arc::new(SessionRegistry::new(
            Arc::clone(&self.pipeline),
            self.greeting.clone(),
        ));
        ApiServer {
            state: Arc::new(ApiState {
                pipeline: self.pipeline,
                sessions,
                greeting: self.greeting,
            }),
            port: self.port,
        }
    }
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build a server straight from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let pipeline = Arc::new(Pipeline::from_config(config));
        ApiServerBuilder::new(pipeline, config.api_server.port)
            .greeting(config.greeting.clone())
            .build()
    }

    /// Build the router with all routes
    fn router(&self) -> Router {
        let router = Router::new()
            .nest("/api/voice", voice::router(self.state.clone()))
            .nest("/ws", websocket::router(self.state.clone()))
            .merge(health::router());

        // CORS layer for cross-origin requests from the browser frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
