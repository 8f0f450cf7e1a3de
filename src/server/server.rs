use std::sync::Arc;
use std::error::Error;
use tokio::net::TcpListener;
use axum::{Router, routing::{get, post}};
use tracing::info;

use crate::llm::ChatService;
use super::routes;

/// Builds the application router around a chat service.
pub fn router(service: Arc<ChatService>) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health_check))
        .route("/api/v1/chat", post(routes::chat))
        .route("/api/v1/info", get(routes::model_info))
        .route("/api/v1/params", get(routes::param_schema))
        .with_state(service)
}

/// HTTP server exposing the chat page and its API
pub struct ApiServer {
    service: Arc<ChatService>,
    host: String,
    port: u16,
}

impl ApiServer {
    pub fn new(service: Arc<ChatService>, host: String, port: u16) -> Self {
        info!("Creating new API server on {}:{}", host, port);
        Self {
            service,
            host,
            port,
        }
    }

    pub async fn start(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("Starting server on {}:{}", self.host, self.port);
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until the process stops.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = router(Arc::clone(&self.service));

        info!("Server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
