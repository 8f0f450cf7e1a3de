use axum::{
    Json,
    extract::State,
    response::{Html, IntoResponse},
};
use std::sync::Arc;
use tracing::info;

use crate::llm::ChatService;
use crate::llm::params::ParamSchema;
use super::page;
use super::types::{ApiResponse, ChatRequest, ChatResponse};

/// Returns a health check response
pub async fn health_check() -> &'static str {
    info!("Health check endpoint called");
    "SmolChat is running!"
}

/// Serves the chat page
pub async fn index(State(service): State<Arc<ChatService>>) -> Html<String> {
    let schema = ParamSchema::with_defaults(&service.defaults());
    Html(page::render(service.info(), &schema))
}

/// Runs one generation pass for the submitted message.
///
/// Always answers 200; failures are carried in the response text so the
/// page can show them in place of an answer.
pub async fn chat(
    State(service): State<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let params = request.params(service.defaults());
    info!("Chat endpoint called ({} chars, thinking: {})", request.prompt.len(), params.enable_thinking);

    let response = service.chat(&request.prompt, params).await;
    Json(ChatResponse { response })
}

/// Returns the System Info record for the loaded model
pub async fn model_info(State(service): State<Arc<ChatService>>) -> impl IntoResponse {
    info!("Info endpoint called");
    Json(ApiResponse::success(service.info().clone()))
}

/// Returns ranges and defaults of the generation knobs
pub async fn param_schema(State(service): State<Arc<ChatService>>) -> impl IntoResponse {
    info!("Params endpoint called");
    Json(ApiResponse::success(ParamSchema::with_defaults(&service.defaults())))
}
