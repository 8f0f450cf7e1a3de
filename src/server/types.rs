use serde::{Deserialize, Serialize};
use crate::llm::GenerationParams;

/// Body of `POST /api/v1/chat`; omitted knobs take the configured defaults
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_thinking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ChatRequest {
    pub fn params(&self, defaults: GenerationParams) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            enable_thinking: self.enable_thinking.unwrap_or(defaults.enable_thinking),
        }
    }
}

/// Text to display; errors are reported here too
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_knobs_use_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"prompt": "hi", "top_p": 0.5}"#).unwrap();
        let defaults = GenerationParams { max_tokens: 300, ..Default::default() };

        let params = request.params(defaults);
        assert_eq!(params.max_tokens, 300);
        assert_eq!(params.top_p, 0.5);
        assert_eq!(params.temperature, defaults.temperature);
        assert!(!params.enable_thinking);
    }
}
