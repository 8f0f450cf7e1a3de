use std::sync::{Arc, Mutex};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use smolchat::error::ChatError;
use smolchat::llm::device::Device;
use smolchat::llm::{ChatService, Generation, GenerationParams, ModelInfo, TextGenerator};
use smolchat::server::router;

/// Echoes a canned reply and remembers the knobs it was called with
struct Canned {
    reply: Result<String, String>,
    calls: Mutex<Vec<GenerationParams>>,
}

impl TextGenerator for Canned {
    fn generate(&self, _prompt: &str, params: &GenerationParams) -> Result<Generation, ChatError> {
        self.calls.lock().unwrap().push(*params);
        match &self.reply {
            Ok(text) => Ok(Generation { text: text.clone(), prompt_tokens: 20, completion_tokens: 5 }),
            Err(msg) => Err(ChatError::Generation(msg.clone())),
        }
    }
}

async fn spawn_app(reply: Result<&str, &str>) -> (String, Arc<Canned>) {
    let generator = Arc::new(Canned {
        reply: reply.map(str::to_string).map_err(str::to_string),
        calls: Mutex::new(Vec::new()),
    });
    let service = Arc::new(ChatService::new(
        generator.clone(),
        ModelInfo::new("ggml-org/SmolLM3-3B-GGUF", Device::Cpu),
        GenerationParams::default(),
        1,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(service)).await.unwrap();
    });

    (format!("http://{}", addr), generator)
}

#[tokio::test]
async fn health_reports_running() {
    let (url, _) = spawn_app(Ok("unused")).await;
    let body = reqwest::get(format!("{}/health", url)).await.unwrap().text().await.unwrap();
    assert_eq!(body, "SmolChat is running!");
}

#[tokio::test]
async fn index_page_shows_system_info() {
    let (url, _) = spawn_app(Ok("unused")).await;
    let res = reqwest::get(format!("{}/", url)).await.unwrap();
    assert!(res.status().is_success());

    let html = res.text().await.unwrap();
    assert!(html.contains("SmolLM3-3B Chatbot"));
    assert!(html.contains("Device: CPU"));
    assert!(html.contains("Model: ggml-org/SmolLM3-3B-GGUF"));
    assert!(!html.contains("{{"));
}

#[tokio::test]
async fn chat_returns_cleaned_reply() {
    let (url, generator) = spawn_app(Ok("Hello there!<|im_end|>")).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/api/v1/chat", url))
        .json(&json!({ "prompt": "Hi", "max_tokens": 100, "enable_thinking": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["response"], "Hello there!");
    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].max_tokens, 100);
    assert!(calls[0].enable_thinking);
    assert_eq!(calls[0].top_p, GenerationParams::default().top_p);
}

#[tokio::test]
async fn empty_prompt_asks_for_input() {
    let (url, generator) = spawn_app(Ok("unused")).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/api/v1/chat", url))
        .json(&json!({ "prompt": "  " }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["response"], "Please enter a prompt.");
    assert!(generator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generation_failure_is_displayed_text() {
    let (url, _) = spawn_app(Err("device lost")).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/v1/chat", url))
        .json(&json!({ "prompt": "Hi" }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["response"], "Error generating response: Generation failed: device lost");
}

#[tokio::test]
async fn info_and_params_endpoints() {
    let (url, _) = spawn_app(Ok("unused")).await;

    let info: Value = reqwest::get(format!("{}/api/v1/info", url)).await.unwrap().json().await.unwrap();
    assert_eq!(info["status"], "success");
    assert_eq!(info["data"]["device"], "CPU");
    assert_eq!(info["data"]["backend"], "llama.cpp");

    let params: Value = reqwest::get(format!("{}/api/v1/params", url)).await.unwrap().json().await.unwrap();
    assert_eq!(params["data"]["max_tokens"]["min"], 50);
    assert_eq!(params["data"]["max_tokens"]["max"], 1000);
    assert_eq!(params["data"]["max_tokens"]["default"], 256);
    assert_eq!(params["data"]["enable_thinking"], false);
}
