use colored::*;
use reqwest::Client;

use crate::chat::display::{display_model_info, display_params, display_response};
use crate::llm::GenerationParams;
use crate::server::types::{ChatRequest, ChatResponse};

/// Represents the context for chat command operations
///
/// # Fields
///
/// * `client` - HTTP client used for making API requests to the server
/// * `server_url` - Base URL of the server API
/// * `params` - Knob values sent with every prompt; changed by `set` and `think`
pub(super) struct ChatContext<'a> {
    pub client: &'a Client,
    pub server_url: &'a str,
    pub params: &'a mut GenerationParams,
}

/// Applies `set <name> <value>` to a copy of `params`.
pub(super) fn apply_setting(params: &GenerationParams, name: &str, value: &str) -> Result<GenerationParams, String> {
    let mut updated = *params;
    match name {
        "max_tokens" | "tokens" => {
            updated.max_tokens = value.parse().map_err(|_| format!("'{}' is not a whole number", value))?;
        }
        "temperature" | "temp" => {
            updated.temperature = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
        }
        "top_p" | "top-p" => {
            updated.top_p = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
        }
        other => return Err(format!("Unknown setting '{}'. Use max_tokens, temperature or top_p", other)),
    }
    updated.validate().map_err(|e| e.to_string())?;
    Ok(updated)
}

pub(super) async fn handle_info(context: &ChatContext<'_>) {
    match context.client.get(format!("{}/api/v1/info", context.server_url)).send().await {
        Ok(response) => match response.text().await {
            Ok(text) => display_model_info(&text),
            Err(e) => println!("Error reading response: {}", e),
        },
        Err(e) => println!("Error requesting model info: {}", e),
    }
}

pub(super) fn handle_params(context: &ChatContext<'_>) {
    display_params(context.params);
}

pub(super) fn handle_set(context: &mut ChatContext<'_>, args: &[&str]) {
    let [name, value] = args else {
        println!("Usage: set <max_tokens|temperature|top_p> <value>");
        return;
    };
    match apply_setting(context.params, &name.to_lowercase(), value) {
        Ok(updated) => {
            *context.params = updated;
            println!("{}", format!("{} set to {}", name, value).green());
        }
        Err(e) => println!("{}", e.yellow()),
    }
}

pub(super) fn handle_think(context: &mut ChatContext<'_>, arg: &str) {
    match arg {
        "on" | "true" | "1" => context.params.enable_thinking = true,
        "off" | "false" | "0" => context.params.enable_thinking = false,
        "" => context.params.enable_thinking = !context.params.enable_thinking,
        _ => {
            println!("Usage: think [on|off]");
            return;
        }
    }
    let state = if context.params.enable_thinking { "on" } else { "off" };
    println!("{}", format!("Extended thinking mode {}", state).green());
}

pub(super) async fn handle_generate(context: &ChatContext<'_>, prompt: &str) {
    let url = format!("{}/api/v1/chat", context.server_url);
    let request = ChatRequest {
        prompt: prompt.to_string(),
        enable_thinking: Some(context.params.enable_thinking),
        max_tokens: Some(context.params.max_tokens),
        temperature: Some(context.params.temperature),
        top_p: Some(context.params.top_p),
    };

    println!("{}", "Thinking...".bright_black());
    match context.client.post(&url).json(&request).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                match response.json::<ChatResponse>().await {
                    Ok(body) => {
                        println!();
                        display_response(&body.response);
                        println!();
                    }
                    Err(e) => println!("{}", format!("Failed to parse response: {}", e).yellow()),
                }
            } else {
                match response.text().await {
                    Ok(text) => println!("{}", format!("Error: Server returned status {}. Response: {}", status, text).yellow()),
                    Err(e) => println!("{}", format!("Error: Server returned status {} but failed to read response body: {}", status, e).yellow()),
                }
            }
        }
        Err(e) => println!("{}", format!("Error sending chat request: {}", e).yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_setting_updates_one_knob() {
        let params = GenerationParams::default();
        let updated = apply_setting(&params, "temperature", "1.2").unwrap();
        assert_eq!(updated.temperature, 1.2);
        assert_eq!(updated.max_tokens, params.max_tokens);

        let updated = apply_setting(&params, "tokens", "500").unwrap();
        assert_eq!(updated.max_tokens, 500);
    }

    #[test]
    fn test_apply_setting_rejects_bad_input() {
        let params = GenerationParams::default();
        assert!(apply_setting(&params, "max_tokens", "lots").is_err());
        assert!(apply_setting(&params, "max_tokens", "5000").unwrap_err().contains("max_tokens"));
        assert!(apply_setting(&params, "top_k", "40").unwrap_err().contains("Unknown setting"));
    }
}
