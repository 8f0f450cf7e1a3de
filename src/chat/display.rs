use serde_json::Value;
use comfy_table::{Table, Cell, ContentArrangement, Attribute, CellAlignment};
use colored::*;
use chrono::{TimeZone, Utc};

use crate::llm::GenerationParams;
use crate::llm::params::{MAX_TOKENS, TEMPERATURE, TOP_P};

fn header(text: &str) -> Cell {
    Cell::new(text).fg(comfy_table::Color::Cyan).add_attribute(Attribute::Bold)
}

/// Displays the System Info record returned by `/api/v1/info`.
///
/// # Arguments
///
/// * `json_response` - The JSON response from the server
pub fn display_model_info(json_response: &str) {
    let Ok(value) = serde_json::from_str::<Value>(json_response) else {
        println!("{}", "Failed to parse model info".red());
        return;
    };
    let Some(data) = value.get("data").filter(|d| d.is_object()) else {
        let message = value.get("message").and_then(|m| m.as_str()).unwrap_or("No model info available");
        println!("{}", message.yellow());
        return;
    };

    let text = |key: &str| -> String {
        match data.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "-".to_string(),
        }
    };

    let loaded_at = data
        .get("loaded_at")
        .and_then(|v| v.as_i64())
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Model", text("model_id")),
        ("Name", text("name")),
        ("Architecture", text("architecture")),
        ("Quantization", text("quantization")),
        ("Device", text("device")),
        ("Backend", format!("{} (smolchat {})", text("backend"), text("version"))),
        ("Context", format!("{} (trained {})", text("context_size"), text("training_context"))),
        ("Loaded", loaded_at),
    ];

    let mut table = Table::new();
    table
        .set_header(vec![header("System Info"), header("")])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in rows {
        table.add_row(vec![
            Cell::new(key).fg(comfy_table::Color::Yellow),
            Cell::new(value).fg(comfy_table::Color::Green),
        ]);
    }
    println!("\n{}", table);
}

/// Displays the knob values used for the next prompt next to their ranges.
pub fn display_params(params: &GenerationParams) {
    let mut table = Table::new();
    table
        .set_header(vec![header("Setting"), header("Value"), header("Range"), header("Step")])
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let rows = [
        ("max_tokens", params.max_tokens.to_string(), format!("{}-{}", MAX_TOKENS.min, MAX_TOKENS.max), MAX_TOKENS.step.to_string()),
        ("temperature", params.temperature.to_string(), format!("{}-{}", TEMPERATURE.min, TEMPERATURE.max), TEMPERATURE.step.to_string()),
        ("top_p", params.top_p.to_string(), format!("{}-{}", TOP_P.min, TOP_P.max), TOP_P.step.to_string()),
        ("thinking", if params.enable_thinking { "on" } else { "off" }.to_string(), "on/off".to_string(), "-".to_string()),
    ];
    for (name, value, range, step) in rows {
        table.add_row(vec![
            Cell::new(name).fg(comfy_table::Color::Yellow),
            Cell::new(value).fg(comfy_table::Color::Green).set_alignment(CellAlignment::Right),
            Cell::new(range).fg(comfy_table::Color::DarkGrey).set_alignment(CellAlignment::Center),
            Cell::new(step).fg(comfy_table::Color::DarkGrey).set_alignment(CellAlignment::Center),
        ]);
    }
    println!("\n{}", table);
}

/// Prints a model answer, dimming any reasoning trace.
pub fn display_response(text: &str) {
    match (text.find("<think>"), text.find("</think>")) {
        (Some(start), Some(end)) if start < end => {
            let trace = text[start + "<think>".len()..end].trim();
            let answer = text[end + "</think>".len()..].trim();
            if !trace.is_empty() {
                println!("{}", trace.bright_black().italic());
                println!();
            }
            println!("{}", answer.bright_cyan());
        }
        _ => println!("{}", text.bright_cyan()),
    }
}
