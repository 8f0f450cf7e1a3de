use crate::llm::ModelInfo;
use crate::llm::params::ParamSchema;

const TEMPLATE: &str = include_str!("../../assets/index.html");

/// Escapes text for use inside HTML element content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Fills the page template with the model description and knob ranges.
pub fn render(info: &ModelInfo, schema: &ParamSchema) -> String {
    let details = [
        info.name.as_deref(),
        info.quantization.as_deref(),
    ]
    .iter()
    .flatten()
    .cloned()
    .collect::<Vec<_>>()
    .join(", ");

    let model = if details.is_empty() {
        info.model_id.clone()
    } else {
        format!("{} ({})", info.model_id, details)
    };

    let replacements: [(&str, String); 17] = [
        ("{{MODEL}}", escape_html(&model)),
        ("{{DEVICE}}", escape_html(&info.device)),
        ("{{BACKEND}}", escape_html(&format!("{} / smolchat {}", info.backend, info.version))),
        ("{{MAX_TOKENS_MIN}}", schema.max_tokens.min.to_string()),
        ("{{MAX_TOKENS_MAX}}", schema.max_tokens.max.to_string()),
        ("{{MAX_TOKENS_STEP}}", schema.max_tokens.step.to_string()),
        ("{{MAX_TOKENS_DEFAULT}}", schema.max_tokens.default.to_string()),
        ("{{TEMPERATURE_MIN}}", schema.temperature.min.to_string()),
        ("{{TEMPERATURE_MAX}}", schema.temperature.max.to_string()),
        ("{{TEMPERATURE_STEP}}", schema.temperature.step.to_string()),
        ("{{TEMPERATURE_DEFAULT}}", schema.temperature.default.to_string()),
        ("{{TOP_P_MIN}}", schema.top_p.min.to_string()),
        ("{{TOP_P_MAX}}", schema.top_p.max.to_string()),
        ("{{TOP_P_STEP}}", schema.top_p.step.to_string()),
        ("{{TOP_P_DEFAULT}}", schema.top_p.default.to_string()),
        ("{{THINKING_CHECKED}}", if schema.enable_thinking { "checked".to_string() } else { String::new() }),
        ("{{TITLE}}", "SmolLM3-3B Chatbot".to_string()),
    ];

    replacements
        .iter()
        .fold(TEMPLATE.to_string(), |page, (placeholder, value)| page.replace(placeholder, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::device::Device;
    use crate::llm::GenerationParams;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_render_fills_every_placeholder() {
        let mut info = ModelInfo::new("ggml-org/SmolLM3-3B-GGUF", Device::Metal);
        info.quantization = Some("Q4_K_M".to_string());
        let schema = ParamSchema::with_defaults(&GenerationParams::default());

        let page = render(&info, &schema);
        assert!(!page.contains("{{"));
        assert!(page.contains("ggml-org/SmolLM3-3B-GGUF (Q4_K_M)"));
        assert!(page.contains("METAL"));
        assert!(page.contains("value=\"256\""));
        assert!(page.contains("min=\"0.1\""));
        assert!(page.contains("step=\"0.05\""));
    }

    #[test]
    fn test_render_escapes_model_id() {
        let info = ModelInfo::new("<script>", Device::Cpu);
        let schema = ParamSchema::with_defaults(&GenerationParams::default());

        let page = render(&info, &schema);
        assert!(page.contains("&lt;script&gt;"));
    }
}
