//! SmolLM3 chat prompt rendering and response cleanup.
//!
//! The model expects ChatML-style turns (`<|im_start|>role ... <|im_end|>`)
//! and a system turn that announces the reasoning mode. With reasoning off,
//! the assistant turn is opened with an empty `<think>` block so the model
//! answers directly.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

pub const IM_START: &str = "<|im_start|>";
pub const IM_END: &str = "<|im_end|>";
pub const END_OF_TEXT: &str = "<|end_of_text|>";

const KNOWLEDGE_CUTOFF: &str = "June 2025";

const BASE_INSTRUCTIONS: &str =
    "You are a helpful AI assistant named SmolLM, trained by Hugging Face.";

const THINKING_INSTRUCTIONS: &str = "You are a helpful AI assistant named SmolLM, trained by Hugging Face. \
Your role as an assistant involves thoroughly exploring questions through a systematic thinking process \
before providing the final precise and accurate solutions. This requires engaging in a comprehensive cycle \
of analysis, summarizing, exploration, reassessment, reflection, backtracking, and iteration to develop \
well-considered thinking process. Please structure your response into two main sections: Thought and \
Solution using the specified format: <think> Thought section </think> Solution section. In the Thought \
section, detail your reasoning process in steps. Each step should include detailed considerations such as \
analysing questions, summarizing relevant findings, brainstorming new ideas, verifying the accuracy of the \
current steps, refining any errors, and revisiting previous steps. In the Solution section, based on \
various attempts, explorations, and reflections from the Thought section, systematically present the final \
solution that you deem correct. The Solution section should be logical, accurate, and concise and detail \
necessary steps needed to reach the conclusion.";

/// Any `<|...|>` control token left in decoded text
static SPECIAL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\|[A-Za-z0-9_]+\|>").expect("special token pattern is valid")
});

/// Renders a single user turn into the prompt text SmolLM3 was trained on.
#[derive(Debug, Clone, Default)]
pub struct ChatTemplate;

impl ChatTemplate {
    pub fn new() -> Self {
        Self
    }

    /// Renders `message` using today's local date in the system turn.
    pub fn render(&self, message: &str, enable_thinking: bool) -> String {
        self.render_on(message, enable_thinking, Local::now().date_naive())
    }

    /// Renders `message` with an explicit date, ending with an open assistant turn.
    pub fn render_on(&self, message: &str, enable_thinking: bool, today: NaiveDate) -> String {
        let reasoning_mode = if enable_thinking { "/think" } else { "/no_think" };
        let custom_instructions = if enable_thinking { THINKING_INSTRUCTIONS } else { BASE_INSTRUCTIONS };

        let mut prompt = String::new();
        prompt.push_str(IM_START);
        prompt.push_str("system\n");
        prompt.push_str("## Metadata\n\n");
        prompt.push_str(&format!("Knowledge Cutoff Date: {}\n", KNOWLEDGE_CUTOFF));
        prompt.push_str(&format!("Today Date: {}\n", today.format("%d %B %Y")));
        prompt.push_str(&format!("Reasoning Mode: {}\n\n", reasoning_mode));
        prompt.push_str("## Custom Instructions\n\n");
        prompt.push_str(custom_instructions);
        prompt.push_str("\n\n");
        prompt.push_str(IM_END);
        prompt.push('\n');

        prompt.push_str(IM_START);
        prompt.push_str("user\n");
        prompt.push_str(message);
        prompt.push_str(IM_END);
        prompt.push('\n');

        prompt.push_str(IM_START);
        prompt.push_str("assistant\n");
        if !enable_thinking {
            prompt.push_str("<think>\n\n</think>\n");
        }
        prompt
    }
}

/// Strips chat-control tokens from decoded model output.
///
/// Text after the first end-of-turn marker is dropped. Reasoning traces
/// (`<think>...</think>`) are left in place.
pub fn clean_response(raw: &str) -> String {
    let end = [IM_END, END_OF_TEXT]
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    SPECIAL_TOKEN.replace_all(&raw[..end], "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 8).unwrap()
    }

    #[test]
    fn test_render_without_thinking() {
        let prompt = ChatTemplate::new().render_on("Hi there", false, date());

        let expected = "<|im_start|>system\n\
## Metadata\n\n\
Knowledge Cutoff Date: June 2025\n\
Today Date: 08 July 2025\n\
Reasoning Mode: /no_think\n\n\
## Custom Instructions\n\n\
You are a helpful AI assistant named SmolLM, trained by Hugging Face.\n\n\
<|im_end|>\n\
<|im_start|>user\n\
Hi there<|im_end|>\n\
<|im_start|>assistant\n\
<think>\n\n</think>\n";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_render_with_thinking() {
        let prompt = ChatTemplate::new().render_on("Why?", true, date());

        assert!(prompt.contains("Reasoning Mode: /think\n"));
        assert!(prompt.contains("systematic thinking process"));
        assert!(prompt.ends_with("<|im_start|>user\nWhy?<|im_end|>\n<|im_start|>assistant\n"));
        assert!(!prompt.contains("<think>\n\n</think>"));
    }

    #[test]
    fn test_user_content_is_verbatim() {
        let content = "  line one\n\tline two  ";
        let prompt = ChatTemplate::new().render_on(content, false, date());
        assert!(prompt.contains(&format!("<|im_start|>user\n{}<|im_end|>", content)));
    }

    #[test]
    fn test_clean_response_truncates_at_end_of_turn() {
        let raw = "The answer is 4.<|im_end|>\n<|im_start|>user\nmore";
        assert_eq!(clean_response(raw), "The answer is 4.");
    }

    #[test]
    fn test_clean_response_keeps_reasoning_trace() {
        let raw = "<think>\n2 + 2 = 4\n</think>\nIt is 4.<|end_of_text|>";
        assert_eq!(clean_response(raw), "<think>\n2 + 2 = 4\n</think>\nIt is 4.");
    }

    #[test]
    fn test_clean_response_strips_stray_special_tokens() {
        assert_eq!(clean_response("  <|begin_of_text|>Hello  "), "Hello");
        assert_eq!(clean_response(""), "");
    }
}
