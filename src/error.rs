use std::fmt;
use std::error::Error;

/// Errors raised while loading the model or answering a chat request
#[derive(Debug)]
pub enum ChatError {
    /// The model file could not be fetched from the hub
    Download(String),
    /// The resolved file is missing or is not a usable GGUF model
    InvalidModel(String),
    /// llama.cpp refused to load the weights
    ModelLoad(String),
    /// A llama.cpp session could not be created or fed
    Session(String),
    /// Prompt and requested completion do not fit the context window
    ContextOverflow {
        prompt_tokens: usize,
        max_tokens: u32,
        context_size: u32,
    },
    /// The prompt could not be tokenized
    Tokenization(String),
    /// Sampling failed after the prompt was accepted
    Generation(String),
    /// A generation knob is outside its accepted range
    InvalidParameter(String),
    /// A blocking worker panicked or was cancelled
    Task(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChatError::Download(msg) => write!(f, "Model download failed: {}", msg),
            ChatError::InvalidModel(msg) => write!(f, "Invalid model file: {}", msg),
            ChatError::ModelLoad(msg) => write!(f, "Failed to load model: {}", msg),
            ChatError::Session(msg) => write!(f, "Failed to prepare session: {}", msg),
            ChatError::ContextOverflow { prompt_tokens, max_tokens, context_size } => write!(
                f,
                "Prompt of {} tokens plus {} new tokens exceeds the context window of {} tokens",
                prompt_tokens, max_tokens, context_size
            ),
            ChatError::Tokenization(msg) => write!(f, "Tokenization failed: {}", msg),
            ChatError::Generation(msg) => write!(f, "Generation failed: {}", msg),
            ChatError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ChatError::Task(msg) => write!(f, "Background task failed: {}", msg),
        }
    }
}

impl Error for ChatError {}

impl From<tokio::task::JoinError> for ChatError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChatError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_overflow_message() {
        let err = ChatError::ContextOverflow {
            prompt_tokens: 4000,
            max_tokens: 256,
            context_size: 4096,
        };
        assert_eq!(
            err.to_string(),
            "Prompt of 4000 tokens plus 256 new tokens exceeds the context window of 4096 tokens"
        );
    }
}
