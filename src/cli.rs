use std::path::PathBuf;
use clap::{Parser, Subcommand};

use crate::config::Overrides;
use crate::llm::GenerationParams;

/// Browser chat for a local SmolLM3 model
#[derive(Debug, Parser)]
#[command(name = "smolchat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory holding default.toml and local.toml
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: PathBuf,

    /// Host to run the server on
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to run the server on
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Hub repository holding the GGUF weights
    #[arg(long, global = true)]
    pub model_repo: Option<String>,

    /// GGUF file inside the hub repository
    #[arg(long, global = true)]
    pub model_file: Option<String>,

    /// Local GGUF file; skips the hub entirely
    #[arg(long, global = true)]
    pub model_path: Option<PathBuf>,

    /// Compute device: auto, cpu or gpu
    #[arg(long, global = true)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the web chat server (default)
    Serve,
    /// Start the server and an interactive terminal chat
    Run,
    /// Answer a single prompt and exit
    Ask {
        prompt: String,
        /// Enable extended thinking mode
        #[arg(long)]
        think: bool,
        #[arg(long)]
        max_tokens: Option<u32>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        top_p: Option<f32>,
    },
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            model_repo: self.model_repo.clone(),
            model_file: self.model_file.clone(),
            model_path: self.model_path.clone(),
            device: self.device.clone(),
        }
    }
}

impl Command {
    /// Knob values for `ask`, falling back to `defaults` for anything not given.
    pub fn ask_params(&self, defaults: GenerationParams) -> Option<GenerationParams> {
        match self {
            Command::Ask { think, max_tokens, temperature, top_p, .. } => Some(GenerationParams {
                max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
                temperature: temperature.unwrap_or(defaults.temperature),
                top_p: top_p.unwrap_or(defaults.top_p),
                enable_thinking: *think || defaults.enable_thinking,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["smolchat"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config_dir, PathBuf::from("config"));
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::parse_from(["smolchat", "serve", "--port", "8080", "--host", "0.0.0.0", "--device", "cpu"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.port, Some(8080));
        assert_eq!(overrides.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(overrides.device.as_deref(), Some("cpu"));
    }

    #[test]
    fn test_ask_params() {
        let cli = Cli::parse_from(["smolchat", "ask", "What is 2+2?", "--think", "--max-tokens", "100"]);
        let command = cli.command.unwrap();
        let params = command.ask_params(GenerationParams::default()).unwrap();
        assert_eq!(params.max_tokens, 100);
        assert!(params.enable_thinking);
        assert_eq!(params.top_p, GenerationParams::default().top_p);
        assert!(Command::Serve.ask_params(GenerationParams::default()).is_none());
    }
}
