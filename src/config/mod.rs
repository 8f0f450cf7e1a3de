// Required external crates for configuration management and serialization
use serde::Deserialize;
use std::path::{Path, PathBuf};
use config::{Config, ConfigError, Environment, File};

use crate::llm::params::{GenerationParams, MAX_TOKENS, TEMPERATURE, TOP_P};

/// Where the model weights come from
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Hub repository holding the GGUF file
    pub repo: String,
    /// GGUF filename inside the repository
    pub file: String,
    /// Repository revision (branch, tag or commit)
    pub revision: String,
    /// Local GGUF file; when set the hub is never contacted
    pub path: Option<PathBuf>,
    /// Override for the hub download cache
    pub cache_dir: Option<PathBuf>,
    /// Name of the environment variable holding a hub access token
    pub token_env: String,
}

/// Compute device selection
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// One of "auto", "cpu" or "gpu"
    pub preference: String,
    /// Layers offloaded when a GPU backend is selected
    pub gpu_layers: u32,
    /// Pin the weights in RAM
    pub use_mlock: bool,
}

/// Configuration for the llama.cpp context created per request
#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    /// Size of the context window (prompt + generated tokens)
    pub context_size: u32,
    /// Prompt processing batch size
    pub batch_size: u32,
    /// Worker threads; llama.cpp picks when unset
    pub threads: Option<u32>,
    /// Generations allowed to run at the same time
    pub max_concurrent: usize,
}

/// Defaults applied when a request omits a generation knob
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub enable_thinking: bool,
}

impl GenerationConfig {
    pub fn to_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            enable_thinking: self.enable_thinking,
        }
    }
}

/// Configuration for the HTTP server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Optional directory for daily log files
    pub directory: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub model: ModelConfig,
    pub device: DeviceConfig,
    pub inference: InferenceConfig,
    pub generation: GenerationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_repo: Option<String>,
    pub model_file: Option<String>,
    pub model_path: Option<PathBuf>,
    pub device: Option<String>,
}

impl Settings {
    /// Creates a new Settings instance by loading config from multiple sources
    /// in the following order of precedence (highest to lowest):
    /// 1. Command line overrides
    /// 2. Environment variables prefixed with SMOLCHAT__
    /// 3. Local config file (local.toml) if present
    /// 4. Default config file (default.toml) if present
    /// 5. Built-in defaults
    pub fn load(config_dir: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let default_config = config_dir.join("default.toml");
        let local_config = config_dir.join("local.toml");

        // Convert paths to strings and keep them alive
        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name(&default_config_path).required(false))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(
                Environment::with_prefix("SMOLCHAT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .set_override_option("model.repo", overrides.model_repo.clone())?
            .set_override_option("model.file", overrides.model_file.clone())?
            .set_override_option(
                "model.path",
                overrides.model_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            )?
            .set_override_option("device.preference", overrides.device.clone())?;

        let settings = builder.build()?.try_deserialize::<Settings>()?;

        // Validate settings after loading
        settings.validate()?;

        Ok(settings)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("model.repo", "ggml-org/SmolLM3-3B-GGUF")?
            .set_default("model.file", "SmolLM3-Q4_K_M.gguf")?
            .set_default("model.revision", "main")?
            .set_default("model.token_env", "HF_TOKEN")?
            .set_default("device.preference", "auto")?
            .set_default("device.gpu_layers", 999)?
            .set_default("device.use_mlock", false)?
            .set_default("inference.context_size", 4096)?
            .set_default("inference.batch_size", 512)?
            .set_default("inference.max_concurrent", 1)?
            .set_default("generation.max_tokens", MAX_TOKENS.default as i64)?
            .set_default("generation.temperature", TEMPERATURE.default as f64)?
            .set_default("generation.top_p", TOP_P.default as f64)?
            .set_default("generation.enable_thinking", false)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 7860)?
            .set_default("logging.level", "info")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.model.path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Message(
                        format!("Model file not found at: {}", path.display())
                    ));
                }
            }
            None => {
                if self.model.repo.trim().is_empty() || self.model.file.trim().is_empty() {
                    return Err(ConfigError::Message(
                        "model.repo and model.file are required when model.path is not set".to_string()
                    ));
                }
            }
        }

        match self.device.preference.to_lowercase().as_str() {
            "auto" | "cpu" | "gpu" => {}
            other => return Err(ConfigError::Message(
                format!("Invalid device preference: {}. Must be one of: auto, cpu, gpu", other)
            )),
        }

        if self.inference.context_size == 0 {
            return Err(ConfigError::Message(
                "context_size must be greater than 0".to_string()
            ));
        }

        if self.inference.batch_size == 0 {
            return Err(ConfigError::Message(
                "batch_size must be greater than 0".to_string()
            ));
        }

        if self.inference.max_concurrent == 0 {
            return Err(ConfigError::Message(
                "max_concurrent must be greater than 0".to_string()
            ));
        }

        self.generation
            .to_params()
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid generation defaults: {}", e)))?;

        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Port must be between 1 and 65535, got: 0".to_string()
            ));
        }

        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::Message(
                format!("Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    self.logging.level)
            )),
        }?;

        // Create log directory if configured and doesn't exist
        if let Some(dir) = &self.logging.directory {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ConfigError::Message(format!(
                        "Failed to create log directory at {}: {}",
                        dir.display(), e
                    ))
                })?;
            }
        }

        Ok(())
    }
}
