use std::path::PathBuf;
use std::time::Duration;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::LlamaModel;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::ChatError;
use crate::gguf::GGUFReader;
use super::device::{Backends, Device};
use super::hub::{self, ModelSource};

pub const BACKEND: &str = "llama.cpp";

/// llama.cpp can only be initialised once per process
static LLAMA_BACKEND: OnceCell<Result<LlamaBackend, String>> = OnceCell::new();

/// Returns the process-wide llama.cpp backend, initialising it on first use.
pub(crate) fn backend() -> Result<&'static LlamaBackend, ChatError> {
    let result = LLAMA_BACKEND.get_or_init(|| {
        let mut backend = LlamaBackend::init().map_err(|e| e.to_string())?;
        backend.void_logs();
        Ok(backend)
    });
    result
        .as_ref()
        .map_err(|e| ChatError::ModelLoad(format!("llama.cpp backend failed to start: {}", e)))
}

/// Facts about the loaded model, shown in the System Info footer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Hub repository or local file name
    pub model_id: String,
    /// GGUF file the weights were read from
    pub file: Option<PathBuf>,
    /// Compute device label (CPU, CUDA, METAL)
    pub device: String,
    /// Inference backend name
    pub backend: String,
    /// Version of this application
    pub version: String,
    /// Display name from the GGUF metadata
    pub name: Option<String>,
    pub architecture: Option<String>,
    pub quantization: Option<String>,
    /// Context length the model was trained with
    pub training_context: Option<u64>,
    /// Context window used per request
    pub context_size: Option<u32>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub loaded_at: DateTime<Utc>,
}

impl ModelInfo {
    pub fn new(model_id: impl Into<String>, device: Device) -> Self {
        Self {
            model_id: model_id.into(),
            file: None,
            device: device.label().to_string(),
            backend: BACKEND.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            name: None,
            architecture: None,
            quantization: None,
            training_context: None,
            context_size: None,
            loaded_at: Utc::now(),
        }
    }

    /// Fills the metadata fields from the GGUF header.
    pub fn with_metadata(mut self, gguf: &GGUFReader) -> Self {
        self.name = gguf.name().map(str::to_string);
        self.architecture = gguf.architecture().map(str::to_string);
        self.quantization = gguf.quantization().map(str::to_string);
        self.training_context = gguf.context_length();
        self
    }
}

/// A model ready for generation together with its description
pub struct LoadedModel {
    pub model: LlamaModel,
    pub info: ModelInfo,
}

/// Resolves, inspects and loads the configured model.
///
/// Called once at startup; any error here should end the process.
pub async fn load_model(settings: &Settings) -> Result<LoadedModel, ChatError> {
    let source = ModelSource::from_config(&settings.model);
    info!("Loading model {}", source);

    let path = hub::resolve(&source, &settings.model).await?;

    let gguf = GGUFReader::new(&path)
        .map_err(|e| ChatError::InvalidModel(format!("{}: {}", path.display(), e)))?;
    if gguf.chat_template().is_none() {
        warn!("{} carries no chat template; using the built-in SmolLM3 format", path.display());
    }

    let device = Device::select(&settings.device, Backends::compiled());
    let n_gpu_layers = device.gpu_layers(&settings.device);
    info!("Device: {}", device);

    if let Some(trained) = gguf.context_length() {
        if u64::from(settings.inference.context_size) > trained {
            warn!(
                "context_size {} exceeds the {} tokens the model was trained with",
                settings.inference.context_size, trained
            );
        }
    }

    let use_mlock = settings.device.use_mlock;
    info!(n_gpu_layers, use_mlock, "Loading weights via llama.cpp");

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Loading {} on {}...", source.model_id(), device));

    let model_path = path.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let params = LlamaModelParams::default()
            .with_n_gpu_layers(n_gpu_layers)
            .with_use_mlock(use_mlock);
        LlamaModel::load_from_file(backend()?, &model_path, &params)
            .map_err(|e| ChatError::ModelLoad(e.to_string()))
    })
    .await;
    pb.finish_and_clear();

    let model = loaded??;

    let mut info = ModelInfo::new(source.model_id(), device).with_metadata(&gguf);
    info.file = Some(path);
    info.context_size = Some(settings.inference.context_size);

    info!("Model loaded successfully on {}", device);
    Ok(LoadedModel { model, info })
}
