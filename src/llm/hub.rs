use std::fmt;
use std::path::PathBuf;
use hf_hub::{api::tokio::ApiBuilder, Repo, RepoType};
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::ChatError;
use crate::gguf::is_gguf_file;

/// Where the GGUF weights are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A file already on disk
    Local(PathBuf),
    /// A file inside a hub repository
    Hub {
        repo: String,
        file: String,
        revision: String,
    },
}

impl ModelSource {
    pub fn from_config(config: &ModelConfig) -> Self {
        match &config.path {
            Some(path) => ModelSource::Local(path.clone()),
            None => ModelSource::Hub {
                repo: config.repo.clone(),
                file: config.file.clone(),
                revision: config.revision.clone(),
            },
        }
    }

    /// Identifier shown to users: the hub repo or the local file name
    pub fn model_id(&self) -> String {
        match self {
            ModelSource::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            ModelSource::Hub { repo, .. } => repo.clone(),
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelSource::Local(path) => write!(f, "{}", path.display()),
            ModelSource::Hub { repo, file, revision } => write!(f, "{}/{}@{}", repo, file, revision),
        }
    }
}

/// Turns a model source into a GGUF file on local disk, downloading it when needed.
pub async fn resolve(source: &ModelSource, config: &ModelConfig) -> Result<PathBuf, ChatError> {
    let path = match source {
        ModelSource::Local(path) => {
            if !path.is_file() {
                return Err(ChatError::InvalidModel(format!("{} does not exist", path.display())));
            }
            info!("Using local model file: {}", path.display());
            path.clone()
        }
        ModelSource::Hub { repo, file, revision } => {
            let mut api_builder = ApiBuilder::new().with_progress(true);

            match std::env::var(&config.token_env) {
                Ok(token) if !token.is_empty() => {
                    info!("Using hub token from {}", config.token_env);
                    api_builder = api_builder.with_token(Some(token));
                }
                _ => {}
            }
            if let Some(cache_dir) = &config.cache_dir {
                api_builder = api_builder.with_cache_dir(cache_dir.clone());
            }

            let api = api_builder
                .build()
                .map_err(|e| ChatError::Download(e.to_string()))?;
            let repository = api.repo(Repo::with_revision(
                repo.clone(),
                RepoType::Model,
                revision.clone(),
            ));

            info!("Fetching {} from {} ({})", file, repo, revision);
            let path = repository.get(file).await.map_err(|e| {
                warn!("Hub download of {} failed: {}", file, e);
                ChatError::Download(format!("{}/{}: {}", repo, file, e))
            })?;
            info!("Model file available at {}", path.display());
            path
        }
    };

    if !is_gguf_file(&path) {
        return Err(ChatError::InvalidModel(format!(
            "{} is not a GGUF file",
            path.display()
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn model_config(path: Option<PathBuf>) -> ModelConfig {
        ModelConfig {
            repo: "ggml-org/SmolLM3-3B-GGUF".to_string(),
            file: "SmolLM3-Q4_K_M.gguf".to_string(),
            revision: "main".to_string(),
            path,
            cache_dir: None,
            token_env: "HF_TOKEN".to_string(),
        }
    }

    #[test]
    fn test_source_from_config() {
        let hub = ModelSource::from_config(&model_config(None));
        assert_eq!(hub.model_id(), "ggml-org/SmolLM3-3B-GGUF");
        assert_eq!(hub.to_string(), "ggml-org/SmolLM3-3B-GGUF/SmolLM3-Q4_K_M.gguf@main");

        let local = ModelSource::from_config(&model_config(Some(PathBuf::from("/models/smol.gguf"))));
        assert_eq!(local, ModelSource::Local(PathBuf::from("/models/smol.gguf")));
        assert_eq!(local.model_id(), "smol.gguf");
    }

    #[tokio::test]
    async fn test_resolve_local_gguf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"GGUF\x03\x00\x00\x00").unwrap();
        let path = file.path().to_path_buf();

        let source = ModelSource::Local(path.clone());
        let resolved = resolve(&source, &model_config(Some(path.clone()))).await.unwrap();
        assert_eq!(resolved, path);
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_gguf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a model").unwrap();
        let path = file.path().to_path_buf();

        let source = ModelSource::Local(path.clone());
        let err = resolve(&source, &model_config(Some(path))).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidModel(_)));
    }

    #[tokio::test]
    async fn test_resolve_missing_local_file() {
        let source = ModelSource::Local(PathBuf::from("/nonexistent/model.gguf"));
        let err = resolve(&source, &model_config(None)).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
