pub mod device;
pub mod engine;
pub mod hub;
pub mod loader;
pub mod params;
pub mod template;

// Re-export types for external use
pub use engine::{ChatService, Generation, LlamaGenerator, TextGenerator};
pub use loader::{load_model, LoadedModel, ModelInfo};
pub use params::GenerationParams;
