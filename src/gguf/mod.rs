mod gguf;
mod gguf_utils;
mod types;

pub use types::{GGUFError, GGUFValue, GGUFValueType, quantization_label};
pub use gguf::GGUFReader;
pub use gguf_utils::{is_gguf_file, GGUF_MAGIC};
