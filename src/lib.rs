pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod gguf;
pub mod llm;
pub mod server;
