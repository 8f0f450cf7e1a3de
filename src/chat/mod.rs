mod display;
mod chat;
mod command_handlers;

pub use chat::chat_loop;
