use std::error::Error;
use std::io::Write;
use rustyline::DefaultEditor;
use colored::*;

use crate::llm::GenerationParams;
use super::command_handlers::{
    ChatContext,
    handle_generate,
    handle_info,
    handle_params,
    handle_set,
    handle_think,
};

fn print_help() {
    println!("\n{}", "SmolChat Commands".cyan());
    println!("{}", "=".repeat(60).bright_cyan());
    println!("{}        - Exit the chat", "exit, bye, quit".green());
    println!("{}                   - Show this help message", "help".green());
    println!("{}                  - Clear the screen", "clear".green());
    println!("{}                   - Show model and device information", "info".green());
    println!("{}                 - Show the current generation settings", "params".green());
    println!("{}          - Toggle or set extended thinking mode", "think [on|off]".green());
    println!("{} - Change max_tokens, temperature or top_p", "set <name> <value>".green());
    println!("Anything else is sent to the model as a prompt.");
    println!();
}

/// Interactive terminal chat against a running server.
pub async fn chat_loop(server_url: &str, defaults: GenerationParams) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting chat session");
    print_help();

    let mut rl = DefaultEditor::new()?;
    let client = reqwest::Client::new();
    let mut params = defaults;

    loop {
        let prompt_prefix = if params.enable_thinking { "[you 🧠] > " } else { "[you] > " };

        match rl.readline(prompt_prefix) {
            Ok(input) => {
                let input_trimmed = input.trim();
                if input_trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input_trimmed);

                let command_lowercase = input_trimmed.to_lowercase();
                if ["exit", "bye", "quit"].contains(&command_lowercase.as_str()) {
                    println!("Goodbye!");
                    break;
                }

                let mut context = ChatContext {
                    client: &client,
                    server_url,
                    params: &mut params,
                };

                let words: Vec<&str> = input_trimmed.split_whitespace().collect();
                match command_lowercase.as_str() {
                    "help" => print_help(),
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        std::io::stdout().flush()?;
                    }
                    "info" => handle_info(&context).await,
                    "params" => handle_params(&context),
                    "think" => handle_think(&mut context, ""),
                    cmd if cmd.starts_with("think ") => {
                        handle_think(&mut context, cmd["think ".len()..].trim())
                    }
                    cmd if cmd.starts_with("set ") => handle_set(&mut context, &words[1..]),
                    _ => handle_generate(&context, input_trimmed).await,
                }
            }
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        }
    }
    Ok(())
}
