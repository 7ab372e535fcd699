//! CLI module for one-shot/non-interactive mode.

use crate::ai::{AiService, HttpChatClient, looks_like_url};
use crate::config::{Backend, Config, config_path};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "walebquit", version, about = "Chat in your terminal, history kept in sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single prompt and print the reply
    Run(RunArgs),
    /// View or modify configuration
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// The prompt to send. Use "-" to read from stdin. A URL is summarized.
    pub prompt: String,

    /// Model override (e.g. "google/gemini-2.5-flash")
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output format
    #[arg(short = 'o', long, default_value = "text", value_enum)]
    pub output_format: OutputFormat,

    /// Suppress progress messages on stderr
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text response
    #[default]
    Text,
    /// Single JSON object
    Json,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Get a config value (backend, sync-url, model, api-key)
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Print the config file path
    Path,
}

/// JSON output for `-o json`.
#[derive(Serialize, Debug)]
#[serde(tag = "type")]
enum JsonEvent {
    #[serde(rename = "done")]
    Done { response: String },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Run a one-shot prompt without the interactive UI.
pub async fn run(args: RunArgs) -> ExitCode {
    match run_inner(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run_inner(args: RunArgs) -> Result<ExitCode> {
    if args.verbose {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(io::stderr)
            .try_init();
    }

    let config = Config::load()?;

    let prompt = if args.prompt == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer.trim().to_string()
    } else {
        args.prompt.trim().to_string()
    };
    if prompt.is_empty() {
        anyhow::bail!("Empty prompt");
    }

    let Some(api_key) = config.api_key() else {
        anyhow::bail!(
            "No API key configured. Set WALEBQUIT_API_KEY or run `walebquit config set api-key <key>`."
        );
    };
    let model = args.model.unwrap_or_else(|| config.ai.model.clone());
    let api = HttpChatClient::new(&config.ai.base_url, &api_key, model);
    let service = AiService::new(Arc::new(api));

    if !args.quiet && looks_like_url(&prompt) {
        eprintln!("Summarizing {prompt}...");
    }

    match service.respond(&prompt, &[]).await {
        Ok(response) => {
            output_response(&response, args.output_format)?;
            Ok(ExitCode::from(0))
        }
        Err(e) => {
            output_error(&e.to_string(), args.output_format)?;
            Ok(ExitCode::from(1))
        }
    }
}

fn output_response(response: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{response}"),
        OutputFormat::Json => {
            let event = JsonEvent::Done {
                response: response.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
    }
    Ok(())
}

fn output_error(message: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => eprintln!("Error: {message}"),
        OutputFormat::Json => {
            let event = JsonEvent::Error {
                message: message.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
    }
    Ok(())
}

/// Handle the `config` subcommand.
#[must_use]
pub fn config(args: ConfigArgs) -> ExitCode {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::from(1);
        }
    };

    match args.action {
        None => {
            println!("backend: {}", backend_name(config.history.backend));
            println!(
                "sync-url: {}",
                config.history.sync_url.as_deref().unwrap_or("(not set)")
            );
            println!("model: {}", config.ai.model);
            ExitCode::from(0)
        }
        Some(ConfigAction::Path) => {
            println!("{}", config_path().display());
            ExitCode::from(0)
        }
        Some(ConfigAction::Get { key }) => {
            let value = match key.as_str() {
                "backend" => Some(backend_name(config.history.backend).to_string()),
                "sync-url" => config.history.sync_url.clone(),
                "model" => Some(config.ai.model.clone()),
                "api-key" => config.ai.api_key.clone(),
                _ => {
                    eprintln!("Unknown key: {key}. Valid keys: backend, sync-url, model, api-key");
                    return ExitCode::from(1);
                }
            };
            println!("{}", value.as_deref().unwrap_or("(not set)"));
            ExitCode::from(0)
        }
        Some(ConfigAction::Set { key, value }) => {
            match key.as_str() {
                "backend" => match value.as_str() {
                    "local" => config.history.backend = Backend::Local,
                    "remote" => config.history.backend = Backend::Remote,
                    _ => {
                        eprintln!("Unknown backend: {value}. Valid backends: local, remote");
                        return ExitCode::from(1);
                    }
                },
                "sync-url" => config.history.sync_url = Some(value),
                "model" => config.ai.model = value,
                "api-key" => config.ai.api_key = Some(value),
                _ => {
                    eprintln!("Unknown key: {key}. Valid keys: backend, sync-url, model, api-key");
                    return ExitCode::from(1);
                }
            }
            if let Err(e) = config.save() {
                eprintln!("Failed to save config: {e}");
                return ExitCode::from(1);
            }
            println!("Updated {key}");
            ExitCode::from(0)
        }
    }
}

fn backend_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Local => "local",
        Backend::Remote => "remote",
    }
}
