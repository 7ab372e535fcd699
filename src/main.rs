use clap::Parser;
use std::process::ExitCode;
use walebquit::cli::{Cli, Commands};
use walebquit::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => {
            // One-shot CLI mode
            walebquit::cli::run(args).await
        }
        Some(Commands::Config(args)) => walebquit::cli::config(args),
        None => {
            let config = match Config::load() {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error loading config: {e}");
                    return ExitCode::FAILURE;
                }
            };

            // Interactive TUI mode
            match walebquit::tui::run(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
