//! specforge CLI entry point
//!
//! Thin composition layer: parses arguments, initializes the application,
//! routes to the engine's public API, and reports fatal errors.

use clap::Parser;
use tracing::error;

use specforge::app::{handle_fatal_error, initialize_app, AppConfig};
use specforge::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Create application configuration: built-in defaults layered with any
    // project-level `.specforge/config.toml` and `SPECFORGE_*` env overrides.
    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Failed to read current directory: {}", e);
            std::process::exit(1);
        }
    };
    let app_config = match AppConfig::load(&working_dir, cli.verbose).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to initialize application configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize the application (logging, storage migration, etc.)
    if let Err(e) = initialize_app(app_config).await {
        error!("Application initialization failed: {}", e);
        // Continue anyway - most initialization failures are non-fatal
    }

    // Execute the requested command
    let result = execute_command(cli.command, cli.verbose).await;

    // Handle any errors that occurred during command execution
    if let Err(e) = result {
        handle_fatal_error(e, cli.verbose);
    }
}
