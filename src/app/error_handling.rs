//! Error handling utilities
//!
//! This module provides centralized error handling for the application.

use tracing::error;

/// Handle fatal errors and exit with appropriate status code.
///
/// - For [`crate::error::EngineError`]: shows the user message always, the
///   full source chain in verbose mode.
/// - For other errors: shows the anyhow chain and falls back to a generic
///   exit code.
///
/// # Verbose Mode Behavior
/// - `verbose = 0`: user-friendly messages only
/// - `verbose >= 1`: includes full developer context with error chain
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    use crate::error::EngineError;

    error!("Fatal error: {}", error);

    let exit_code = if let Some(engine_err) = error.downcast_ref::<EngineError>() {
        eprintln!("{}", engine_err.user_message());

        if verbose >= 1 {
            eprintln!("\nContext Chain:\n{}", engine_err.developer_message());
        }

        engine_err.exit_code()
    } else {
        eprintln!("Error: {error}");

        if verbose >= 1 {
            eprintln!("\nError chain:");
            for (i, cause) in error.chain().enumerate() {
                eprintln!("  {}: {}", i, cause);
            }
        }

        if error.to_string().contains("required") || error.to_string().contains("Please specify")
        {
            2 // argument error
        } else {
            1 // general error
        }
    };

    std::process::exit(exit_code)
}
