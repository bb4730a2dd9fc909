//! Command-line interface: clap definitions, command handlers, and
//! output formatting.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, MotifCommands, PredictionCommands};

/// Print an error consistently with the selected output mode and exit
/// non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
