//! Weaver CLI entry point.

use clap::Parser;

use weaver::cli::{Cli, Commands};
use weaver::infrastructure::{logging, ConfigLoader};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => {
            weaver::cli::handle_error(err, cli.json);
            return;
        }
    };

    if let Err(err) = logging::init(&config.logging) {
        weaver::cli::handle_error(err, cli.json);
        return;
    }

    let result = match cli.command {
        Commands::Init { force } => weaver::cli::commands::init::execute(force, cli.json).await,
        Commands::Run => weaver::cli::commands::run::execute(config, cli.json).await,
        Commands::Braid => weaver::cli::commands::braid::execute(config, cli.json).await,
        Commands::Motif(command) => {
            weaver::cli::commands::motif::execute(command, config, cli.json).await
        }
        Commands::Prediction(command) => {
            weaver::cli::commands::prediction::execute(command, config, cli.json).await
        }
    };

    if let Err(err) = result {
        weaver::cli::handle_error(err, cli.json);
    }
}
