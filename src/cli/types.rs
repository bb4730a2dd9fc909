//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "weaver")]
#[command(about = "Weaver - strand braiding and resonance pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize Weaver configuration and database
    Init {
        /// Force reinitialization even if already initialized
        #[arg(short, long)]
        force: bool,
    },

    /// Run the background pipeline (braiding, tracking, resonance)
    Run,

    /// Run one braiding pass and report the braids created
    Braid,

    /// Motif (pattern family) commands
    #[command(subcommand)]
    Motif(MotifCommands),

    /// Prediction lifecycle commands
    #[command(subcommand)]
    Prediction(PredictionCommands),
}

#[derive(Subcommand)]
pub enum MotifCommands {
    /// List resonance state per pattern family
    List,

    /// Show one family's state
    Show {
        /// Family name
        family: String,
    },

    /// Show the ranked experiment queue built from recent signals
    Queue,
}

#[derive(Subcommand)]
pub enum PredictionCommands {
    /// List predictions
    List {
        /// Filter by status (active, completed, expired, cancelled)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Cancel an active prediction
    Cancel {
        /// Prediction ID
        id: Uuid,
    },
}
