//! CLI parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// csbx - run generated Python scripts under an execution profile
#[derive(Parser, Debug)]
#[command(name = "csbx")]
#[command(about = "Run generated scripts under import/call policies, a timeout and resource ceilings")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Path to settings file (default: <config dir>/code-sandbox/config.json)
    #[arg(short = 's', long = "settings", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script from disk
    RunFile {
        /// Script to run
        path: PathBuf,

        /// Execution profile
        #[arg(short = 'p', long = "profile")]
        profile: Option<String>,
    },

    /// Run code read from standard input
    RunStdin {
        /// Execution profile
        #[arg(short = 'p', long = "profile")]
        profile: Option<String>,

        /// Task description used to pick a profile when none is given
        #[arg(long = "prompt")]
        prompt: Option<String>,

        /// Print the full result as JSON instead of the script's output
        #[arg(long = "json")]
        json: bool,
    },

    /// Print the detected environment and the profile it selects
    Env {
        /// Execution profile
        #[arg(short = 'p', long = "profile")]
        profile: Option<String>,
    },
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// The profile named on the command line, if any.
    pub fn profile(&self) -> Option<&str> {
        match &self.command {
            Commands::RunFile { profile, .. }
            | Commands::RunStdin { profile, .. }
            | Commands::Env { profile } => profile.as_deref(),
        }
    }
}
