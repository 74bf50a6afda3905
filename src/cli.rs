//! CLI argument parsing using clap derive macros

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{
    boards::BoardsCommand, build::BuildCommand, clean::CleanCommand, init::InitCommand,
};

/// sketch-matrix - build every sketch against every board
///
/// Drives arduino-builder over a sketch × board matrix and reports which
/// combinations compile.
#[derive(Parser, Debug)]
#[command(name = "sketch-matrix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output, also passed to the builder
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (defaults to ./SketchMatrix.toml)
    #[arg(long, global = true, env = "SKETCH_MATRIX_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build sketches for the selected boards
    Build(BuildCommand),

    /// List available boards
    Boards(BoardsCommand),

    /// Delete the output directory
    Clean(CleanCommand),

    /// Write a default configuration file
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        let config = self.config.as_deref();
        match self.command {
            Commands::Build(cmd) => cmd.execute(config, self.verbose),
            Commands::Boards(cmd) => cmd.execute(config, self.verbose),
            Commands::Clean(cmd) => cmd.execute(config, self.verbose),
            Commands::Init(cmd) => cmd.execute(config, self.verbose),
        }
    }
}
