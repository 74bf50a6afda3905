//! Boards command implementation

use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::config::MatrixConfig;
use crate::matrix::load_boards;

/// List available boards
#[derive(Args, Debug)]
pub struct BoardsCommand {
    /// Only list boards whose definition key matches the pattern
    #[arg(short, long, value_name = "PATTERN")]
    pub board: Option<String>,
}

impl BoardsCommand {
    /// Execute the boards command
    pub fn execute(self, config_path: Option<&Path>, verbose: bool) -> Result<()> {
        let config = MatrixConfig::load(config_path)?;
        let toolchain = &config.toolchain;
        let roots = vec![toolchain.packages.clone(), toolchain.root.join("hardware")];

        let boards = load_boards(
            &roots,
            &config.boards.definition_file,
            self.board.as_deref(),
            &config.variant,
        )?;

        println!("{} board(s) available", boards.len());
        for board in &boards {
            if verbose {
                println!("{} ({})", board.identifier, board.variant_string());
            } else {
                println!("{}", board.identifier);
            }
        }
        Ok(())
    }
}
