mod mask;
mod palette;
mod trace;
mod utils;

use crate::cli::{Cli, Commands};
use pixtrace::VectorizeResult;

/// The main function to run the command based on CLI input.
pub fn run(cli: Cli) -> VectorizeResult<()> {
    dispatch(cli.command)
}

/// Dispatch the command to the appropriate handler.
fn dispatch(command: Commands) -> VectorizeResult<()> {
    match command {
        Commands::Trace(cmd) => trace::run(cmd),
        Commands::Mask(cmd) => mask::run(cmd),
        Commands::Palette(cmd) => palette::run(cmd),
    }
}
