mod cli;
mod logging;

use clap::{Parser, error::ErrorKind};
use eyre::Result;

use crate::cli::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                return Ok(());
            }
            _ => {
                eprint!("{}", err.render());
                cli::usage_hint();
                std::process::exit(1);
            }
        },
    };

    let code = cli.run()?;
    std::process::exit(code)
}
