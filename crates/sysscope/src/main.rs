//! sysscope - system information collector

use clap::Parser;
use sysscope::cli::Cli;
use sysscope::{commands, errors, logging};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                errors::EXIT_USAGE
            } else {
                errors::EXIT_SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    logging::init(cli.log_level.as_deref());

    let code = match commands::run(cli).await {
        Ok(()) => errors::EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            errors::exit_code_for(&e)
        }
    };
    std::process::exit(code);
}
