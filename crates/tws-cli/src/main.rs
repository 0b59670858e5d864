use tws_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; it falls back to stderr itself.
    if let Err(err) = logging::init_logging() {
        eprintln!("tws: logging disabled: {:#}", err);
    }

    // Parse CLI and dispatch.
    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("tws error: {:#}", err);
        std::process::exit(1);
    }
}
