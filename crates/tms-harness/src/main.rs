//! tms-harness - transmission-verification scenarios against a TMS deployment
//!
//! Logs in, subscribes to the push channel, fires one multicast, and prints
//! the verdict. Exits 0 only when the verdict is `Success`.

use clap::Parser;
use tms_harness_core::logging;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose() {
        logging::init_with_level(tracing::Level::DEBUG);
    } else {
        logging::init();
    }

    match cli.execute().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}
