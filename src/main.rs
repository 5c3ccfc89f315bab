mod cli;
mod logging;

use std::process;

use clap::Parser;

use console_relay::Config;

fn main() {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli, config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
