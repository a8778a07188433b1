mod app;
mod cli;
mod config;
mod core;
mod executors;
mod parser;
mod plugins;
mod reporters;
mod ui;
mod utils;

#[cfg(test)]
mod testing;

use clap::Parser;

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = cli::args::Cli::parse();
    if let Err(err) = app::run(cli).await {
        eprintln!("fatal: {:#}", err);
        std::process::exit(1);
    }
}
