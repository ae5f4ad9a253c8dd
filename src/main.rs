mod cli;
mod config;
mod error;
mod filtering;
mod models;
mod output;
mod providers;
mod query;
mod validator;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting ciquery - CI Query Tool");
    cli.execute()?;

    Ok(())
}
