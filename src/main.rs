mod cache;
mod cli;
mod clustering;
mod config;
mod dispatch;
mod error;
mod fetchers;
mod health;
mod models;
mod output;
mod queue;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting citriage - CI result triage tool");
    cli.execute().await?;

    Ok(())
}
