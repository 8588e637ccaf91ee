mod accounts;
mod artifact;
mod command_line;
mod config;
mod deploy;
mod utils;

use anyhow::Result;
use clap::Parser;
use command_line::CommandLine;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let config = Config::load();
    let cmd = CommandLine::parse();
    cmd.execute(config).await
}
