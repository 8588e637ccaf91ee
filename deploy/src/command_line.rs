use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::{
    accounts::{signer_addresses, write_accounts},
    artifact::{FullyQualifiedName, SWAPII_FACTORY},
    config::{Config, DEFAULT_NETWORK},
    deploy::{report, Deploy},
    utils::provider,
};

/// Deploys the Swapii factory to the nahmii L2.
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct CommandLine {
    /// Network to use, as named in the configuration
    #[clap(short, long, global = true, default_value = DEFAULT_NETWORK)]
    network: String,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy the contract (default)
    Deploy(DeployArgs),
    /// Prints the list of accounts
    Accounts,
    /// Prints the resolved configuration, private keys redacted
    Config,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Directory holding the compiled contract artifacts (default: artifacts-nvm on
    /// NVM networks, artifacts otherwise)
    #[clap(short, long)]
    artifacts: Option<PathBuf>,

    /// Fully qualified name of the contract to deploy
    #[clap(short, long, default_value = SWAPII_FACTORY)]
    contract: FullyQualifiedName,
}

impl Default for DeployArgs {
    fn default() -> Self {
        Self {
            artifacts: None,
            contract: FullyQualifiedName::swapii_factory(),
        }
    }
}

impl CommandLine {
    pub async fn execute(self, config: Config) -> Result<()> {
        let mut stdout = std::io::stdout();

        match self.command.unwrap_or_else(|| Command::Deploy(DeployArgs::default())) {
            Command::Deploy(args) => {
                let deploy = Deploy::new(&config, &self.network, args.artifacts)?;
                let address = deploy.run(&args.contract).await?;
                report(&mut stdout, address)
            }
            Command::Accounts => {
                let network = config.network(&self.network)?;
                let accounts =
                    signer_addresses(&provider(&network.url)?, &network.accounts).await?;
                write_accounts(&mut stdout, &accounts)
            }
            Command::Config => {
                writeln!(stdout, "{}", config.to_json()?)?;
                Ok(())
            }
        }
    }
}
