use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::{Serialize, Serializer};

pub const DEFAULT_NETWORK: &str = "nahmii";
pub const DEFAULT_L2_URL: &str = "https://l2.testnet.nahmii.io";

pub const L2_URL_VAR: &str = "L2_URL";
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

const GAS_PRICE: u64 = 15_000_000;
const GAS_LIMIT: u64 = 10_000_000;

const SOLC_VERSION: &str = "0.7.6";
const OPTIMIZER_RUNS: u64 = 500;

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub solidity: SolidityConfig,
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolidityConfig {
    pub version: String,
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizerConfig {
    pub enabled: bool,
    pub runs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub url: String,
    #[serde(serialize_with = "redact_keys")]
    pub accounts: Vec<String>,
    pub gas_price: u64,
    pub gas: u64,
    pub nvm: bool,
}

impl Config {
    /// Loads the optional `.env` file and builds the configuration from the
    /// process environment. Variables already set take precedence over the file.
    pub fn load() -> Self {
        match dotenv::dotenv() {
            Ok(path) => log::debug!("loaded environment from {}", path.display()),
            Err(e) => log::debug!("no .env file loaded: {}", e),
        }
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(L2_URL_VAR).ok(),
            std::env::var(PRIVATE_KEY_VAR).ok(),
        )
    }

    pub fn from_vars(l2_url: Option<String>, private_key: Option<String>) -> Self {
        let url = l2_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_L2_URL.to_string());
        let accounts = private_key.into_iter().collect();

        let nahmii = NetworkConfig {
            url,
            accounts,
            gas_price: GAS_PRICE,
            gas: GAS_LIMIT,
            nvm: true,
        };

        Self {
            solidity: SolidityConfig {
                version: SOLC_VERSION.to_string(),
                optimizer: OptimizerConfig {
                    enabled: true,
                    runs: OPTIMIZER_RUNS,
                },
            },
            networks: BTreeMap::from([(DEFAULT_NETWORK.to_string(), nahmii)]),
        }
    }

    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            anyhow!(
                "unknown network `{}`, configured networks: {}",
                name,
                self.networks
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn redact_keys<S: Serializer>(keys: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(keys.iter().map(|_| REDACTED))
}
