use std::{io::Write, path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{
    providers::{JsonRpcClient, Middleware, Provider},
    types::{transaction::eip2718::TypedTransaction, H160, U64},
};

use crate::{
    accounts::signer_addresses,
    artifact::{default_artifacts_dir, Artifact, ArtifactStore, FullyQualifiedName},
    config::{Config, NetworkConfig, SolidityConfig},
    utils::{checksum, provider, signer_client},
};

pub struct Deploy {
    network_name: String,
    network: NetworkConfig,
    solidity: SolidityConfig,
    artifacts: ArtifactStore,
}

impl Deploy {
    pub fn new(config: &Config, network: &str, artifacts: Option<PathBuf>) -> Result<Self> {
        let network_config = config.network(network)?.clone();
        let artifacts = artifacts
            .unwrap_or_else(|| PathBuf::from(default_artifacts_dir(network_config.nvm)));
        log::debug!("reading artifacts from {}", artifacts.display());

        Ok(Self {
            network_name: network.to_string(),
            network: network_config,
            solidity: config.solidity.clone(),
            artifacts: ArtifactStore::new(artifacts),
        })
    }

    /// Deploys a new instance of `contract` without constructor arguments and
    /// returns its address once the creation transaction is confirmed.
    pub async fn run(&self, contract: &FullyQualifiedName) -> Result<H160> {
        let artifact = self
            .resolve(contract)
            .with_context(|| format!("failed to resolve contract factory for {}", contract))?;

        let address = match self.network.accounts.first() {
            Some(sk) => {
                let client = signer_client(&self.network.url, sk).await?;
                self.deploy_artifact(Arc::new(client), &artifact).await
            }
            None => {
                let provider = provider(&self.network.url)?;
                self.deploy_from_node_account(provider, &artifact).await
            }
        };
        address.with_context(|| format!("failed to deploy {} to {}", contract, self.network_name))
    }

    fn resolve(&self, contract: &FullyQualifiedName) -> Result<Artifact> {
        let artifact = self.artifacts.read(contract)?;
        self.artifacts.verify_build_info(contract, &self.solidity)?;
        Ok(artifact)
    }

    async fn deploy_from_node_account<P: JsonRpcClient + 'static>(
        &self,
        provider: Provider<P>,
        artifact: &Artifact,
    ) -> Result<H160> {
        let from = signer_addresses(&provider, &[])
            .await?
            .first()
            .copied()
            .ok_or_else(|| {
                anyhow!(
                    "no signing account available for network {}, set PRIVATE_KEY",
                    self.network_name
                )
            })?;
        self.deploy_artifact(Arc::new(provider.with_sender(from)), artifact)
            .await
    }

    fn apply_gas(&self, tx: &mut TypedTransaction) {
        tx.set_gas(self.network.gas);
        tx.set_gas_price(self.network.gas_price);
    }

    async fn deploy_artifact<M: Middleware + 'static>(
        &self,
        client: Arc<M>,
        artifact: &Artifact,
    ) -> Result<H160> {
        let mut deployer = artifact.factory(client)?.deploy(())?.legacy();
        self.apply_gas(&mut deployer.tx);
        if let Some(from) = deployer.tx.from() {
            log::info!("deployer address:{:?}", from);
        }

        let (contract, receipt) = deployer.send_with_receipt().await?;
        log::info!("transaction hash:{:?}", receipt.transaction_hash);
        log::info!(
            "confirmed in block {:?}, gas used {:?}",
            receipt.block_number,
            receipt.gas_used
        );
        if receipt.status != Some(U64::one()) {
            bail!("deployment transaction {:?} reverted", receipt.transaction_hash);
        }

        Ok(contract.address())
    }
}

pub fn report<W: Write>(out: &mut W, address: H160) -> Result<()> {
    writeln!(out, "Swapii Factory deployed to: {}", checksum(address))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, time::Duration};

    use ethers::{
        providers::MockProvider,
        types::{Transaction, TransactionReceipt, H256},
    };

    use super::*;
    use crate::artifact::{
        tests::{write_artifact, BYTECODE},
        SWAPII_FACTORY,
    };

    fn deploy_in(dir: &std::path::Path) -> (Deploy, Artifact) {
        let name = FullyQualifiedName::swapii_factory();
        write_artifact(dir, &name, BYTECODE);

        let config = Config::from_vars(None, None);
        let deploy = Deploy::new(&config, "nahmii", Some(dir.to_path_buf())).unwrap();
        let artifact = deploy.resolve(&name).unwrap();
        (deploy, artifact)
    }

    fn mocked() -> (Provider<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (provider.interval(Duration::from_millis(5)), mock)
    }

    // responses are served last in, first out
    fn push_mined_creation(mock: &MockProvider, status: u64, contract: H160) -> H256 {
        let hash = H256::from_low_u64_be(0x5a);
        mock.push::<TransactionReceipt, _>(TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(7u64.into()),
            status: Some(status.into()),
            contract_address: Some(contract),
            ..Default::default()
        })
        .unwrap();
        mock.push::<Transaction, _>(Transaction {
            hash,
            block_number: Some(7u64.into()),
            ..Default::default()
        })
        .unwrap();
        mock.push::<H256, _>(hash).unwrap();
        hash
    }

    fn expected_creation_tx(deploy: &Deploy, artifact: &Artifact, from: H160) -> TypedTransaction {
        let (provider, _mock) = Provider::mocked();
        let mut tx = artifact
            .factory(Arc::new(provider))
            .unwrap()
            .deploy(())
            .unwrap()
            .legacy()
            .tx;
        deploy.apply_gas(&mut tx);
        tx.set_from(from);
        tx
    }

    #[test]
    fn report_line() {
        let address = H160::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        let mut out = Vec::new();
        report(&mut out, address).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(
            out,
            "Swapii Factory deployed to: 0x5FbDB2315678afecb367f032d93F642f64180aa3\n"
        );
        let printed = out
            .trim_end()
            .strip_prefix("Swapii Factory deployed to: ")
            .unwrap();
        assert_eq!(H160::from_str(printed).unwrap(), address);
    }

    #[test]
    fn unknown_network_is_rejected() {
        let config = Config::from_vars(None, None);
        assert!(Deploy::new(&config, "goerli", None).is_err());
        assert!(Deploy::new(&config, "nahmii", None).is_ok());
    }

    #[test]
    fn nvm_network_reads_nvm_artifacts_by_default() {
        let config = Config::from_vars(Some("http://127.0.0.1:1".to_string()), None);
        let deploy = Deploy::new(&config, "nahmii", None).unwrap();
        assert_eq!(
            deploy
                .artifacts
                .artifact_path(&FullyQualifiedName::swapii_factory()),
            PathBuf::from("artifacts-nvm/contracts/SwapiiFactory.sol/SwapiiFactory.json")
        );
    }

    #[tokio::test]
    async fn missing_artifact_fails_before_touching_the_network() {
        let dir = tempfile::tempdir().unwrap();
        // unroutable endpoint, must never be contacted
        let config = Config::from_vars(Some("http://127.0.0.1:1".to_string()), None);
        let deploy = Deploy::new(&config, "nahmii", Some(dir.path().to_path_buf())).unwrap();

        let err = deploy
            .run(&SWAPII_FACTORY.parse().unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to resolve contract factory for contracts/SwapiiFactory.sol:SwapiiFactory"
        );
    }

    #[tokio::test]
    async fn deploys_legacy_tx_with_configured_gas() {
        let dir = tempfile::tempdir().unwrap();
        let (deploy, artifact) = deploy_in(dir.path());
        let sender = H160::from_low_u64_be(0x11);
        let contract = H160::from_low_u64_be(0xabc);

        let (provider, mock) = mocked();
        let hash = push_mined_creation(&mock, 1, contract);

        let address = deploy
            .deploy_artifact(Arc::new(provider.with_sender(sender)), &artifact)
            .await
            .unwrap();
        assert_eq!(address, contract);

        let expected = expected_creation_tx(&deploy, &artifact, sender);
        assert!(matches!(expected, TypedTransaction::Legacy(_)));
        assert_eq!(expected.gas(), Some(&10_000_000u64.into()));
        assert_eq!(expected.gas_price(), Some(15_000_000u64.into()));
        mock.assert_request("eth_sendTransaction", [expected]).unwrap();
        mock.assert_request("eth_getTransactionByHash", [hash]).unwrap();
        mock.assert_request("eth_getTransactionReceipt", [hash]).unwrap();

        let mut out = Vec::new();
        report(&mut out, address).unwrap();
        let out = String::from_utf8(out).unwrap();
        let printed = out
            .trim_end()
            .strip_prefix("Swapii Factory deployed to: ")
            .unwrap();
        assert_eq!(H160::from_str(printed).unwrap(), contract);
    }

    #[tokio::test]
    async fn reverted_creation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (deploy, artifact) = deploy_in(dir.path());

        let (provider, mock) = mocked();
        push_mined_creation(&mock, 0, H160::from_low_u64_be(0xabc));

        let err = deploy
            .deploy_artifact(
                Arc::new(provider.with_sender(H160::from_low_u64_be(0x11))),
                &artifact,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reverted"));
    }

    #[tokio::test]
    async fn without_key_deploys_from_first_node_account() {
        let dir = tempfile::tempdir().unwrap();
        let (deploy, artifact) = deploy_in(dir.path());
        let node_accounts = vec![H160::from_low_u64_be(0x21), H160::from_low_u64_be(0x22)];
        let contract = H160::from_low_u64_be(0xabc);

        let (provider, mock) = mocked();
        push_mined_creation(&mock, 1, contract);
        mock.push::<Vec<H160>, _>(node_accounts.clone()).unwrap();

        let address = deploy
            .deploy_from_node_account(provider, &artifact)
            .await
            .unwrap();
        assert_eq!(address, contract);

        mock.assert_request("eth_accounts", ()).unwrap();
        let expected = expected_creation_tx(&deploy, &artifact, node_accounts[0]);
        mock.assert_request("eth_sendTransaction", [expected]).unwrap();
    }

    #[tokio::test]
    async fn without_key_or_node_account_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (deploy, artifact) = deploy_in(dir.path());

        let (provider, mock) = mocked();
        mock.push::<Vec<H160>, _>(Vec::new()).unwrap();

        let err = deploy
            .deploy_from_node_account(provider, &artifact)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("PRIVATE_KEY"));
    }
}
