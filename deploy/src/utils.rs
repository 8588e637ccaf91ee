use anyhow::{bail, Context, Result};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::H160,
    utils::{hex, to_checksum},
};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub fn parse_wallet(sk: &str) -> Result<LocalWallet> {
    let bytes = hex::decode(sk.strip_prefix("0x").unwrap_or(sk)).context("private key is not hex")?;
    if bytes.len() != 32 {
        bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    Ok(LocalWallet::from_bytes(&bytes)?)
}

pub fn provider(rpc: &str) -> Result<Provider<Http>> {
    Provider::<Http>::try_from(rpc).with_context(|| format!("invalid rpc url {}", rpc))
}

pub async fn signer_client(rpc: &str, sk: &str) -> Result<SignerClient> {
    let wallet = parse_wallet(sk)?;
    let provider = provider(rpc)?;
    let chain_id = provider.get_chainid().await?.as_u64();
    log::info!("connected to {} (chain id {})", rpc, chain_id);

    Ok(SignerMiddleware::new(provider, wallet.with_chain_id(chain_id)))
}

pub fn checksum(address: H160) -> String {
    to_checksum(&address, None)
}
