use std::io::Write;

use anyhow::{Context, Result};
use ethers::{providers::Middleware, signers::Signer, types::H160};

use crate::utils::{checksum, parse_wallet};

/// Signing accounts in signer order: the addresses of the configured keys, or
/// the node's own accounts when no key is configured.
pub async fn signer_addresses<M: Middleware + 'static>(
    provider: &M,
    keys: &[String],
) -> Result<Vec<H160>> {
    if keys.is_empty() {
        log::debug!("no private keys configured, asking the node for its accounts");
        return provider
            .get_accounts()
            .await
            .context("failed to fetch accounts from node");
    }

    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            parse_wallet(key)
                .map(|wallet| wallet.address())
                .with_context(|| format!("invalid private key at index {}", i))
        })
        .collect()
}

pub fn write_accounts<W: Write>(out: &mut W, accounts: &[H160]) -> Result<()> {
    for account in accounts {
        writeln!(out, "{}", checksum(*account))?;
    }
    Ok(())
}
