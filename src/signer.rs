use crate::config::Config;
use crate::types::{parse_private_key, PrivateKey};
use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Result};

pub struct SignerOptions<'a> {
    pub private_key: Option<&'a PrivateKey>,
    pub private_key_env: Option<&'a str>,
}

/// Looks up the signing key: the explicit flag wins, then the configured
/// environment variable. `Ok(None)` means no key was supplied anywhere.
pub fn load_private_key(options: SignerOptions<'_>, config: &Config) -> Result<Option<PrivateKey>> {
    if options.private_key.is_some() && options.private_key_env.is_some() {
        anyhow::bail!("cannot set both --private-key and --private-key-env");
    }

    if let Some(key) = options.private_key {
        return Ok(Some(key.clone()));
    }

    let env = options
        .private_key_env
        .map(|value| value.to_string())
        .unwrap_or_else(|| config.signer_env());
    match std::env::var(&env) {
        Ok(value) if !value.trim().is_empty() => {
            let key = parse_private_key(value.trim())
                .map_err(|err| anyhow!("invalid private key in ${env}: {err}"))?;
            tracing::debug!(env = %env, "private key loaded from environment");
            Ok(Some(key))
        }
        _ => Ok(None),
    }
}

pub fn load_wallet(key: &PrivateKey) -> Result<PrivateKeySigner> {
    PrivateKeySigner::from_bytes(key.secret()).map_err(|err| anyhow!("invalid private key: {err}"))
}

pub fn signer_address(signer: &PrivateKeySigner) -> Address {
    signer.address()
}
