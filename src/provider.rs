//! Resolution of the execution handle used by a single CLI invocation.
//!
//! Reads only need a node endpoint. Writes either get a signing handle bound
//! to an endpoint and a private key, or the explicit `Offline` handle, in
//! which case every write is encoded and printed instead of broadcast.

use crate::signer::{load_wallet, signer_address};
use crate::types::PrivateKey;
use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("rpc node url is not specified")]
    MissingEndpoint,
    #[error("invalid rpc node url {value}: {reason}")]
    InvalidEndpoint { value: String, reason: String },
    #[error("private key is not specified")]
    MissingCredentials,
    #[error("invalid private key: {reason}")]
    InvalidCredentials { reason: String },
}

/// What to do when a write command finds no private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    #[default]
    Required,
    FallbackOffline,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub private_key: Option<PrivateKey>,
    pub timeout: Duration,
    pub key_policy: KeyPolicy,
    pub data_only: bool,
}

/// Read-only connection to a JSON-RPC node.
#[derive(Clone)]
pub struct NodeHandle {
    endpoint: Url,
    provider: DynProvider,
    timeout: Duration,
}

impl NodeHandle {
    pub(crate) fn new(endpoint: Url, provider: DynProvider, timeout: Duration) -> Self {
        Self {
            endpoint,
            provider,
            timeout,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Node connection whose provider signs with the configured key.
#[derive(Debug, Clone)]
pub struct SigningHandle {
    node: NodeHandle,
    from: Address,
}

impl SigningHandle {
    pub(crate) fn new(node: NodeHandle, from: Address) -> Self {
        Self { node, from }
    }

    pub fn node(&self) -> &NodeHandle {
        &self.node
    }

    pub fn from(&self) -> Address {
        self.from
    }
}

#[derive(Debug, Clone)]
pub enum ExecutionHandle {
    Signing(SigningHandle),
    Offline,
}

impl ExecutionHandle {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}

pub fn resolve_read_only_handle(config: &ProviderConfig) -> Result<NodeHandle, ConfigurationError> {
    let endpoint = parse_endpoint(config.endpoint.as_deref())?;
    let provider = ProviderBuilder::new()
        .connect_http(endpoint.clone())
        .erased();
    tracing::debug!(endpoint = %endpoint, "read-only handle resolved");
    Ok(NodeHandle::new(endpoint, provider, config.timeout))
}

pub fn resolve_signing_handle(config: &ProviderConfig) -> Result<ExecutionHandle, ConfigurationError> {
    if config.data_only {
        if config.private_key.is_some() {
            tracing::warn!("--generate-tx-data-only is set, ignoring the supplied private key");
        }
        tracing::info!("encode-only mode, transactions will not be broadcast");
        return Ok(ExecutionHandle::Offline);
    }

    let endpoint = parse_endpoint(config.endpoint.as_deref())?;

    let Some(key) = config.private_key.as_ref() else {
        return match config.key_policy {
            KeyPolicy::Required => Err(ConfigurationError::MissingCredentials),
            KeyPolicy::FallbackOffline => {
                tracing::warn!("no private key found, falling back to encode-only mode");
                Ok(ExecutionHandle::Offline)
            }
        };
    };

    let wallet = load_wallet(key).map_err(|err| ConfigurationError::InvalidCredentials {
        reason: err.to_string(),
    })?;
    let from = signer_address(&wallet);
    // nonce, chain id and gas are filled by the engine before signing
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .wallet(EthereumWallet::from(wallet))
        .connect_http(endpoint.clone())
        .erased();
    tracing::info!(from = %from, endpoint = %endpoint, "signing handle resolved");

    Ok(ExecutionHandle::Signing(SigningHandle::new(
        NodeHandle::new(endpoint, provider, config.timeout),
        from,
    )))
}

fn parse_endpoint(value: Option<&str>) -> Result<Url, ConfigurationError> {
    let value = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigurationError::MissingEndpoint)?;
    Url::parse(value).map_err(|err| ConfigurationError::InvalidEndpoint {
        value: value.to_string(),
        reason: err.to_string(),
    })
}

/// Signing handle over a scripted transport, answering requests in order.
#[cfg(test)]
pub(crate) mod mocked {
    use super::*;
    use crate::types::parse_private_key;
    use alloy_transport::mock::Asserter;

    pub const KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    pub fn signing_handle(asserter: &Asserter) -> ExecutionHandle {
        let wallet = load_wallet(&parse_private_key(KEY).unwrap()).unwrap();
        let from = signer_address(&wallet);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .wallet(EthereumWallet::from(wallet))
            .connect_mocked_client(asserter.clone())
            .erased();
        let endpoint = Url::parse("http://mocked.invalid").unwrap();
        ExecutionHandle::Signing(SigningHandle::new(
            NodeHandle::new(endpoint, provider, Duration::from_secs(5)),
            from,
        ))
    }
}
