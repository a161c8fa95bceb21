pub mod create;
pub mod credentials;
pub mod deploy;
pub mod get;

use crate::abi::ArtifactStore;
use crate::config::Config;
use crate::engine::{EncodedPayload, Outcome};
use crate::provider::{
    resolve_read_only_handle, resolve_signing_handle, ExecutionHandle, KeyPolicy, NodeHandle,
    ProviderConfig,
};
use crate::signer::{load_private_key, SignerOptions};
use crate::types::{address_to_hex, PrivateKey};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Global options of one invocation, merged with the config file.
#[derive(Debug, Clone)]
pub struct Session {
    pub config: Config,
    pub artifacts: ArtifactStore,
    pub rpc_node: Option<String>,
    pub private_key: Option<PrivateKey>,
    pub private_key_env: Option<String>,
    pub data_only: bool,
    pub offline_fallback: bool,
    pub timeout: Duration,
    pub json: bool,
}

pub struct SessionFlags<'a> {
    pub rpc_node: Option<&'a str>,
    pub private_key: Option<&'a PrivateKey>,
    pub private_key_env: Option<&'a str>,
    pub generate_tx_data_only: bool,
    pub offline_fallback: bool,
    pub artifacts_dir: Option<&'a Path>,
    pub timeout_ms: Option<u64>,
    pub json: bool,
}

impl Session {
    pub fn new(config: Config, flags: SessionFlags<'_>) -> Self {
        Self {
            artifacts: ArtifactStore::new(config.artifacts_dir(flags.artifacts_dir)),
            rpc_node: config.node_url(flags.rpc_node),
            private_key: flags.private_key.cloned(),
            private_key_env: flags.private_key_env.map(str::to_string),
            data_only: flags.generate_tx_data_only,
            offline_fallback: flags.offline_fallback || config.offline_fallback(),
            timeout: config.timeout(flags.timeout_ms),
            json: flags.json,
            config,
        }
    }

    pub fn read_only_handle(&self) -> Result<NodeHandle> {
        Ok(resolve_read_only_handle(&self.provider_config(None))?)
    }

    /// Handle for write commands. The key is looked up only here, so reads
    /// never fail on a malformed key in the environment.
    pub fn signing_handle(&self) -> Result<ExecutionHandle> {
        let key = if self.data_only {
            self.private_key.clone()
        } else {
            load_private_key(
                SignerOptions {
                    private_key: self.private_key.as_ref(),
                    private_key_env: self.private_key_env.as_deref(),
                },
                &self.config,
            )?
        };
        Ok(resolve_signing_handle(&self.provider_config(key))?)
    }

    fn provider_config(&self, private_key: Option<PrivateKey>) -> ProviderConfig {
        ProviderConfig {
            endpoint: self.rpc_node.clone(),
            private_key,
            timeout: self.timeout,
            key_policy: if self.offline_fallback {
                KeyPolicy::FallbackOffline
            } else {
                KeyPolicy::Required
            },
            data_only: self.data_only,
        }
    }
}

/// Prints the payload an external signer has to submit.
pub fn print_send_guide(payload: &EncodedPayload, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "to": payload.to.map(address_to_hex),
                "data": payload.data_hex(),
            }))?
        );
        return Ok(());
    }

    println!("Send transaction with a following data:");
    println!();
    println!("{}", payload.data_hex());
    println!();
    match payload.to {
        Some(to) => {
            println!("to the following address:");
            println!();
            println!("{}", address_to_hex(to));
        }
        None => println!("as a contract creation transaction (no recipient address)."),
    }
    Ok(())
}

pub fn print_done(result: &str, json: Option<serde_json::Value>) -> Result<()> {
    match json {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => {
            println!("- done");
            println!("{result}");
        }
    }
    Ok(())
}

/// Unwraps a write that has to be broadcast for the command to go on.
pub fn require_broadcast<T>(outcome: Outcome<T>, what: &str) -> Result<T> {
    match outcome {
        Outcome::Broadcast(value) => Ok(value),
        Outcome::Encoded(_) => anyhow::bail!("{what} must be broadcast before the command can continue"),
    }
}
