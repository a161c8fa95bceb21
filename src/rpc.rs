use crate::provider::NodeHandle;
use alloy_provider::Provider;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error)]
#[error("node did not answer within {0:?}")]
pub struct TimedOut(pub Duration);

/// Bounds a node round-trip by the handle's timeout.
pub async fn within<F, T>(timeout: Duration, fut: F) -> Result<T, TimedOut>
where
    F: IntoFuture<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| TimedOut(timeout))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub endpoint: String,
    pub chain_id: Option<u64>,
    pub latest_block: Option<u64>,
    pub client_version: Option<String>,
}

pub async fn node_info(node: &NodeHandle) -> Result<NodeInfo> {
    let provider = node.provider();
    let chain_id = within(node.timeout(), provider.get_chain_id())
        .await?
        .map_err(|err| tracing::warn!(%err, "eth_chainId failed"))
        .ok();
    let latest_block = within(node.timeout(), provider.get_block_number())
        .await?
        .map_err(|err| tracing::warn!(%err, "eth_blockNumber failed"))
        .ok();
    let client_version = raw_rpc::<String>(node, "web3_clientVersion", json!([]))
        .await
        .map_err(|err| tracing::warn!(%err, "web3_clientVersion failed"))
        .ok();

    Ok(NodeInfo {
        endpoint: node.endpoint().to_string(),
        chain_id,
        latest_block,
        client_version,
    })
}

pub async fn raw_rpc<T: for<'de> Deserialize<'de>>(
    node: &NodeHandle,
    method: &str,
    params: serde_json::Value,
) -> Result<T> {
    let http = Client::builder()
        .timeout(node.timeout())
        .build()
        .context("failed to build http client")?;
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response = http
        .post(node.endpoint().clone())
        .json(&payload)
        .send()
        .await
        .context("rpc request failed")?;
    let status = response.status();
    let value: serde_json::Value = response.json().await.context("rpc decode failed")?;
    if !status.is_success() {
        anyhow::bail!("rpc error status {status}: {value}");
    }
    if let Some(error) = value.get("error") {
        anyhow::bail!("rpc error: {error}");
    }
    serde_json::from_value(value.get("result").cloned().unwrap_or_default())
        .context("rpc missing result")
}
