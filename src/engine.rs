//! Contract interaction engine.
//!
//! Every on-chain effect goes through here. Reads need a [`NodeHandle`];
//! deployments and sends take an [`ExecutionHandle`] and either broadcast
//! (signing) or hand back the encoded payload (offline). Which of the two
//! happens is decided in [`dispatch`] alone.

use crate::abi::{
    decode_event, decode_function_output, decode_revert_data, encode_deployment,
    encode_function_call, fields_to_json, is_revert_message, render_value, resolve_function,
    strip_revert_noise, AbiError, ContractArtifact, DecodedEvent,
};
use crate::provider::{ExecutionHandle, NodeHandle, SigningHandle};
use crate::rpc::{within, TimedOut};
use crate::types::{address_to_hex, format_hex, Argument};
use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, TxHash, TxKind};
use alloy_provider::Provider;
use alloy_rpc_types::{TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_transport::TransportError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Abi(#[from] AbiError),
    /// Rejected by contract logic; the message is the bare revert reason.
    #[error("{reason}")]
    Revert { reason: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error(transparent)]
    Timeout(#[from] TimedOut),
    #[error("transaction {tx_hash:#x} was not confirmed: {reason}")]
    Confirmation { tx_hash: TxHash, reason: String },
    #[error("transaction {tx_hash:#x} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("deployment {tx_hash:#x} did not report a contract address")]
    MissingContractAddress { tx_hash: TxHash },
}

/// Raw transaction data for an external signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedPayload {
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
}

impl EncodedPayload {
    pub fn data_hex(&self) -> String {
        format_hex(&self.data)
    }
}

/// Result of a write: broadcast and confirmed, or encoded only.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Broadcast(T),
    Encoded(EncodedPayload),
}

impl<T> Outcome<T> {
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Outcome<U>, E> {
        match self {
            Self::Broadcast(value) => f(value).map(Outcome::Broadcast),
            Self::Encoded(payload) => Ok(Outcome::Encoded(payload)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallResult {
    pub method: String,
    pub outputs: Vec<(String, DynSolValue)>,
}

impl CallResult {
    pub fn single(&self) -> Option<&DynSolValue> {
        match self.outputs.as_slice() {
            [(_, value)] => Some(value),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DynSolValue> {
        self.outputs
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn render(&self) -> String {
        match self.single() {
            Some(value) => render_value(value),
            None => self
                .outputs
                .iter()
                .map(|(name, value)| format!("{name}: {}", render_value(value)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        fields_to_json(&self.outputs)
    }
}

#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub events: Vec<DecodedEvent>,
    /// Logs no event of the artifact matched.
    pub unknown_logs: usize,
}

impl SendReceipt {
    pub fn event(&self, name: &str) -> Option<&DecodedEvent> {
        self.events.iter().find(|event| event.name == name)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "txHash": format!("{:#x}", self.tx_hash),
            "blockNumber": self.block_number,
            "gasUsed": self.gas_used,
            "events": self
                .events
                .iter()
                .map(|event| serde_json::json!({
                    "name": event.name,
                    "fields": fields_to_json(&event.fields),
                }))
                .collect::<Vec<_>>(),
            "unknownLogs": self.unknown_logs,
        })
    }
}

/// A method call or a deployment of one artifact, with its arguments still
/// in textual form.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    artifact: &'a ContractArtifact,
    target: Option<(Address, &'a str)>,
    args: Vec<Argument>,
}

impl<'a> Invocation<'a> {
    pub fn method(artifact: &'a ContractArtifact, address: Address, method: &'a str, args: Vec<Argument>) -> Self {
        Self {
            artifact,
            target: Some((address, method)),
            args,
        }
    }

    pub fn deployment(artifact: &'a ContractArtifact, args: Vec<Argument>) -> Self {
        Self {
            artifact,
            target: None,
            args,
        }
    }

    pub fn encode(&self) -> Result<EncodedPayload, EngineError> {
        let payload = match self.target {
            Some((address, method)) => EncodedPayload {
                to: Some(address),
                data: encode_function_call(self.artifact, method, &self.args)?,
            },
            None => EncodedPayload {
                to: None,
                data: encode_deployment(self.artifact, &self.args)?,
            },
        };
        Ok(payload)
    }

    fn label(&self) -> String {
        match self.target {
            Some((address, method)) => format!("{}.{method} at {}", self.artifact.name(), address_to_hex(address)),
            None => format!("{} deployment", self.artifact.name()),
        }
    }
}

/// Non-mutating query. Never needs a key.
pub async fn call_contract(
    node: &NodeHandle,
    artifact: &ContractArtifact,
    address: Address,
    method: &str,
    args: &[Argument],
) -> Result<CallResult, EngineError> {
    let function = resolve_function(artifact, method, args.len())?;
    let data = encode_function_call(artifact, method, args)?;
    let request = TransactionRequest {
        to: Some(TxKind::Call(address)),
        input: TransactionInput::new(data),
        ..Default::default()
    };

    tracing::debug!(contract = artifact.name(), method, address = %address, "eth_call");
    let output = within(node.timeout(), node.provider().call(request))
        .await?
        .map_err(|err| classify_transport_error(err, artifact.abi()))?;

    Ok(CallResult {
        method: method.to_string(),
        outputs: decode_function_output(function, &output)?,
    })
}

/// Deploys `artifact` or encodes its creation payload. In signing mode the
/// address is returned only once the creation receipt is successful.
pub async fn deploy_contract(
    handle: &ExecutionHandle,
    artifact: &ContractArtifact,
    args: Vec<Argument>,
) -> Result<Outcome<Address>, EngineError> {
    let invocation = Invocation::deployment(artifact, args);
    dispatch(handle, &invocation)
        .await?
        .try_map(|receipt| {
            receipt
                .contract_address
                .ok_or(EngineError::MissingContractAddress {
                    tx_hash: receipt.transaction_hash,
                })
        })
}

pub async fn send_transaction(
    handle: &ExecutionHandle,
    artifact: &ContractArtifact,
    address: Address,
    method: &str,
    args: Vec<Argument>,
) -> Result<Outcome<SendReceipt>, EngineError> {
    let invocation = Invocation::method(artifact, address, method, args);
    dispatch(handle, &invocation)
        .await?
        .try_map(|receipt| Ok(summarize_receipt(artifact.abi(), &receipt)))
}

async fn dispatch(
    handle: &ExecutionHandle,
    invocation: &Invocation<'_>,
) -> Result<Outcome<TransactionReceipt>, EngineError> {
    let payload = invocation.encode()?;
    match handle {
        ExecutionHandle::Offline => {
            tracing::debug!(target_tx = %invocation.label(), bytes = payload.data.len(), "encoded without broadcast");
            Ok(Outcome::Encoded(payload))
        }
        ExecutionHandle::Signing(signing) => broadcast(signing, invocation, payload)
            .await
            .map(Outcome::Broadcast),
    }
}

/// Unsigned transaction submitting `payload` from `from`. Creation payloads
/// have no recipient.
fn transaction_request(from: Address, payload: EncodedPayload) -> TransactionRequest {
    TransactionRequest {
        from: Some(from),
        to: Some(payload.to.map(TxKind::Call).unwrap_or(TxKind::Create)),
        input: TransactionInput::new(payload.data),
        ..Default::default()
    }
}

async fn broadcast(
    signing: &SigningHandle,
    invocation: &Invocation<'_>,
    payload: EncodedPayload,
) -> Result<TransactionReceipt, EngineError> {
    let node = signing.node();
    let provider = node.provider();
    let rpc_error = |err: TransportError| classify_transport_error(err, invocation.artifact.abi());

    // one request at a time: nonce, chain id, gas price, then the estimate,
    // which is where contract rejections surface
    let mut request = transaction_request(signing.from(), payload);
    request.nonce = Some(
        within(node.timeout(), provider.get_transaction_count(signing.from()).pending())
            .await?
            .map_err(rpc_error)?,
    );
    request.chain_id = Some(within(node.timeout(), provider.get_chain_id()).await?.map_err(rpc_error)?);
    request.gas_price = Some(within(node.timeout(), provider.get_gas_price()).await?.map_err(rpc_error)?);
    request.gas = Some(
        within(node.timeout(), provider.estimate_gas(request.clone()))
            .await?
            .map_err(rpc_error)?,
    );

    let pending = within(node.timeout(), provider.send_transaction(request))
        .await?
        .map_err(rpc_error)?;
    let tx_hash = *pending.tx_hash();
    tracing::info!(tx = %tx_hash, target_tx = %invocation.label(), "broadcast, waiting for inclusion");

    let receipt = wait_for_receipt(node, tx_hash).await?;
    if !receipt.status() {
        return Err(EngineError::Reverted { tx_hash });
    }
    tracing::info!(tx = %tx_hash, block = ?receipt.block_number, "included");
    Ok(receipt)
}

/// Polls for the receipt until the handle timeout elapses.
async fn wait_for_receipt(node: &NodeHandle, tx_hash: TxHash) -> Result<TransactionReceipt, EngineError> {
    let poll = async {
        loop {
            match node.provider().get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => tokio::time::sleep(RECEIPT_POLL_INTERVAL).await,
                Err(err) => {
                    return Err(EngineError::Confirmation {
                        tx_hash,
                        reason: err.to_string(),
                    })
                }
            }
        }
    };
    within(node.timeout(), poll)
        .await
        .map_err(|elapsed| EngineError::Confirmation {
            tx_hash,
            reason: elapsed.to_string(),
        })?
}

fn summarize_receipt(abi: &JsonAbi, receipt: &TransactionReceipt) -> SendReceipt {
    let mut events = Vec::new();
    let mut unknown_logs = 0;
    for log in receipt.inner.logs() {
        match decode_event(abi, log.topics(), &log.data().data) {
            Some(Ok(event)) => events.push(event),
            Some(Err(err)) => {
                tracing::warn!(%err, address = %log.address(), "failed to decode log");
                unknown_logs += 1;
            }
            None => unknown_logs += 1,
        }
    }
    SendReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        gas_used: receipt.gas_used,
        events,
        unknown_logs,
    }
}

fn classify_transport_error(err: TransportError, abi: &JsonAbi) -> EngineError {
    match err.as_error_resp() {
        Some(payload) => classify_error_response(abi, payload.code, &payload.message, payload.as_revert_data()),
        None => EngineError::Network(err.to_string()),
    }
}

fn classify_error_response(abi: &JsonAbi, code: i64, message: &str, revert_data: Option<Bytes>) -> EngineError {
    let decoded = revert_data.and_then(|data| decode_revert_data(abi, &data));
    let reason = match decoded {
        Some(reason) => reason,
        None if is_revert_message(message) => strip_revert_noise(message),
        None => {
            return EngineError::Rpc {
                code,
                message: message.to_string(),
            }
        }
    };
    if reason.is_empty() {
        return EngineError::Revert {
            reason: "reverted without a reason".to_string(),
        };
    }
    EngineError::Revert { reason }
}

/// Node answers for one signing broadcast, queued in the order the engine
/// issues its requests.
#[cfg(test)]
pub(crate) mod scripted {
    use alloy_primitives::{Address, Bloom, Bytes, TxHash, B256};
    use alloy_transport::mock::Asserter;
    use serde_json::{json, Value};

    /// Nonce, chain id, gas price and gas estimate.
    pub fn push_fill_responses(asserter: &Asserter) {
        asserter.push_success(&"0x0");
        asserter.push_success(&"0x7a69");
        asserter.push_success(&"0x3b9aca00");
        asserter.push_success(&"0x30d40");
    }

    pub fn push_broadcast(asserter: &Asserter, tx_hash: TxHash, receipt: Value) {
        push_fill_responses(asserter);
        asserter.push_success(&tx_hash);
        asserter.push_success(&receipt);
    }

    pub fn log(tx_hash: TxHash, address: Address, topics: &[B256], data: &[u8]) -> Value {
        json!({
            "address": address,
            "topics": topics,
            "data": Bytes::copy_from_slice(data),
            "blockHash": B256::repeat_byte(0xbb),
            "blockNumber": "0x1",
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "logIndex": "0x0",
            "removed": false,
        })
    }

    pub fn receipt(tx_hash: TxHash, success: bool, contract_address: Option<Address>, logs: Vec<Value>) -> Value {
        json!({
            "type": "0x0",
            "status": if success { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x30d40",
            "logs": logs,
            "logsBloom": Bloom::ZERO,
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0xbb),
            "blockNumber": "0x1",
            "gasUsed": "0x30d40",
            "effectiveGasPrice": "0x3b9aca00",
            "from": Address::ZERO,
            "to": null,
            "contractAddress": contract_address,
        })
    }
}
