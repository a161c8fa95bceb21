use crate::types::{address_to_hex, format_hex, Argument};
use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Event, Function, JsonAbi, Param};
use alloy_primitives::{Bytes, B256};
use alloy_sol_types::{Panic, Revert, SolError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact {name} not found at {path}")]
    Missing { name: String, path: PathBuf },
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid artifact {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {name} has invalid bytecode: {reason}")]
    Bytecode { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("method {method} not found in {contract} interface")]
    MethodNotFound { contract: String, method: String },
    #[error("{target} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        target: String,
        expected: String,
        actual: usize,
    },
    #[error("{target}: argument {index} ({param}: {ty}) rejected {value}: {reason}")]
    InvalidArgument {
        target: String,
        index: usize,
        param: String,
        ty: String,
        value: String,
        reason: String,
    },
    #[error("failed to encode {target}: {source}")]
    Encode {
        target: String,
        #[source]
        source: alloy_dyn_abi::Error,
    },
    #[error("failed to decode {target}: {source}")]
    Decode {
        target: String,
        #[source]
        source: alloy_dyn_abi::Error,
    },
    #[error("log of {target} is missing the topic for {param}")]
    MissingTopic { target: String, param: String },
    #[error("{contract} has no deployment bytecode")]
    NoBytecode { contract: String },
}

/// Contracts the CLI knows how to talk to, named after their build artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractKind {
    VaspIndex,
    VaspContract,
    VaspContractFactory,
    VaspDirectory,
}

impl ContractKind {
    pub fn artifact_name(self) -> &'static str {
        match self {
            Self::VaspIndex => "VASPIndex",
            Self::VaspContract => "VASPContract",
            Self::VaspContractFactory => "VASPContractFactory",
            Self::VaspDirectory => "VASPDirectory",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    #[serde(default)]
    bytecode: String,
}

/// Compiled interface description plus deployment code of one contract.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self {
            name: name.into(),
            abi,
            bytecode,
        }
    }

    /// Parses a Truffle build document (`abi` array and `bytecode` hex).
    pub fn from_json(name: &str, contents: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(contents).map_err(|source| ArtifactError::Json {
            name: name.to_string(),
            source,
        })?;
        let digits = raw.bytecode.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let bytecode = hex::decode(digits).map_err(|err| ArtifactError::Bytecode {
            name: name.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::new(name, raw.abi, Bytes::from(bytecode)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, kind: ContractKind) -> Result<ContractArtifact, ArtifactError> {
        let name = kind.artifact_name();
        let path = self.dir.join(format!("{name}.json"));
        if !path.exists() {
            return Err(ArtifactError::Missing {
                name: name.to_string(),
                path,
            });
        }
        let contents =
            fs::read_to_string(&path).map_err(|source| ArtifactError::Io { path: path.clone(), source })?;
        let artifact = ContractArtifact::from_json(name, &contents)?;
        tracing::debug!(artifact = name, path = %path.display(), "artifact loaded");
        Ok(artifact)
    }
}

/// Picks the overload of `method` taking `arity` arguments.
pub fn resolve_function<'a>(
    artifact: &'a ContractArtifact,
    method: &str,
    arity: usize,
) -> Result<&'a Function, AbiError> {
    let overloads = artifact
        .abi
        .function(method)
        .filter(|overloads| !overloads.is_empty())
        .ok_or_else(|| AbiError::MethodNotFound {
            contract: artifact.name.clone(),
            method: method.to_string(),
        })?;

    overloads
        .iter()
        .find(|function| function.inputs.len() == arity)
        .ok_or_else(|| AbiError::ArgumentCount {
            target: format!("{}.{method}", artifact.name),
            expected: overloads
                .iter()
                .map(|function| function.inputs.len().to_string())
                .collect::<Vec<_>>()
                .join(" or "),
            actual: arity,
        })
}

/// Coerces textual arguments into ABI values following the parameter types.
pub fn coerce_arguments(
    target: &str,
    params: &[Param],
    args: &[Argument],
) -> Result<Vec<DynSolValue>, AbiError> {
    if params.len() != args.len() {
        return Err(AbiError::ArgumentCount {
            target: target.to_string(),
            expected: params.len().to_string(),
            actual: args.len(),
        });
    }

    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let invalid = |reason: String| AbiError::InvalidArgument {
                target: target.to_string(),
                index,
                param: param.name.clone(),
                ty: param.ty.clone(),
                value: arg.to_string(),
                reason,
            };
            let ty = param.resolve().map_err(|err| invalid(err.to_string()))?;
            match ty {
                DynSolType::String => Ok(DynSolValue::String(arg.as_str().to_string())),
                ty => ty.coerce_str(arg.as_str()).map_err(|err| invalid(err.to_string())),
            }
        })
        .collect()
}

pub fn encode_function_call(
    artifact: &ContractArtifact,
    method: &str,
    args: &[Argument],
) -> Result<Bytes, AbiError> {
    let function = resolve_function(artifact, method, args.len())?;
    let target = format!("{}.{}", artifact.name, function.signature());
    let values = coerce_arguments(&target, &function.inputs, args)?;
    let encoded = function
        .abi_encode_input(&values)
        .map_err(|source| AbiError::Encode { target, source })?;
    Ok(Bytes::from(encoded))
}

/// Deployment code followed by the encoded constructor arguments.
pub fn encode_deployment(artifact: &ContractArtifact, args: &[Argument]) -> Result<Bytes, AbiError> {
    if artifact.bytecode.is_empty() {
        return Err(AbiError::NoBytecode {
            contract: artifact.name.clone(),
        });
    }

    let target = format!("{} constructor", artifact.name);
    let mut data = artifact.bytecode.to_vec();
    match artifact.abi.constructor() {
        Some(constructor) => {
            let values = coerce_arguments(&target, &constructor.inputs, args)?;
            let encoded = constructor
                .abi_encode_input(&values)
                .map_err(|source| AbiError::Encode { target, source })?;
            data.extend_from_slice(&encoded);
        }
        None if !args.is_empty() => {
            return Err(AbiError::ArgumentCount {
                target,
                expected: "0".to_string(),
                actual: args.len(),
            });
        }
        None => {}
    }
    Ok(Bytes::from(data))
}

/// Decodes return data into `(name, value)` pairs. Unnamed outputs are keyed
/// by position.
pub fn decode_function_output(
    function: &Function,
    data: &[u8],
) -> Result<Vec<(String, DynSolValue)>, AbiError> {
    let target = function.signature();
    let types = function
        .outputs
        .iter()
        .map(|param| param.resolve())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| AbiError::Decode {
            target: target.clone(),
            source,
        })?;
    let names = function.outputs.iter().map(|param| param.name.as_str());
    decode_named(&target, names, types, data)
}

/// Log decoded against an event of the contract interface.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub fields: Vec<(String, DynSolValue)>,
}

impl DecodedEvent {
    pub fn field(&self, name: &str) -> Option<&DynSolValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }
}

/// Returns `None` when no event of `abi` matches the log's first topic.
/// Indexed reference types only carry their hash in the topic and are kept
/// as `bytes32`.
pub fn decode_event(abi: &JsonAbi, topics: &[B256], data: &[u8]) -> Option<Result<DecodedEvent, AbiError>> {
    let selector = topics.first()?;
    let event = abi
        .events()
        .find(|event| !event.anonymous && event.selector() == *selector)?;
    Some(decode_event_with(event, &topics[1..], data))
}

fn decode_event_with(event: &Event, topics: &[B256], data: &[u8]) -> Result<DecodedEvent, AbiError> {
    let target = event.signature();
    let decode_err = |source: alloy_dyn_abi::Error| AbiError::Decode {
        target: target.clone(),
        source,
    };

    let mut indexed = Vec::new();
    let mut body_names = Vec::new();
    let mut body_types = Vec::new();
    let mut topics = topics.iter();
    for (position, param) in event.inputs.iter().enumerate() {
        let ty = param.resolve().map_err(decode_err)?;
        if param.indexed {
            let Some(topic) = topics.next() else {
                return Err(AbiError::MissingTopic {
                    target: target.clone(),
                    param: field_name(&param.name, position),
                });
            };
            let value = match ty {
                DynSolType::Address
                | DynSolType::Bool
                | DynSolType::Int(_)
                | DynSolType::Uint(_)
                | DynSolType::FixedBytes(_) => ty.abi_decode(topic.as_slice()).map_err(decode_err)?,
                _ => DynSolValue::FixedBytes(*topic, 32),
            };
            indexed.push((position, field_name(&param.name, position), value));
        } else {
            body_names.push((position, field_name(&param.name, position)));
            body_types.push(ty);
        }
    }

    let body = match DynSolType::Tuple(body_types).abi_decode_sequence(data).map_err(decode_err)? {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };

    let mut fields: Vec<(usize, String, DynSolValue)> = indexed;
    fields.extend(
        body_names
            .into_iter()
            .zip(body)
            .map(|((position, name), value)| (position, name, value)),
    );
    fields.sort_by_key(|(position, _, _)| *position);

    Ok(DecodedEvent {
        name: event.name.clone(),
        fields: fields.into_iter().map(|(_, name, value)| (name, value)).collect(),
    })
}

fn decode_named<'a>(
    target: &str,
    names: impl Iterator<Item = &'a str>,
    types: Vec<DynSolType>,
    data: &[u8],
) -> Result<Vec<(String, DynSolValue)>, AbiError> {
    let values = match DynSolType::Tuple(types)
        .abi_decode_sequence(data)
        .map_err(|source| AbiError::Decode {
            target: target.to_string(),
            source,
        })? {
        DynSolValue::Tuple(values) => values,
        other => vec![other],
    };
    Ok(names
        .enumerate()
        .map(|(position, name)| field_name(name, position))
        .zip(values)
        .collect())
}

fn field_name(name: &str, position: usize) -> String {
    if name.is_empty() {
        position.to_string()
    } else {
        name.to_string()
    }
}

/// Extracts a human-readable reason from revert data: `Error(string)`
/// yields its message verbatim, `Panic(uint256)` its description, and custom
/// errors of the interface render as `Name(args)`.
pub fn decode_revert_data(abi: &JsonAbi, data: &[u8]) -> Option<String> {
    if data.len() < 4 {
        return None;
    }
    let selector = &data[..4];

    if selector == Revert::SELECTOR {
        return Revert::abi_decode(data).ok().map(|revert| revert.reason);
    }
    if selector == Panic::SELECTOR {
        return Panic::abi_decode(data).ok().map(|panic| panic.to_string());
    }

    for error in abi.errors() {
        if error.selector().as_slice() != selector {
            continue;
        }
        let Ok(types) = error
            .inputs
            .iter()
            .map(|param| param.resolve())
            .collect::<Result<Vec<_>, _>>()
        else {
            continue;
        };
        let names = error.inputs.iter().map(|param| param.name.as_str());
        if let Ok(fields) = decode_named(&error.name, names, types, &data[4..]) {
            let args = fields
                .iter()
                .map(|(_, value)| render_value(value))
                .collect::<Vec<_>>()
                .join(", ");
            return Some(format!("{}({args})", error.name));
        }
    }

    alloy_sol_types::decode_revert_reason(data)
}

const REVERT_NOISE_PREFIXES: [&str; 3] = ["Returned error: ", "execution reverted: ", "execution reverted"];

/// Ganache wraps reasons as `VM Exception while processing transaction: revert <reason>`.
const VM_EXCEPTION_PREFIX: &str = "VM Exception while processing transaction: ";

/// Whether a node error message describes a contract-level rejection rather
/// than a transport failure.
pub fn is_revert_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("revert") || lower.contains("vm exception")
}

/// Strips the prefixes nodes and client libraries wrap revert reasons in,
/// along with Truffle's ` -- Reason given: ...` suffix. A `revert` keyword is
/// only noise right after the VM exception prefix.
pub fn strip_revert_noise(message: &str) -> String {
    let mut reason = message.trim();
    if let Some(index) = reason.find(" -- Reason given: ") {
        reason = &reason[..index];
    }
    loop {
        if let Some(rest) = reason.strip_prefix(VM_EXCEPTION_PREFIX) {
            let rest = rest.trim_start();
            reason = match rest.strip_prefix("revert") {
                Some("") => "",
                Some(tail) if tail.starts_with(' ') => tail.trim_start(),
                _ => rest,
            };
            continue;
        }
        let stripped = REVERT_NOISE_PREFIXES
            .iter()
            .find_map(|prefix| reason.strip_prefix(prefix));
        match stripped {
            Some(rest) => reason = rest.trim_start(),
            None => break,
        }
    }
    reason.to_string()
}

pub fn render_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(address) => address_to_hex(*address),
        DynSolValue::Bool(flag) => flag.to_string(),
        DynSolValue::Int(int, _) => int.to_string(),
        DynSolValue::Uint(uint, _) => uint.to_string(),
        DynSolValue::FixedBytes(word, size) => format_hex(&word[..*size]),
        DynSolValue::Bytes(bytes) => format_hex(bytes),
        DynSolValue::String(text) => text.clone(),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) | DynSolValue::Tuple(values) => {
            let items = values.iter().map(render_value).collect::<Vec<_>>();
            format!("[{}]", items.join(", "))
        }
        #[allow(unreachable_patterns)]
        other => format!("{other:?}"),
    }
}

pub fn value_to_json(value: &DynSolValue) -> serde_json::Value {
    match value {
        DynSolValue::Bool(flag) => serde_json::Value::Bool(*flag),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) | DynSolValue::Tuple(values) => {
            serde_json::Value::Array(values.iter().map(value_to_json).collect())
        }
        other => serde_json::Value::String(render_value(other)),
    }
}

pub fn fields_to_json(fields: &[(String, DynSolValue)]) -> serde_json::Value {
    serde_json::Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), value_to_json(value)))
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const DIRECTORY_ABI: &str = r#"[
        {"type":"constructor","stateMutability":"nonpayable","inputs":[
            {"name":"owner","type":"address","internalType":"address"},
            {"name":"administrator","type":"address","internalType":"address"}]},
        {"type":"function","name":"insertCredentials","stateMutability":"nonpayable","inputs":[
            {"name":"vaspId","type":"bytes6","internalType":"bytes6"},
            {"name":"credentials","type":"string","internalType":"string"}],"outputs":[]},
        {"type":"function","name":"getCredentialsRef","stateMutability":"view","inputs":[
            {"name":"vaspId","type":"bytes6","internalType":"bytes6"}],"outputs":[
            {"name":"credentialsRef","type":"string","internalType":"string"},
            {"name":"credentialsHash","type":"bytes32","internalType":"bytes32"}]},
        {"type":"event","name":"CredentialsInserted","anonymous":false,"inputs":[
            {"name":"vaspId","type":"bytes6","indexed":true,"internalType":"bytes6"},
            {"name":"credentialsRef","type":"string","indexed":false,"internalType":"string"},
            {"name":"credentialsHash","type":"bytes32","indexed":false,"internalType":"bytes32"},
            {"name":"credentials","type":"string","indexed":false,"internalType":"string"}]},
        {"type":"error","name":"AlreadyRegistered","inputs":[
            {"name":"vaspId","type":"bytes6","internalType":"bytes6"}]}
    ]"#;

    pub const FACTORY_ABI: &str = r#"[
        {"type":"function","name":"create","stateMutability":"nonpayable","inputs":[
            {"name":"vaspCode","type":"bytes4","internalType":"bytes4"}],"outputs":[
            {"name":"","type":"address","internalType":"address"}]}
    ]"#;

    pub fn directory() -> ContractArtifact {
        let json = format!(r#"{{"contractName":"VASPDirectory","abi":{DIRECTORY_ABI},"bytecode":"0x6080604052"}}"#);
        ContractArtifact::from_json("VASPDirectory", &json).unwrap()
    }

    pub fn factory() -> ContractArtifact {
        let json = format!(r#"{{"contractName":"VASPContractFactory","abi":{FACTORY_ABI},"bytecode":"0x60016002"}}"#);
        ContractArtifact::from_json("VASPContractFactory", &json).unwrap()
    }
}
