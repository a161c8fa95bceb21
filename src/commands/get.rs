use crate::abi::{render_value, ContractKind};
use crate::cli::{GetCredentialsRefArgs, GetVaspCodeArgs, GetVaspContractArgs, GetVaspInfoArgs};
use crate::commands::Session;
use crate::engine::{call_contract, CallResult};
use crate::rpc::node_info;
use crate::types::{Argument, SHORT_CODE_DIGITS};
use anyhow::{anyhow, Result};
use serde::Serialize;

/// Public fields of a VASP contract, in the order they are printed.
const VASP_INFO_FIELDS: [&str; 5] = ["vaspCode", "channels", "transportKey", "messageKey", "signingKey"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VaspInfo {
    vasp_code: String,
    channels: String,
    transport_key: String,
    message_key: String,
    signing_key: String,
}

pub async fn vasp_code(args: GetVaspCodeArgs, session: &Session) -> Result<()> {
    let node = session.read_only_handle()?;
    let index = session.artifacts.load(ContractKind::VaspIndex)?;
    let result = call_contract(
        &node,
        &index,
        args.vasp_index.address(),
        "getVASPCodeByAddress",
        &[Argument::from(&args.vasp_contract)],
    )
    .await?;
    let code = short_code(&single_output(&result)?)?;
    print_value(session, "vaspCode", code)
}

pub async fn vasp_contract(args: GetVaspContractArgs, session: &Session) -> Result<()> {
    let node = session.read_only_handle()?;
    let index = session.artifacts.load(ContractKind::VaspIndex)?;
    let result = call_contract(
        &node,
        &index,
        args.vasp_index.address(),
        "getVASPAddressByCode",
        &[Argument::from(&args.vasp_code)],
    )
    .await?;
    print_value(session, "vaspContract", single_output(&result)?)
}

pub async fn vasp_info(args: GetVaspInfoArgs, session: &Session) -> Result<()> {
    let node = session.read_only_handle()?;
    let contract = session.artifacts.load(ContractKind::VaspContract)?;

    let mut values = Vec::with_capacity(VASP_INFO_FIELDS.len());
    for method in VASP_INFO_FIELDS {
        let result = call_contract(&node, &contract, args.vasp_contract.address(), method, &[]).await?;
        values.push(single_output(&result)?);
    }
    let [vasp_code, channels, transport_key, message_key, signing_key]: [String; 5] = values
        .try_into()
        .map_err(|_| anyhow!("unexpected number of VASP contract fields"))?;

    let info = VaspInfo {
        vasp_code: short_code(&vasp_code)?,
        channels,
        transport_key,
        message_key,
        signing_key,
    };

    if session.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("vaspCode: {}", info.vasp_code);
    println!("channels: {}", info.channels);
    println!("transportKey: {}", info.transport_key);
    println!("messageKey: {}", info.message_key);
    println!("signingKey: {}", info.signing_key);
    Ok(())
}

pub async fn credentials_ref(args: GetCredentialsRefArgs, session: &Session) -> Result<()> {
    let node = session.read_only_handle()?;
    let directory = session.artifacts.load(ContractKind::VaspDirectory)?;
    let vasp_id: Argument = (&args.vasp_id).into();
    let result = call_contract(
        &node,
        &directory,
        args.vasp_directory.address(),
        "getCredentialsRef",
        &[vasp_id],
    )
    .await?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    } else {
        println!("{}", result.render());
    }
    Ok(())
}

pub async fn node(session: &Session) -> Result<()> {
    let node = session.read_only_handle()?;
    let info = node_info(&node).await?;

    if session.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    let unknown = || "unknown".to_string();
    println!("endpoint: {}", info.endpoint);
    println!(
        "chainId: {}",
        info.chain_id.map(|id| id.to_string()).unwrap_or_else(unknown)
    );
    println!(
        "latestBlock: {}",
        info.latest_block.map(|block| block.to_string()).unwrap_or_else(unknown)
    );
    println!("clientVersion: {}", info.client_version.unwrap_or_else(unknown));
    Ok(())
}

fn single_output(result: &CallResult) -> Result<String> {
    result
        .single()
        .map(render_value)
        .ok_or_else(|| anyhow!("{} returned {} values, expected one", result.method, result.outputs.len()))
}

/// The short code as printed by the CLI: its hex digits without the prefix.
/// Wider words returned by a contract carry the code in their first bytes.
fn short_code(rendered: &str) -> Result<String> {
    let digits = rendered.strip_prefix("0x").unwrap_or(rendered);
    digits
        .get(..SHORT_CODE_DIGITS)
        .filter(|code| code.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{rendered} does not contain a VASP code"))
}

fn print_value(session: &Session, key: &str, value: String) -> Result<()> {
    if session.json {
        let mut object = serde_json::Map::new();
        object.insert(key.to_string(), serde_json::Value::String(value));
        println!("{}", serde_json::to_string_pretty(&object)?);
    } else {
        println!("{value}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_dyn_abi::DynSolValue;
    use alloy_primitives::{address, B256};

    #[test]
    fn short_code_drops_prefix_and_padding() {
        assert_eq!(short_code("0x7dface61").unwrap(), "7dface61");

        let mut word = [0u8; 32];
        word[..4].copy_from_slice(&[0x7d, 0xfa, 0xce, 0x61]);
        let rendered = render_value(&DynSolValue::FixedBytes(B256::from(word), 32));
        assert_eq!(short_code(&rendered).unwrap(), "7dface61");

        assert!(short_code("0x7dfa").is_err());
    }

    #[test]
    fn single_output_requires_exactly_one_value() {
        let vasp = address!("0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc");
        let one = CallResult {
            method: "getVASPAddressByCode".to_string(),
            outputs: vec![(String::new(), DynSolValue::Address(vasp))],
        };
        assert_eq!(
            single_output(&one).unwrap(),
            "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"
        );

        let two = CallResult {
            method: "getCredentialsRef".to_string(),
            outputs: vec![
                ("credentialsRef".to_string(), DynSolValue::String("ref".to_string())),
                ("credentialsHash".to_string(), DynSolValue::FixedBytes(B256::ZERO, 32)),
            ],
        };
        let err = single_output(&two).unwrap_err();
        assert_eq!(err.to_string(), "getCredentialsRef returned 2 values, expected one");
    }
}
