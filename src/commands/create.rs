use crate::abi::{render_value, ContractKind};
use crate::cli::CreateVaspContractArgs;
use crate::commands::{print_send_guide, Session};
use crate::engine::{send_transaction, Outcome, SendReceipt};
use crate::types::Argument;
use anyhow::{anyhow, Result};

const CREATED_EVENT: &str = "VASPContractCreated";

pub async fn vasp_contract(args: CreateVaspContractArgs, session: &Session) -> Result<()> {
    let handle = session.signing_handle()?;
    let index = session.artifacts.load(ContractKind::VaspIndex)?;

    let arguments: Vec<Argument> = vec![
        (&args.vasp_code).into(),
        (&args.owner).into(),
        (&args.channels).into(),
        (&args.transport_key).into(),
        (&args.message_key).into(),
        (&args.signing_key).into(),
    ];

    if !handle.is_offline() {
        tracing::info!(vasp_code = args.vasp_code.as_str(), "Creating VASP Contract...");
    }
    let outcome = send_transaction(
        &handle,
        &index,
        args.vasp_index.address(),
        "createVASPContract",
        arguments,
    )
    .await?;

    match outcome {
        Outcome::Broadcast(receipt) => {
            let address = created_contract(&receipt)?;
            if session.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "vaspContract": address,
                        "receipt": receipt.to_json(),
                    }))?
                );
            } else {
                println!("- done");
                println!("{address}");
            }
            Ok(())
        }
        Outcome::Encoded(payload) => print_send_guide(&payload, session.json),
    }
}

fn created_contract(receipt: &SendReceipt) -> Result<String> {
    receipt
        .event(CREATED_EVENT)
        .and_then(|event| event.field("vaspAddress"))
        .map(render_value)
        .ok_or_else(|| {
            anyhow!(
                "{CREATED_EVENT} event not found in transaction {:#x}",
                receipt.tx_hash
            )
        })
}
