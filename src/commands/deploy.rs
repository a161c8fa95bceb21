use crate::abi::{ArtifactStore, ContractArtifact, ContractKind};
use crate::cli::{DeployVaspDirectoryArgs, DeployVaspIndexArgs};
use crate::commands::{print_send_guide, require_broadcast, Session};
use crate::engine::{deploy_contract, Outcome};
use crate::provider::ExecutionHandle;
use crate::types::{address_to_hex, Argument, EthAddress};
use alloy_primitives::Address;
use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Deployed {
    contract: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    vasp_contract_factory: Option<String>,
}

pub async fn vasp_contract_factory(session: &Session) -> Result<()> {
    let handle = session.signing_handle()?;
    let factory = session.artifacts.load(ContractKind::VaspContractFactory)?;
    let outcome = deploy(&handle, &factory, Vec::new(), "Deploying VASP Contract Factory...").await?;
    report(session, factory.name(), outcome, None)
}

pub async fn vasp_directory(args: DeployVaspDirectoryArgs, session: &Session) -> Result<()> {
    let handle = session.signing_handle()?;
    let directory = session.artifacts.load(ContractKind::VaspDirectory)?;
    let outcome = deploy(
        &handle,
        &directory,
        vec![(&args.owner).into(), (&args.administrator).into()],
        "Deploying VASP Directory...",
    )
    .await?;
    report(session, directory.name(), outcome, None)
}

pub async fn vasp_index(args: DeployVaspIndexArgs, session: &Session) -> Result<()> {
    let handle = session.signing_handle()?;
    let deployment = deploy_index(
        &handle,
        &session.artifacts,
        &args.owner,
        args.vasp_contract_factory.map(|factory| factory.address()),
    )
    .await?;
    report(
        session,
        ContractKind::VaspIndex.artifact_name(),
        deployment.index,
        Some(deployment.factory),
    )
}

struct IndexDeployment {
    factory: Address,
    index: Outcome<Address>,
}

/// Deploys the index, deploying a factory first when none is given.
async fn deploy_index(
    handle: &ExecutionHandle,
    artifacts: &ArtifactStore,
    owner: &EthAddress,
    factory: Option<Address>,
) -> Result<IndexDeployment> {
    let index = artifacts.load(ContractKind::VaspIndex)?;

    let factory = match (factory, handle) {
        (Some(factory), _) => factory,
        (None, ExecutionHandle::Offline) => bail!(
            "--vasp-contract-factory is required when transactions are not broadcast, \
             the index constructor needs the factory address"
        ),
        (None, ExecutionHandle::Signing(_)) => {
            let artifact = artifacts.load(ContractKind::VaspContractFactory)?;
            let outcome = deploy(
                handle,
                &artifact,
                Vec::new(),
                "Deploying VASP Contract Factory (prerequisite)...",
            )
            .await?;
            let address = require_broadcast(outcome, "VASP Contract Factory deployment")?;
            tracing::info!(address = %address_to_hex(address), "VASP Contract Factory deployed");
            address
        }
    };

    let index = deploy(handle, &index, index_arguments(owner, factory), "Deploying VASP Index...").await?;
    Ok(IndexDeployment { factory, index })
}

fn index_arguments(owner: &EthAddress, factory: Address) -> Vec<Argument> {
    vec![owner.into(), Argument::new(format!("{factory:#x}"))]
}

async fn deploy(
    handle: &ExecutionHandle,
    artifact: &ContractArtifact,
    args: Vec<Argument>,
    progress: &str,
) -> Result<Outcome<Address>> {
    if !handle.is_offline() {
        tracing::info!(contract = artifact.name(), "{progress}");
    }
    Ok(deploy_contract(handle, artifact, args).await?)
}

fn report(
    session: &Session,
    contract: &str,
    outcome: Outcome<Address>,
    factory: Option<Address>,
) -> Result<()> {
    let address = match outcome {
        Outcome::Broadcast(address) => address,
        Outcome::Encoded(payload) => return print_send_guide(&payload, session.json),
    };

    if session.json {
        let deployed = Deployed {
            contract: contract.to_string(),
            address: address_to_hex(address),
            vasp_contract_factory: factory.map(address_to_hex),
        };
        println!("{}", serde_json::to_string_pretty(&deployed)?);
    } else {
        println!("- done");
        println!("{}", address_to_hex(address));
    }
    Ok(())
}
