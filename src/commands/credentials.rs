use crate::abi::ContractKind;
use crate::cli::{InsertDirectoryCredentialsArgs, RevokeDirectoryCredentialsArgs};
use crate::commands::{print_send_guide, Session};
use crate::engine::{send_transaction, Outcome, SendReceipt};
use crate::types::Argument;
use alloy_primitives::Address;
use anyhow::Result;

pub async fn insert(args: InsertDirectoryCredentialsArgs, session: &Session) -> Result<()> {
    tracing::debug!(
        path = %args.vasp_credentials.path().display(),
        bytes = args.vasp_credentials.contents().len(),
        "credentials file loaded"
    );
    let arguments = vec![
        Argument::from(&args.vasp_id),
        Argument::from(&args.vasp_credentials),
    ];
    write(
        session,
        args.vasp_directory.address(),
        "insertCredentials",
        arguments,
        "VASP Credentials inserted",
    )
    .await
}

pub async fn revoke(args: RevokeDirectoryCredentialsArgs, session: &Session) -> Result<()> {
    write(
        session,
        args.vasp_directory.address(),
        "revokeCredentials",
        vec![Argument::from(&args.vasp_id)],
        "VASP Credentials revoked",
    )
    .await
}

async fn write(
    session: &Session,
    directory_address: Address,
    method: &str,
    arguments: Vec<Argument>,
    done: &str,
) -> Result<()> {
    let handle = session.signing_handle()?;
    let directory = session.artifacts.load(ContractKind::VaspDirectory)?;

    match send_transaction(&handle, &directory, directory_address, method, arguments).await? {
        Outcome::Broadcast(receipt) => report(session, &receipt, done),
        Outcome::Encoded(payload) => print_send_guide(&payload, session.json),
    }
}

fn report(session: &Session, receipt: &SendReceipt, done: &str) -> Result<()> {
    if session.json {
        println!("{}", serde_json::to_string_pretty(&receipt.to_json())?);
    } else {
        println!("{done}");
        println!("transaction: {:#x}", receipt.tx_hash);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::fixtures::DIRECTORY_ABI;
    use crate::commands::SessionFlags;
    use crate::config::Config;
    use crate::types::{parse_address, parse_file_backed_blob, parse_identifier};
    use std::fs;
    use std::path::Path;

    const DIRECTORY: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn offline_session(artifacts: &Path) -> Session {
        let directory = format!(r#"{{"contractName":"VASPDirectory","abi":{DIRECTORY_ABI},"bytecode":"0x6080604052"}}"#);
        fs::write(artifacts.join("VASPDirectory.json"), directory).unwrap();
        Session::new(
            Config::default(),
            SessionFlags {
                rpc_node: None,
                private_key: None,
                private_key_env: None,
                generate_tx_data_only: true,
                offline_fallback: false,
                artifacts_dir: Some(artifacts),
                timeout_ms: None,
                json: true,
            },
        )
    }

    #[tokio::test]
    async fn offline_insert_encodes_the_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        fs::write(&credentials, "{\"name\": \"Test VASP\"}").unwrap();

        let args = InsertDirectoryCredentialsArgs {
            vasp_directory: parse_address(DIRECTORY).unwrap(),
            vasp_id: parse_identifier("0123456789ab").unwrap(),
            vasp_credentials: parse_file_backed_blob(credentials.to_str().unwrap()).unwrap(),
        };
        insert(args, &offline_session(dir.path())).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_needs_the_method_in_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let args = RevokeDirectoryCredentialsArgs {
            vasp_directory: parse_address(DIRECTORY).unwrap(),
            vasp_id: parse_identifier("0123456789ab").unwrap(),
        };
        let err = revoke(args, &offline_session(dir.path())).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "method revokeCredentials not found in VASPDirectory interface"
        );
    }
}
