use crate::commands::{self, Session, SessionFlags};
use crate::config::Config;
use crate::types::{
    parse_address, parse_channel_mask, parse_compressed_public_key, parse_file_backed_blob,
    parse_identifier, parse_private_key, parse_short_code, ChannelMask, CompressedPublicKey,
    CredentialBlob, EthAddress, Identifier, PrivateKey, ShortCode,
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "openvasp",
    version,
    about = "Deploy and query OpenVASP smart contracts"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// JSON-RPC endpoint of the Ethereum node.
    #[arg(long, global = true)]
    pub rpc_node: Option<String>,

    #[arg(long, global = true, value_parser = parse_private_key, conflicts_with = "private_key_env")]
    pub private_key: Option<PrivateKey>,

    /// Environment variable holding the private key.
    #[arg(long, global = true)]
    pub private_key_env: Option<String>,

    /// Print transaction data instead of sending it.
    #[arg(long, global = true)]
    pub generate_tx_data_only: bool,

    /// Print transaction data when no private key is found.
    #[arg(long, global = true)]
    pub offline_fallback: bool,

    /// Directory with compiled contract artifacts.
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let session = Session::new(
            config,
            SessionFlags {
                rpc_node: self.rpc_node.as_deref(),
                private_key: self.private_key.as_ref(),
                private_key_env: self.private_key_env.as_deref(),
                generate_tx_data_only: self.generate_tx_data_only,
                offline_fallback: self.offline_fallback,
                artifacts_dir: self.artifacts_dir.as_deref(),
                timeout_ms: self.timeout_ms,
                json: self.json,
            },
        );

        match self.command {
            Command::Create(cmd) => cmd.run(&session).await,
            Command::Deploy(cmd) => cmd.run(&session).await,
            Command::Get(cmd) => cmd.run(&session).await,
            Command::Insert(cmd) => cmd.run(&session).await,
            Command::Revoke(cmd) => cmd.run(&session).await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create contracts through the VASP index.
    Create(CreateCommand),
    /// Deploy the OpenVASP contract suite.
    Deploy(DeployCommand),
    /// Query deployed contracts and the node.
    Get(GetCommand),
    /// Insert records into the VASP directory.
    Insert(InsertCommand),
    /// Revoke records from the VASP directory.
    Revoke(RevokeCommand),
}

#[derive(Parser, Debug)]
pub struct CreateCommand {
    #[command(subcommand)]
    pub command: CreateSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CreateSubcommand {
    VaspContract(CreateVaspContractArgs),
}

impl CreateCommand {
    pub async fn run(self, session: &Session) -> Result<()> {
        match self.command {
            CreateSubcommand::VaspContract(args) => commands::create::vasp_contract(args, session).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct CreateVaspContractArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_index: EthAddress,

    #[arg(long, value_parser = parse_short_code)]
    pub vasp_code: ShortCode,

    #[arg(long, value_parser = parse_address)]
    pub owner: EthAddress,

    #[arg(long, value_parser = parse_channel_mask)]
    pub channels: ChannelMask,

    #[arg(long, value_parser = parse_compressed_public_key)]
    pub transport_key: CompressedPublicKey,

    #[arg(long, value_parser = parse_compressed_public_key)]
    pub message_key: CompressedPublicKey,

    #[arg(long, value_parser = parse_compressed_public_key)]
    pub signing_key: CompressedPublicKey,
}

#[derive(Parser, Debug)]
pub struct DeployCommand {
    #[command(subcommand)]
    pub command: DeploySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DeploySubcommand {
    VaspContractFactory,
    VaspDirectory(DeployVaspDirectoryArgs),
    VaspIndex(DeployVaspIndexArgs),
}

impl DeployCommand {
    pub async fn run(self, session: &Session) -> Result<()> {
        match self.command {
            DeploySubcommand::VaspContractFactory => commands::deploy::vasp_contract_factory(session).await,
            DeploySubcommand::VaspDirectory(args) => commands::deploy::vasp_directory(args, session).await,
            DeploySubcommand::VaspIndex(args) => commands::deploy::vasp_index(args, session).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeployVaspDirectoryArgs {
    #[arg(long, value_parser = parse_address)]
    pub owner: EthAddress,

    #[arg(long, value_parser = parse_address)]
    pub administrator: EthAddress,
}

#[derive(Args, Debug)]
pub struct DeployVaspIndexArgs {
    #[arg(long, value_parser = parse_address)]
    pub owner: EthAddress,

    /// Existing factory. Deployed first when omitted.
    #[arg(long, value_parser = parse_address)]
    pub vasp_contract_factory: Option<EthAddress>,
}

#[derive(Parser, Debug)]
pub struct GetCommand {
    #[command(subcommand)]
    pub command: GetSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum GetSubcommand {
    VaspCode(GetVaspCodeArgs),
    VaspContract(GetVaspContractArgs),
    VaspInfo(GetVaspInfoArgs),
    CredentialsRef(GetCredentialsRefArgs),
    /// Chain id, latest block and client version of the node.
    Node,
}

impl GetCommand {
    pub async fn run(self, session: &Session) -> Result<()> {
        match self.command {
            GetSubcommand::VaspCode(args) => commands::get::vasp_code(args, session).await,
            GetSubcommand::VaspContract(args) => commands::get::vasp_contract(args, session).await,
            GetSubcommand::VaspInfo(args) => commands::get::vasp_info(args, session).await,
            GetSubcommand::CredentialsRef(args) => commands::get::credentials_ref(args, session).await,
            GetSubcommand::Node => commands::get::node(session).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct GetVaspCodeArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_index: EthAddress,

    #[arg(long, value_parser = parse_address)]
    pub vasp_contract: EthAddress,
}

#[derive(Args, Debug)]
pub struct GetVaspContractArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_index: EthAddress,

    #[arg(long, value_parser = parse_short_code)]
    pub vasp_code: ShortCode,
}

#[derive(Args, Debug)]
pub struct GetVaspInfoArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_contract: EthAddress,
}

#[derive(Args, Debug)]
pub struct GetCredentialsRefArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_directory: EthAddress,

    #[arg(long, value_parser = parse_identifier)]
    pub vasp_id: Identifier,
}

#[derive(Parser, Debug)]
pub struct InsertCommand {
    #[command(subcommand)]
    pub command: InsertSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum InsertSubcommand {
    DirectoryCredentials(InsertDirectoryCredentialsArgs),
}

impl InsertCommand {
    pub async fn run(self, session: &Session) -> Result<()> {
        match self.command {
            InsertSubcommand::DirectoryCredentials(args) => commands::credentials::insert(args, session).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct InsertDirectoryCredentialsArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_directory: EthAddress,

    #[arg(long, value_parser = parse_identifier)]
    pub vasp_id: Identifier,

    /// File whose text is stored verbatim as the credentials.
    #[arg(long, value_parser = parse_file_backed_blob)]
    pub vasp_credentials: CredentialBlob,
}

#[derive(Parser, Debug)]
pub struct RevokeCommand {
    #[command(subcommand)]
    pub command: RevokeSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RevokeSubcommand {
    DirectoryCredentials(RevokeDirectoryCredentialsArgs),
}

impl RevokeCommand {
    pub async fn run(self, session: &Session) -> Result<()> {
        match self.command {
            RevokeSubcommand::DirectoryCredentials(args) => commands::credentials::revoke(args, session).await,
        }
    }
}

#[derive(Args, Debug)]
pub struct RevokeDirectoryCredentialsArgs {
    #[arg(long, value_parser = parse_address)]
    pub vasp_directory: EthAddress,

    #[arg(long, value_parser = parse_identifier)]
    pub vasp_id: Identifier,
}
