pub mod abi;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod provider;
pub mod rpc;
pub mod signer;
pub mod types;
