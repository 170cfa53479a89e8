pub mod abi;
pub mod account;
pub mod address;
pub mod chain_parameters;
pub mod codec;
pub mod config;
pub mod contract;
pub mod decoration;
pub mod error;
pub mod fee;
pub mod gateway;
pub mod query;
pub mod protocol;
pub mod repository;
pub mod sender;
pub mod signer;
pub mod sync_timer;
pub mod syncer;
pub mod token;
pub mod transaction_manager;
pub mod wallet;

pub use address::{Address, Network};
pub use config::Config;
pub use wallet::{StatusInfo, TronWallet};
