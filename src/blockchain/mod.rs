// src/blockchain/mod.rs

// Re-export the explorer client
pub mod client;
pub use client::{ExplorerClient, ExplorerSource};

// Re-export other modules
pub mod models;
pub mod nonce_manager;
pub mod services;
pub mod signer;

pub use models::{Address, TxHash};
pub use signer::{LocalWalletSigner, SignRequest, SignerError, TransactionSigner, TxReceipt};
