// src/blockchain/signer.rs

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use anyhow::Context;
use ethers_core::types::{Address as H160, Bytes, TransactionRequest, U256};
use ethers_signers::{LocalWallet, Signer};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blockchain::{models::Address, nonce_manager::NonceManager};

/// What the wallet is asked to sign: the AI's unsigned descriptor plus the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignRequest {
    pub to: Address,
    /// Wei, either `0x`-hex or decimal.
    pub value: String,
    /// `0x`-prefixed calldata.
    pub data: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub success: bool,
    pub block_number: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("request rejected in wallet: {0}")]
    Rejected(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// The node could not be reached or answered garbage.
    #[error("network error: {0}")]
    Network(String),
    #[error("{0}")]
    Failed(String),
}

/// The external wallet: signs and broadcasts, then reports the receipt.
///
/// Either call may take a human-timescale amount of time; callers race them
/// against a cancellation token.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Signs and broadcasts, returning the transaction hash.
    async fn sign_and_send(&self, request: &SignRequest) -> Result<String, SignerError>;

    async fn wait_for_receipt(&self, tx_hash: &str, chain_id: u64) -> Result<TxReceipt, SignerError>;
}

/// Headless signer backed by a private key from the environment.
#[derive(Clone)]
pub struct LocalWalletSigner {
    http: Client,
    rpc_url: String,
    wallet: LocalWallet,
    nonce_manager: NonceManager,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl LocalWalletSigner {
    pub fn new(
        private_key: &SecretString,
        rpc_url: &str,
        poll_attempts: u32,
        poll_interval_ms: u64,
    ) -> anyhow::Result<Self> {
        let wallet = LocalWallet::from_str(private_key.expose_secret().trim())
            .context("SIGNER_PRIVATE_KEY is not a valid secp256k1 key")?;
        Ok(Self {
            http: Client::new(),
            rpc_url: rpc_url.to_string(),
            wallet,
            nonce_manager: NonceManager::new(),
            poll_attempts: poll_attempts.max(1),
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }

    pub fn address(&self) -> H160 {
        self.wallet.address()
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, SignerError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let response: Value = self
            .http
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SignerError::Network(format!("calling {}: {}", method, e)))?
            .json()
            .await
            .map_err(|e| SignerError::Network(format!("decoding {} response: {}", method, e)))?;

        if let Some(err) = response.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(SignerError::Failed(message));
        }
        Ok(response["result"].clone())
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<U256, SignerError> {
        let result = self.rpc(method, params).await?;
        let hex_value = result
            .as_str()
            .ok_or_else(|| SignerError::Failed(format!("{} returned no result", method)))?;
        U256::from_str_radix(hex_value.trim_start_matches("0x"), 16)
            .map_err(|e| SignerError::Failed(format!("{} returned bad quantity: {}", method, e)))
    }

    /// Prices, signs and submits `tx`, returning the hash the node reports.
    async fn broadcast(&self, mut tx: TransactionRequest, chain_id: u64) -> Result<String, SignerError> {
        let call_obj = serde_json::to_value(&tx)
            .map_err(|e| SignerError::Failed(format!("failed to encode transaction: {}", e)))?;
        let gas = self
            .quantity("eth_estimateGas", json!([call_obj]))
            .await
            .map_err(|e| match e {
                SignerError::Failed(message) => SignerError::Failed(format!("gas estimation failed: {}", message)),
                other => other,
            })?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        tx = tx.gas(gas).gas_price(gas_price);

        let signature = self
            .wallet
            .clone()
            .with_chain_id(chain_id)
            .sign_transaction(&tx.clone().into())
            .await
            .map_err(|e| SignerError::Failed(format!("signing failed: {}", e)))?;
        let raw_tx = tx.rlp_signed(&signature);

        let result = self
            .rpc(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw_tx))]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SignerError::Failed("node returned no transaction hash".into()))
    }
}

#[async_trait]
impl TransactionSigner for LocalWalletSigner {
    async fn sign_and_send(&self, request: &SignRequest) -> Result<String, SignerError> {
        let from = self.wallet.address();
        let to = H160::from_str(request.to.as_str())
            .map_err(|e| SignerError::Failed(format!("invalid recipient address: {}", e)))?;
        let value = parse_wei(&request.value)?;
        let data = parse_calldata(&request.data)?;

        let chain_id = request.chain_id;
        let reservation = self
            .nonce_manager
            .reserve(
                chain_id,
                from,
                self.quantity("eth_getTransactionCount", json!([format!("{:?}", from), "pending"])),
            )
            .await?;

        let tx = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .data(data)
            .nonce(reservation.nonce())
            .chain_id(chain_id);

        // A cancelled future drops the reservation, which releases it too.
        match self.broadcast(tx, chain_id).await {
            Ok(tx_hash) => {
                reservation.commit();
                info!(tx_hash = %tx_hash, from = ?from, "Broadcast transaction");
                Ok(tx_hash)
            }
            Err(e) => {
                warn!(from = ?from, error = %e, "Transaction not broadcast, releasing nonce");
                reservation.release().await;
                Err(e)
            }
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str, _chain_id: u64) -> Result<TxReceipt, SignerError> {
        for attempt in 1..=self.poll_attempts {
            let receipt = self.rpc("eth_getTransactionReceipt", json!([tx_hash])).await?;
            if !receipt.is_null() {
                let success = receipt
                    .get("status")
                    .and_then(|s| s.as_str())
                    .map(|s| s == "0x1")
                    .unwrap_or(false);
                return Ok(TxReceipt {
                    transaction_hash: tx_hash.to_string(),
                    success,
                    block_number: receipt
                        .get("blockNumber")
                        .and_then(|b| b.as_str())
                        .and_then(|b| u64::from_str_radix(b.trim_start_matches("0x"), 16).ok())
                        .map(|b| b.to_string()),
                });
            }
            debug!(tx_hash, attempt, "Receipt not available yet");
            tokio::time::sleep(self.poll_interval).await;
        }
        warn!(tx_hash, "Gave up waiting for receipt");
        Err(SignerError::Timeout(format!("confirmation of {}", tx_hash)))
    }
}

fn parse_wei(value: &str) -> Result<U256, SignerError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(U256::zero());
    }
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex_digits) if hex_digits.is_empty() => Ok(U256::zero()),
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| SignerError::Failed(format!("invalid transaction value '{}': {}", value, e)))
}

fn parse_calldata(data: &str) -> Result<Bytes, SignerError> {
    let digits = data.trim().trim_start_matches("0x");
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| SignerError::Failed(format!("invalid calldata: {}", e)))
}
