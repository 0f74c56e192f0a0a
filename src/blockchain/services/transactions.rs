// src/blockchain/services/transactions.rs

use reqwest::Client;
use tracing::{debug, warn};

use super::explorer_call;
use crate::blockchain::models::{non_empty, value_to_string, ExplorerTransaction, TransactionInfo, TxHash};

/// Block, parties, value and gas of `tx_hash` from `transaction/gettxinfo`.
pub async fn get_transaction_info(client: &Client, api_url: &str, tx_hash: &str) -> Option<TransactionInfo> {
    let Some(hash) = TxHash::parse(tx_hash) else {
        debug!(input = tx_hash, "Skipping transaction lookup for malformed hash");
        return None;
    };

    let result = explorer_call(
        client,
        api_url,
        &[
            ("module", "transaction"),
            ("action", "gettxinfo"),
            ("txhash", hash.as_str()),
        ],
    )
    .await?;

    let raw: ExplorerTransaction = match serde_json::from_value(result) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(tx_hash = %hash, error = %e, "Unexpected gettxinfo payload");
            return None;
        }
    };

    Some(TransactionInfo {
        hash,
        block_number: raw.block_number.as_ref().and_then(value_to_string),
        from: non_empty(raw.from),
        to: non_empty(raw.to),
        value: raw.value.as_ref().and_then(value_to_string),
        gas_used: raw.gas_used.as_ref().and_then(value_to_string),
        success: raw.success,
    })
}
