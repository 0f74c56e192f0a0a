use ethers_core::types::U256;
use reqwest::Client;
use tracing::{debug, error};

use super::explorer_call;
use crate::blockchain::models::{value_to_string, Address};

/// Native CHZ balance of `address` in wei, as a decimal string.
pub async fn get_balance(client: &Client, api_url: &str, address: &str) -> Option<String> {
    let Some(address) = Address::parse(address) else {
        debug!(input = address, "Skipping balance lookup for malformed address");
        return None;
    };

    let result = explorer_call(
        client,
        api_url,
        &[
            ("module", "account"),
            ("action", "balance"),
            ("address", address.as_str()),
        ],
    )
    .await?;

    let amount = value_to_string(&result)?;
    if U256::from_dec_str(&amount).is_err() {
        error!(
            "Failed to parse balance '{}' for {} as a decimal integer",
            amount, address
        );
        return None;
    }
    Some(amount)
}
