// src/blockchain/services/mod.rs
//
// Explorer `module/action` calls. Every function validates its input before
// touching the network and answers `None` for any failure.

pub mod balance;
pub mod contract;
pub mod token;
pub mod transactions;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::blockchain::models::ExplorerEnvelope;

/// One GET against the explorer API. Returns the envelope's `result` only when
/// the transport, the HTTP status and the envelope status all succeed.
pub(crate) async fn explorer_call(
    client: &Client,
    api_url: &str,
    params: &[(&str, &str)],
) -> Option<Value> {
    let action = params
        .iter()
        .find(|(key, _)| *key == "action")
        .map(|(_, value)| *value)
        .unwrap_or("unknown");

    let res = match client.get(api_url).query(params).send().await {
        Ok(res) => res,
        Err(e) => {
            warn!(action, error = %e, "Explorer request failed");
            return None;
        }
    };

    let status = res.status();
    if !status.is_success() {
        warn!(action, status = %status, "Explorer returned non-success status");
        return None;
    }

    let envelope: ExplorerEnvelope = match res.json().await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(action, error = %e, "Explorer response was not a JSON envelope");
            return None;
        }
    };

    if !envelope.is_ok() {
        debug!(action, message = ?envelope.message, "Explorer reported no data");
        return None;
    }

    Some(envelope.result)
}
