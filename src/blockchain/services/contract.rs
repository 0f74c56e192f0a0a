// src/blockchain/services/contract.rs

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::explorer_call;
use crate::blockchain::models::{non_empty, Address, ContractInfo, SourceCodeRecord};

/// Marker some explorers put in the `ABI` field of unverified contracts.
const UNVERIFIED_ABI_MARKER: &str = "not verified";

/// Source metadata and ABI of `contract_address`.
///
/// Issues `getsourcecode` and `getabi` side by side; the merged record exists
/// only if at least one of them produced data.
pub async fn get_contract_info(
    client: &Client,
    api_url: &str,
    contract_address: &str,
) -> Option<ContractInfo> {
    let Some(contract) = Address::parse(contract_address) else {
        debug!(input = contract_address, "Skipping contract lookup for malformed address");
        return None;
    };

    let (source, abi) = tokio::join!(
        get_source_metadata(client, api_url, &contract),
        get_abi(client, api_url, &contract),
    );

    if source.is_none() && abi.is_none() {
        return None;
    }

    let mut info = source.unwrap_or_default();
    // getabi is authoritative; fall back to the ABI embedded in the source record.
    if abi.is_some() {
        info.abi = abi;
    }
    Some(info)
}

async fn get_source_metadata(
    client: &Client,
    api_url: &str,
    contract: &Address,
) -> Option<ContractInfo> {
    let result = explorer_call(
        client,
        api_url,
        &[
            ("module", "contract"),
            ("action", "getsourcecode"),
            ("address", contract.as_str()),
        ],
    )
    .await?;

    let record = match result {
        Value::Array(mut records) if !records.is_empty() => records.swap_remove(0),
        Value::Object(_) => result,
        _ => return None,
    };
    let record: SourceCodeRecord = match serde_json::from_value(record) {
        Ok(record) => record,
        Err(e) => {
            warn!(contract = %contract, error = %e, "Unexpected getsourcecode payload");
            return None;
        }
    };

    let info = ContractInfo {
        contract_name: non_empty(record.contract_name),
        compiler_version: non_empty(record.compiler_version),
        optimization_used: record.optimization_used.as_ref().and_then(parse_flag),
        license: non_empty(record.license),
        abi: non_empty(record.abi).filter(|abi| is_abi_json(abi)),
    };

    // Unverified contracts and plain accounts come back as an all-empty record.
    if info.has_source_metadata() || info.is_verified() {
        Some(info)
    } else {
        None
    }
}

async fn get_abi(client: &Client, api_url: &str, contract: &Address) -> Option<String> {
    let result = explorer_call(
        client,
        api_url,
        &[
            ("module", "contract"),
            ("action", "getabi"),
            ("address", contract.as_str()),
        ],
    )
    .await?;

    let abi = match result {
        Value::String(s) => s,
        Value::Array(_) => result.to_string(),
        _ => return None,
    };
    if is_abi_json(&abi) {
        Some(abi)
    } else {
        None
    }
}

fn is_abi_json(abi: &str) -> bool {
    if abi.to_lowercase().contains(UNVERIFIED_ABI_MARKER) {
        return false;
    }
    matches!(serde_json::from_str::<Value>(abi), Ok(Value::Array(_)))
}

/// `OptimizationUsed` shows up as `"1"`, `"0"`, `"true"` or a bool.
fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}
