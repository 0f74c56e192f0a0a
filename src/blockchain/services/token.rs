// src/blockchain/services/token.rs

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::explorer_call;
use crate::blockchain::models::{Address, ExplorerToken, TokenSearchHit};

/// Longest free-text query forwarded to the search endpoint.
const MAX_SEARCH_LEN: usize = 64;

/// ERC-20 metadata of `contract_address`, straight from `token/getToken`.
pub async fn get_token_info(
    client: &Client,
    api_url: &str,
    contract_address: &str,
) -> Option<ExplorerToken> {
    let Some(contract) = Address::parse(contract_address) else {
        debug!(input = contract_address, "Skipping token lookup for malformed address");
        return None;
    };

    let result = explorer_call(
        client,
        api_url,
        &[
            ("module", "token"),
            ("action", "getToken"),
            ("contractaddress", contract.as_str()),
        ],
    )
    .await?;

    match serde_json::from_value::<ExplorerToken>(result) {
        Ok(token) if token.symbol.is_some() || token.name.is_some() => Some(token),
        Ok(_) => None,
        Err(e) => {
            warn!(contract = %contract, error = %e, "Unexpected getToken payload");
            None
        }
    }
}

/// Token hits for a free-text query from the explorer search endpoint.
///
/// The endpoint is not enveloped; it answers `{ "items": [...] }` where only
/// entries of `type == "token"` are kept.
pub async fn search_token(client: &Client, api_url: &str, query: &str) -> Option<Vec<TokenSearchHit>> {
    let query = query.trim().trim_start_matches('$');
    if query.is_empty() || query.len() > MAX_SEARCH_LEN {
        debug!("Skipping token search for empty or oversized query");
        return None;
    }

    let url = format!("{}/v2/search", api_url.trim_end_matches('/'));
    let res = match client.get(&url).query(&[("q", query)]).send().await {
        Ok(res) => res,
        Err(e) => {
            warn!(error = %e, "Token search request failed");
            return None;
        }
    };
    let status = res.status();
    if !status.is_success() {
        warn!(status = %status, "Token search returned non-success status");
        return None;
    }
    let body: Value = res.json().await.ok()?;

    let hits = body
        .get("items")
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("token"))
                .filter_map(|item| serde_json::from_value::<TokenSearchHit>(item.clone()).ok())
                .collect::<Vec<_>>()
        })?;
    Some(hits)
}
