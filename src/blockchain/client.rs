//! Block explorer client.
//!
//! This module provides the chain-side data source of the engine: a thin,
//! single-shot wrapper around the explorer's `module/action` HTTP API. Every
//! method answers `None` when the input is malformed, the explorer is
//! unreachable, or it has nothing to say. Retrying is the caller's business.

use async_trait::async_trait;
use anyhow::{Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};

use crate::blockchain::{
    models::{ContractInfo, ExplorerToken, TokenSearchHit, TransactionInfo},
    services::{balance, contract, token, transactions},
};

/// Identifying header sent with every outbound request.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Read-only lookups against the chain explorer.
#[async_trait]
pub trait ExplorerSource: Send + Sync {
    /// Native balance in wei.
    async fn get_balance(&self, address: &str) -> Option<String>;

    async fn get_token_info(&self, contract_address: &str) -> Option<ExplorerToken>;

    /// Source metadata and ABI, merged.
    async fn get_contract_info(&self, contract_address: &str) -> Option<ContractInfo>;

    async fn get_transaction_info(&self, tx_hash: &str) -> Option<TransactionInfo>;

    async fn search_token(&self, query: &str) -> Option<Vec<TokenSearchHit>>;
}

/// Builds a reqwest client that stamps `headers` on every request.
pub fn http_client(client_id: &str, mut headers: HeaderMap) -> Result<Client> {
    headers.insert(
        HeaderName::from_static(CLIENT_ID_HEADER),
        HeaderValue::from_str(client_id).context("CLIENT_ID is not a valid header value")?,
    );
    Client::builder()
        .default_headers(headers)
        .build()
        .context("Failed to build HTTP client")
}

/// reqwest-backed [`ExplorerSource`].
#[derive(Clone)]
pub struct ExplorerClient {
    http: Client,
    api_url: String,
}

impl ExplorerClient {
    /// Create a new explorer client for the given API base URL
    pub fn new(api_url: &str, client_id: &str) -> Result<Self> {
        Ok(Self {
            http: http_client(client_id, HeaderMap::new())?,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExplorerSource for ExplorerClient {
    async fn get_balance(&self, address: &str) -> Option<String> {
        balance::get_balance(&self.http, &self.api_url, address).await
    }

    async fn get_token_info(&self, contract_address: &str) -> Option<ExplorerToken> {
        token::get_token_info(&self.http, &self.api_url, contract_address).await
    }

    async fn get_contract_info(&self, contract_address: &str) -> Option<ContractInfo> {
        contract::get_contract_info(&self.http, &self.api_url, contract_address).await
    }

    async fn get_transaction_info(&self, tx_hash: &str) -> Option<TransactionInfo> {
        transactions::get_transaction_info(&self.http, &self.api_url, tx_hash).await
    }

    async fn search_token(&self, query: &str) -> Option<Vec<TokenSearchHit>> {
        token::search_token(&self.http, &self.api_url, query).await
    }
}
