// src/engine/aggregator.rs

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::{
    classifier::ClassifiedInput,
    formatter::format_token_amount,
    registry::TokenRegistry,
};
use crate::blockchain::{
    client::ExplorerSource,
    models::{Address, ContractInfo, ContractRef, ExplorerToken, TokenDescriptor, TokenKind, TransactionInfo},
};

/// Everything known about an address. Only the address itself is guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressReport {
    pub address: Address,
    /// Native balance in wei.
    pub balance_wei: Option<String>,
    pub token: Option<TokenDescriptor>,
    pub contract: Option<ContractInfo>,
}

/// The structured answer handed from the aggregator to the formatter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryResult {
    Address(AddressReport),
    Transaction(TransactionInfo),
    Tokens {
        tokens: Vec<TokenDescriptor>,
        /// Produced by a "compare A and B" query.
        comparison: bool,
    },
}

/// Fans a classified input out to the explorer and the registry.
#[derive(Clone)]
pub struct QueryAggregator {
    explorer: Arc<dyn ExplorerSource>,
    registry: &'static TokenRegistry,
    /// Tries per explorer sub-lookup; adapters themselves never retry.
    attempts: u32,
}

impl QueryAggregator {
    pub fn new(explorer: Arc<dyn ExplorerSource>, registry: &'static TokenRegistry, attempts: u32) -> Self {
        Self {
            explorer,
            registry,
            attempts: attempts.max(1),
        }
    }

    /// `None` for free text, or when a token query matches neither registry tier.
    pub async fn resolve(&self, input: &ClassifiedInput) -> Option<QueryResult> {
        debug!(kind = input.kind(), "Resolving query");
        match input {
            ClassifiedInput::Address(address) => Some(QueryResult::Address(self.resolve_address(address).await)),
            ClassifiedInput::TransactionHash(hash) => {
                let info = self
                    .with_attempts("transaction", || self.explorer.get_transaction_info(hash.as_str()))
                    .await
                    .unwrap_or_else(|| TransactionInfo::bare(hash.clone()));
                Some(QueryResult::Transaction(info))
            }
            ClassifiedInput::TokenQuery(reference) => {
                let token = self.lookup_token(reference)?;
                Some(QueryResult::Tokens {
                    tokens: vec![token],
                    comparison: false,
                })
            }
            ClassifiedInput::ComparisonQuery(first, second) => {
                // Input order, not registry order; unknown references drop out.
                let tokens = [first, second]
                    .into_iter()
                    .filter_map(|reference| self.lookup_token(reference))
                    .collect();
                Some(QueryResult::Tokens {
                    tokens,
                    comparison: true,
                })
            }
            ClassifiedInput::FreeText(_) => None,
        }
    }

    async fn resolve_address(&self, address: &Address) -> AddressReport {
        let addr = address.as_str();
        // Independent lookups: a miss in one never cancels the others.
        let (contract, token, balance_wei) = tokio::join!(
            self.with_attempts("contract", || self.explorer.get_contract_info(addr)),
            self.with_attempts("token", || self.explorer.get_token_info(addr)),
            self.with_attempts("balance", || self.explorer.get_balance(addr)),
        );

        info!(
            address = %address,
            has_balance = balance_wei.is_some(),
            has_token = token.is_some(),
            has_contract = contract.is_some(),
            "Resolved address"
        );

        AddressReport {
            address: address.clone(),
            balance_wei,
            token: token.map(|raw| descriptor_from_explorer(raw, address, self.registry)),
            contract,
        }
    }

    fn lookup_token(&self, reference: &str) -> Option<TokenDescriptor> {
        self.registry
            .lookup_verified(reference)
            .or_else(|| self.registry.lookup_extended(reference))
            .cloned()
    }

    async fn with_attempts<T, F, Fut>(&self, lookup: &'static str, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.attempts {
            if let Some(value) = call().await {
                return Some(value);
            }
            if attempt < self.attempts {
                debug!(lookup, attempt, "Lookup returned nothing, retrying");
            }
        }
        None
    }
}

/// Turns raw explorer token metadata into a descriptor, tagging contracts the
/// registry knows as fan tokens.
pub fn descriptor_from_explorer(raw: ExplorerToken, address: &Address, registry: &TokenRegistry) -> TokenDescriptor {
    let known = registry.by_contract(address);
    let decimals = raw
        .decimals
        .as_deref()
        .and_then(|d| d.trim().parse::<u8>().ok())
        .filter(|d| *d <= 18);
    let symbol = raw
        .symbol
        .clone()
        .or_else(|| known.map(|t| t.symbol.clone()))
        .unwrap_or_default();
    let total_supply = raw
        .total_supply
        .as_deref()
        .and_then(|supply| format_token_amount(supply, decimals))
        .map(|amount| if symbol.is_empty() { amount } else { format!("{} {}", amount, symbol) })
        .or_else(|| known.map(|t| t.total_supply.clone()))
        .unwrap_or_else(|| "Unknown".to_string());

    TokenDescriptor {
        name: raw
            .name
            .or_else(|| known.map(|t| t.name.clone()))
            .unwrap_or_else(|| symbol.clone()),
        symbol,
        contract: ContractRef::Address(address.clone()),
        decimals: decimals.or_else(|| known.and_then(|t| t.decimals)),
        kind: known.map(|t| t.kind).unwrap_or(TokenKind::CommunityToken),
        total_supply,
        status: None,
        guidance: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::models::{TokenSearchHit, TxHash};
    use crate::engine::{classifier::classify, registry::TOKEN_REGISTRY};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ADDRESS: &str = "0xc2661815C69c2B3924D3dd0c2C1358A1E38A3105";

    #[derive(Default)]
    struct FakeExplorer {
        balance: Option<String>,
        token: Option<ExplorerToken>,
        contract: Option<ContractInfo>,
        tx: Option<TransactionInfo>,
        balance_calls: AtomicUsize,
        search_calls: AtomicUsize,
    }

    #[async_trait]
    impl ExplorerSource for FakeExplorer {
        async fn get_balance(&self, _address: &str) -> Option<String> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            self.balance.clone()
        }
        async fn get_token_info(&self, _contract_address: &str) -> Option<ExplorerToken> {
            self.token.clone()
        }
        async fn get_contract_info(&self, _contract_address: &str) -> Option<ContractInfo> {
            self.contract.clone()
        }
        async fn get_transaction_info(&self, _tx_hash: &str) -> Option<TransactionInfo> {
            self.tx.clone()
        }
        async fn search_token(&self, _query: &str) -> Option<Vec<TokenSearchHit>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            None
        }
    }

    fn aggregator(explorer: Arc<FakeExplorer>, attempts: u32) -> QueryAggregator {
        QueryAggregator::new(explorer, &TOKEN_REGISTRY, attempts)
    }

    #[tokio::test]
    async fn test_address_with_partial_data() {
        let explorer = Arc::new(FakeExplorer {
            balance: Some("1000000000000000000".into()),
            ..Default::default()
        });
        let input = classify(ADDRESS, &TOKEN_REGISTRY);
        let result = aggregator(explorer, 1).resolve(&input).await.unwrap();

        match result {
            QueryResult::Address(report) => {
                assert_eq!(report.address.as_str(), ADDRESS);
                assert_eq!(report.balance_wei.as_deref(), Some("1000000000000000000"));
                assert!(report.token.is_none());
                assert!(report.contract.is_none());
            }
            other => panic!("expected address result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_address_with_nothing_known_still_resolves() {
        let explorer = Arc::new(FakeExplorer::default());
        let input = classify(ADDRESS, &TOKEN_REGISTRY);
        let result = aggregator(explorer, 1).resolve(&input).await;
        assert!(matches!(result, Some(QueryResult::Address(_))));
    }

    #[tokio::test]
    async fn test_retries_each_lookup_up_to_attempts() {
        let explorer = Arc::new(FakeExplorer::default());
        let input = classify(ADDRESS, &TOKEN_REGISTRY);
        aggregator(explorer.clone(), 3).resolve(&input).await;
        assert_eq!(explorer.balance_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_known_contract_is_tagged_as_fan_token() {
        let explorer = Arc::new(FakeExplorer {
            token: Some(ExplorerToken {
                name: Some("Paris Saint-Germain".into()),
                symbol: Some("PSG".into()),
                decimals: Some("0".into()),
                total_supply: Some("20000000".into()),
                token_type: Some("ERC-20".into()),
                contract_address: Some(ADDRESS.into()),
            }),
            ..Default::default()
        });
        let input = classify(ADDRESS, &TOKEN_REGISTRY);
        let Some(QueryResult::Address(report)) = aggregator(explorer, 1).resolve(&input).await else {
            panic!("expected address result");
        };
        let token = report.token.unwrap();
        assert_eq!(token.kind, TokenKind::FanToken);
        assert_eq!(token.total_supply, "20,000,000 PSG");
        assert_eq!(token.decimals, Some(0));
    }

    #[tokio::test]
    async fn test_transaction_without_data_keeps_hash() {
        let hash = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
        let explorer = Arc::new(FakeExplorer::default());
        let input = classify(hash, &TOKEN_REGISTRY);
        let result = aggregator(explorer, 1).resolve(&input).await;
        assert_eq!(
            result,
            Some(QueryResult::Transaction(TransactionInfo::bare(TxHash::parse(hash).unwrap())))
        );
    }

    #[tokio::test]
    async fn test_comparison_follows_input_order() {
        let explorer = Arc::new(FakeExplorer::default());
        let input = classify("compare PSG and BAR", &TOKEN_REGISTRY);
        let Some(QueryResult::Tokens { tokens, comparison }) = aggregator(explorer, 1).resolve(&input).await else {
            panic!("expected token list");
        };
        assert!(comparison);
        let symbols: Vec<_> = tokens.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["PSG", "BAR"]);
    }

    #[tokio::test]
    async fn test_comparison_omits_unknown_tokens() {
        let explorer = Arc::new(FakeExplorer::default());
        let input = classify("compare FOO and chilizinu", &TOKEN_REGISTRY);
        let Some(QueryResult::Tokens { tokens, .. }) = aggregator(explorer.clone(), 1).resolve(&input).await else {
            panic!("expected token list");
        };
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_unverified());
        assert_eq!(explorer.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_token_and_free_text_resolve_to_none() {
        let explorer = Arc::new(FakeExplorer::default());
        let agg = aggregator(explorer.clone(), 1);
        assert!(agg.resolve(&ClassifiedInput::TokenQuery("nope".into())).await.is_none());
        assert!(agg.resolve(&ClassifiedInput::FreeText("hello".into())).await.is_none());
        assert_eq!(explorer.search_calls.load(Ordering::SeqCst), 0);
    }
}
