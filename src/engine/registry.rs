//! Known-token registry.
//!
//! The explorer's token search is unreliable for fan tokens, so symbol
//! lookups go through this table first and, for the aggregator, only through
//! it. It is built once, never mutated, and shared process-wide.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::blockchain::models::{Address, ContractRef, TokenDescriptor, TokenKind, TokenStatus};

lazy_static! {
    /// The process-wide registry.
    pub static ref TOKEN_REGISTRY: TokenRegistry = TokenRegistry::builtin();
}

/// Which tier a lookup hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryTier {
    Verified,
    Extended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMatch<'a> {
    pub tier: RegistryTier,
    pub token: &'a TokenDescriptor,
}

struct KnownToken {
    name: &'static str,
    symbol: &'static str,
    contract: Option<&'static str>,
    decimals: u8,
    kind: TokenKind,
    total_supply: &'static str,
    aliases: &'static [&'static str],
}

struct CommunityToken {
    name: &'static str,
    symbol: &'static str,
    kind: TokenKind,
    guidance: &'static str,
    aliases: &'static [&'static str],
}

const KNOWN_TOKENS: &[KnownToken] = &[
    KnownToken {
        name: "Chiliz",
        symbol: "CHZ",
        contract: None,
        decimals: 18,
        kind: TokenKind::Native,
        total_supply: "8,888,888,888 CHZ",
        aliases: &["chiliz"],
    },
    KnownToken {
        name: "Paris Saint-Germain Fan Token",
        symbol: "PSG",
        contract: Some("0xc2661815C69c2B3924D3dd0c2C1358A1E38A3105"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 PSG",
        aliases: &["paris saint-germain", "paris"],
    },
    KnownToken {
        name: "FC Barcelona Fan Token",
        symbol: "BAR",
        contract: Some("0xFD3C73b3B09D418841dd6Aff341b2d6e3abA433b"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "40,000,000 BAR",
        aliases: &["barcelona", "fc barcelona"],
    },
    KnownToken {
        name: "Juventus Fan Token",
        symbol: "JUV",
        contract: Some("0x454038003a93cf44766aF352F74bad6B745616D0"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 JUV",
        aliases: &["juventus"],
    },
    KnownToken {
        name: "Manchester City Fan Token",
        symbol: "CITY",
        contract: Some("0x6401b29F40a02578Ae44241560625a2a2Fc9b5Ab"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 CITY",
        aliases: &["manchester city", "man city"],
    },
    KnownToken {
        name: "AC Milan Fan Token",
        symbol: "ACM",
        contract: Some("0xF9C0F80a6c67b1B39bdDF00ecD57f2533ef5b688"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 ACM",
        aliases: &["ac milan", "milan"],
    },
    KnownToken {
        name: "Atletico de Madrid Fan Token",
        symbol: "ATM",
        contract: Some("0xe9506F70be469d2369803Ccf41823713BAFe8154"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "10,000,000 ATM",
        aliases: &["atletico madrid", "atletico"],
    },
    KnownToken {
        name: "AS Roma Fan Token",
        symbol: "ASR",
        contract: Some("0xa6610B9a1A1A5B2b3C4b57A5C3c2dfd5e81b1e26"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "10,000,000 ASR",
        aliases: &["as roma", "roma"],
    },
    KnownToken {
        name: "Galatasaray Fan Token",
        symbol: "GAL",
        contract: Some("0x6DaB8Fe8E5d425F2Eb063aAe58540aA04e273E0d"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 GAL",
        aliases: &["galatasaray"],
    },
    KnownToken {
        name: "Inter Milan Fan Token",
        symbol: "INTER",
        contract: Some("0xc727c9C0f2647CB90B0FCA64d8ddB14878716BeD"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "40,000,000 INTER",
        aliases: &["inter milan"],
    },
    KnownToken {
        name: "Arsenal Fan Token",
        symbol: "AFC",
        contract: Some("0x1d4343d35f0E0e14C14115876D01dEAa4792550b"),
        decimals: 0,
        kind: TokenKind::FanToken,
        total_supply: "20,000,000 AFC",
        aliases: &["arsenal"],
    },
];

const COMMUNITY_TOKENS: &[CommunityToken] = &[
    CommunityToken {
        name: "Chiliz Inu",
        symbol: "CHILIZINU",
        kind: TokenKind::CommunityToken,
        guidance: "Community tokens like Chiliz Inu are launched by third parties and have no verified contract on the explorer. Confirm the contract address through the project's official channels before trading.",
        aliases: &["chiliz inu"],
    },
    CommunityToken {
        name: "Pepper",
        symbol: "PEPPER",
        kind: TokenKind::CommunityToken,
        guidance: "Pepper is a community meme token. Several lookalike contracts exist, so only use an address published by the project itself.",
        aliases: &[],
    },
    CommunityToken {
        name: "Kayen",
        symbol: "KAYEN",
        kind: TokenKind::CommunityToken,
        guidance: "Kayen is a community token whose contract is not verified on the explorer. Check liquidity and the contract address on the DEX you intend to use.",
        aliases: &[],
    },
];

/// Immutable symbol → token lookup table split into a verified and an
/// extended (community, unverified) tier.
#[derive(Debug)]
pub struct TokenRegistry {
    verified: Vec<TokenDescriptor>,
    extended: Vec<TokenDescriptor>,
    /// Lower-cased symbol or alias → index into `verified`.
    verified_index: HashMap<String, usize>,
    extended_index: HashMap<String, usize>,
    /// Lower-cased contract address → index into `verified`.
    contract_index: HashMap<String, usize>,
}

impl TokenRegistry {
    pub fn builtin() -> Self {
        let verified: Vec<TokenDescriptor> = KNOWN_TOKENS
            .iter()
            .map(|t| TokenDescriptor {
                name: t.name.to_string(),
                symbol: t.symbol.to_string(),
                contract: match t.contract.and_then(Address::parse) {
                    Some(address) => ContractRef::Address(address),
                    None => ContractRef::Native,
                },
                decimals: Some(t.decimals),
                kind: t.kind,
                total_supply: t.total_supply.to_string(),
                status: None,
                guidance: None,
            })
            .collect();

        let extended: Vec<TokenDescriptor> = COMMUNITY_TOKENS
            .iter()
            .map(|t| TokenDescriptor {
                name: t.name.to_string(),
                symbol: t.symbol.to_string(),
                contract: ContractRef::Unverified,
                decimals: None,
                kind: t.kind,
                total_supply: "Unknown".to_string(),
                status: Some(TokenStatus::Unverified),
                guidance: Some(t.guidance.to_string()),
            })
            .collect();

        let mut verified_index = HashMap::new();
        let mut contract_index = HashMap::new();
        for (i, t) in KNOWN_TOKENS.iter().enumerate() {
            verified_index.insert(t.symbol.to_lowercase(), i);
            for alias in t.aliases {
                verified_index.insert(alias.to_string(), i);
            }
            if let Some(contract) = t.contract {
                contract_index.insert(contract.to_lowercase(), i);
            }
        }

        let mut extended_index = HashMap::new();
        for (i, t) in COMMUNITY_TOKENS.iter().enumerate() {
            extended_index.insert(t.symbol.to_lowercase(), i);
            for alias in t.aliases {
                extended_index.insert(alias.to_string(), i);
            }
        }

        Self {
            verified,
            extended,
            verified_index,
            extended_index,
            contract_index,
        }
    }

    /// Exact-match lookup of a symbol, name alias or `$SYMBOL`, verified tier first.
    pub fn lookup(&self, reference: &str) -> Option<RegistryMatch<'_>> {
        let key = normalize_reference(reference);
        if key.is_empty() {
            return None;
        }
        if let Some(&i) = self.verified_index.get(&key) {
            return Some(RegistryMatch {
                tier: RegistryTier::Verified,
                token: &self.verified[i],
            });
        }
        self.extended_index.get(&key).map(|&i| RegistryMatch {
            tier: RegistryTier::Extended,
            token: &self.extended[i],
        })
    }

    pub fn lookup_verified(&self, reference: &str) -> Option<&TokenDescriptor> {
        self.verified_index
            .get(&normalize_reference(reference))
            .map(|&i| &self.verified[i])
    }

    pub fn lookup_extended(&self, reference: &str) -> Option<&TokenDescriptor> {
        self.extended_index
            .get(&normalize_reference(reference))
            .map(|&i| &self.extended[i])
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.lookup(reference).is_some()
    }

    /// Verified token deployed at `address`, if any.
    pub fn by_contract(&self, address: &Address) -> Option<&TokenDescriptor> {
        self.contract_index
            .get(&address.as_str().to_lowercase())
            .map(|&i| &self.verified[i])
    }

    /// Verified symbols in registry order, for "did you mean" style hints.
    pub fn popular_symbols(&self) -> Vec<&str> {
        self.verified.iter().map(|t| t.symbol.as_str()).collect()
    }
}

/// Trims, drops a leading `$`, lower-cases and collapses inner whitespace.
pub fn normalize_reference(reference: &str) -> String {
    let trimmed = reference.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_symbol_alias_and_dollar_prefix() {
        let registry = TokenRegistry::builtin();
        assert_eq!(registry.lookup("psg").unwrap().token.symbol, "PSG");
        assert_eq!(registry.lookup(" $PSG ").unwrap().token.symbol, "PSG");
        assert_eq!(registry.lookup("Barcelona").unwrap().token.symbol, "BAR");
        assert_eq!(registry.lookup("chiliz").unwrap().token.symbol, "CHZ");
        assert_eq!(registry.lookup("Manchester   City").unwrap().token.symbol, "CITY");
    }

    #[test]
    fn test_lookup_is_exact_match_only() {
        let registry = TokenRegistry::builtin();
        assert!(registry.lookup("ps").is_none());
        assert!(registry.lookup("psgg").is_none());
        assert!(registry.lookup("").is_none());
        assert!(registry.lookup("$").is_none());
    }

    #[test]
    fn test_extended_tier_is_marked_unverified() {
        let registry = TokenRegistry::builtin();
        let hit = registry.lookup("chilizinu").unwrap();
        assert_eq!(hit.tier, RegistryTier::Extended);
        assert!(hit.token.is_unverified());
        assert_eq!(hit.token.contract, ContractRef::Unverified);
        assert_eq!(hit.token.decimals, None);
        assert!(hit.token.guidance.is_some());
        assert!(registry.lookup_verified("chilizinu").is_none());
        assert!(registry.lookup_extended("chilizinu").is_some());
    }

    #[test]
    fn test_native_token_has_no_contract() {
        let registry = TokenRegistry::builtin();
        let chz = registry.lookup_verified("chz").unwrap();
        assert_eq!(chz.contract, ContractRef::Native);
        assert_eq!(chz.kind, TokenKind::Native);
        assert_eq!(chz.total_supply, "8,888,888,888 CHZ");
    }

    #[test]
    fn test_every_fan_token_address_parses() {
        let registry = TokenRegistry::builtin();
        for t in KNOWN_TOKENS.iter().filter(|t| t.kind == TokenKind::FanToken) {
            let descriptor = registry.lookup_verified(t.symbol).unwrap();
            assert!(
                matches!(descriptor.contract, ContractRef::Address(_)),
                "{} has a malformed contract address",
                t.symbol
            );
        }
    }

    #[test]
    fn test_reverse_lookup_by_contract_ignores_case() {
        let registry = TokenRegistry::builtin();
        let addr = Address::parse("0xc2661815c69c2b3924d3dd0c2c1358a1e38a3105").unwrap();
        assert_eq!(registry.by_contract(&addr).unwrap().symbol, "PSG");
    }

    #[test]
    fn test_popular_symbols_start_with_native() {
        let registry = TokenRegistry::builtin();
        let symbols = registry.popular_symbols();
        assert_eq!(symbols[0], "CHZ");
        assert!(symbols.contains(&"PSG"));
        assert!(!symbols.contains(&"CHILIZINU"));
    }
}
