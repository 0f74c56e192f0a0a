// src/engine/classifier.rs

use lazy_static::lazy_static;
use regex::Regex;

use super::registry::{normalize_reference, TokenRegistry};
use crate::blockchain::models::{Address, TxHash};

lazy_static! {
    static ref COMPARISON: Regex =
        Regex::new(r"(?i)^compare\s+(.+?)\s+and\s+(.+?)\s*[?.!]*$").expect("comparison pattern compiles");
}

/// What a raw input string asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedInput {
    Address(Address),
    TransactionHash(TxHash),
    /// Normalized token reference (lower-cased, no `$`).
    TokenQuery(String),
    /// Two normalized token references, in input order.
    ComparisonQuery(String, String),
    /// Anything else; answered by the AI session.
    FreeText(String),
}

impl ClassifiedInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifiedInput::Address(_) => "address",
            ClassifiedInput::TransactionHash(_) => "transaction_hash",
            ClassifiedInput::TokenQuery(_) => "token",
            ClassifiedInput::ComparisonQuery(_, _) => "comparison",
            ClassifiedInput::FreeText(_) => "free_text",
        }
    }
}

/// Classifies `input`. Never fails: unrecognized input is [`ClassifiedInput::FreeText`].
pub fn classify(input: &str, registry: &TokenRegistry) -> ClassifiedInput {
    let trimmed = input.trim();

    if let Some(address) = Address::parse(trimmed) {
        return ClassifiedInput::Address(address);
    }
    if let Some(hash) = TxHash::parse(trimmed) {
        return ClassifiedInput::TransactionHash(hash);
    }
    if let Some(captures) = COMPARISON.captures(trimmed) {
        let first = normalize_reference(&captures[1]);
        let second = normalize_reference(&captures[2]);
        if !first.is_empty() && !second.is_empty() {
            return ClassifiedInput::ComparisonQuery(first, second);
        }
    }
    if registry.contains(trimmed) {
        return ClassifiedInput::TokenQuery(normalize_reference(trimmed));
    }
    ClassifiedInput::FreeText(trimmed.to_string())
}
