// src/blockchain/models.rs
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// --- Chain identifiers ---

/// `0x` followed by exactly `bytes * 2` hex digits (prefix compared case-insensitively).
fn hex_body(input: &str, bytes: usize) -> Option<&str> {
    let s = input.trim();
    if s.len() != 2 + bytes * 2 || !s.get(..2)?.eq_ignore_ascii_case("0x") {
        return None;
    }
    let body = s.get(2..)?;
    hex::decode(body).ok().map(|_| body)
}

/// A 20-byte account or contract address. Keeps the caller's digit casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn parse(input: &str) -> Option<Self> {
        hex_body(input, 20).map(|body| Self(format!("0x{}", body)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid address: {}", raw)))
    }
}

/// A 32-byte transaction hash. Keeps the caller's digit casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn parse(input: &str) -> Option<Self> {
        hex_body(input, 32).map(|body| Self(format!("0x{}", body)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Token Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Native,
    FanToken,
    CommunityToken,
}

impl TokenKind {
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Native => "Native Token",
            TokenKind::FanToken => "Fan Token",
            TokenKind::CommunityToken => "Community Token",
        }
    }
}

/// Where a token lives on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum ContractRef {
    /// The chain's gas asset, no contract.
    Native,
    /// No verified contract is known.
    Unverified,
    Address(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDescriptor {
    pub name: String,
    pub symbol: String,
    pub contract: ContractRef,
    /// `None` when the decimals are unknown.
    pub decimals: Option<u8>,
    pub kind: TokenKind,
    /// Already formatted for display, e.g. `8,888,888,888 CHZ`.
    pub total_supply: String,
    pub status: Option<TokenStatus>,
    /// Guidance shown next to unverified tokens.
    pub guidance: Option<String>,
}

impl TokenDescriptor {
    pub fn is_unverified(&self) -> bool {
        self.status == Some(TokenStatus::Unverified)
    }
}

// --- Explorer Models ---

/// The `{status, message, result}` envelope every explorer `module/action` call returns.
#[derive(Debug, Deserialize)]
pub struct ExplorerEnvelope {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Value,
}

impl ExplorerEnvelope {
    /// `status` arrives as `"1"` from most deployments but some send a bare number.
    pub fn is_ok(&self) -> bool {
        match &self.status {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_u64() == Some(1),
            _ => false,
        }
    }
}

/// Raw `token/getToken` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerToken {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<String>,
    #[serde(default)]
    pub total_supply: Option<String>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
}

/// Source metadata and ABI of a contract, merged from two explorer calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractInfo {
    pub contract_name: Option<String>,
    pub compiler_version: Option<String>,
    pub optimization_used: Option<bool>,
    pub license: Option<String>,
    pub abi: Option<String>,
}

impl ContractInfo {
    /// Verified means the explorer publishes an ABI.
    pub fn is_verified(&self) -> bool {
        self.abi.is_some()
    }

    pub fn has_source_metadata(&self) -> bool {
        self.contract_name.is_some() || self.compiler_version.is_some()
    }
}

/// One element of the `contract/getsourcecode` result array.
#[derive(Debug, Deserialize)]
pub struct SourceCodeRecord {
    #[serde(rename = "ContractName", default)]
    pub contract_name: Option<String>,
    #[serde(rename = "CompilerVersion", default)]
    pub compiler_version: Option<String>,
    #[serde(rename = "OptimizationUsed", default)]
    pub optimization_used: Option<Value>,
    #[serde(rename = "LicenseType", default)]
    pub license: Option<String>,
    #[serde(rename = "ABI", default)]
    pub abi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    pub hash: TxHash,
    pub block_number: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Value in wei, decimal string.
    pub value: Option<String>,
    pub gas_used: Option<String>,
    pub success: Option<bool>,
}

impl TransactionInfo {
    pub fn bare(hash: TxHash) -> Self {
        Self {
            hash,
            block_number: None,
            from: None,
            to: None,
            value: None,
            gas_used: None,
            success: None,
        }
    }
}

/// Raw `transaction/gettxinfo` result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    #[serde(default)]
    pub block_number: Option<Value>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub gas_used: Option<Value>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// One hit of the explorer's token search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSearchHit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, rename = "token_type")]
    pub token_type: Option<String>,
}

/// Reads a JSON string or number as a non-empty string.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Trims and drops empty strings.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
