// src/engine/formatter.rs

use ethers_core::types::U256;

use super::{
    aggregator::{AddressReport, QueryResult},
    registry::TokenRegistry,
};
use crate::blockchain::models::{ContractInfo, ContractRef, TokenDescriptor, TransactionInfo};

/// Native token scale: 1 CHZ = 10^18 wei.
const CHZ_DECIMALS: usize = 18;
/// Digits shown after the decimal point.
const DISPLAY_DECIMALS: usize = 4;

/// Renders query results as markdown. Pure: no clock, no randomness, so
/// the same input always yields the same bytes.
#[derive(Debug, Clone)]
pub struct ResponseFormatter {
    explorer_url: String,
    registry: &'static TokenRegistry,
}

impl ResponseFormatter {
    pub fn new(explorer_url: &str, registry: &'static TokenRegistry) -> Self {
        Self {
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
            registry,
        }
    }

    pub fn format(&self, result: Option<&QueryResult>, original_query: &str) -> String {
        match result {
            Some(QueryResult::Address(report)) => self.address(report),
            Some(QueryResult::Transaction(tx)) => self.transaction(tx),
            Some(QueryResult::Tokens { tokens, .. }) => match tokens.as_slice() {
                [] => self.not_found(original_query),
                [token] => self.token_card(token),
                many => self.comparison(many),
            },
            None => match self.registry.lookup(original_query) {
                Some(hit) => self.token_card(hit.token),
                None => self.not_found(original_query),
            },
        }
    }

    fn address(&self, report: &AddressReport) -> String {
        let mut lines = vec![format!("## Address `{}`", report.address)];

        if let Some(balance) = &report.balance_wei {
            lines.push(String::new());
            lines.push(format!("**Balance:** {}", chz_or_raw(balance)));
        }

        if let Some(token) = &report.token {
            lines.push(String::new());
            lines.push("### Token Information".to_string());
            lines.extend(token_fields(token));
        }

        if let Some(contract) = &report.contract {
            lines.push(String::new());
            lines.push("### Contract Information".to_string());
            lines.extend(contract_fields(contract));
        }

        lines.push(String::new());
        lines.push(self.link(&format!("address/{}", report.address)));
        lines.join("\n")
    }

    fn transaction(&self, tx: &TransactionInfo) -> String {
        let mut lines = vec![format!("## Transaction `{}`", tx.hash), String::new()];

        if let Some(block) = &tx.block_number {
            lines.push(format!("- **Block:** {}", block));
        }
        if let Some(from) = &tx.from {
            lines.push(format!("- **From:** `{}`", from));
        }
        if let Some(to) = &tx.to {
            lines.push(format!("- **To:** `{}`", to));
        }
        if let Some(value) = &tx.value {
            lines.push(format!("- **Value:** {}", chz_or_raw(value)));
        }
        if let Some(gas) = &tx.gas_used {
            lines.push(format!("- **Gas Used:** {}", gas));
        }
        if let Some(success) = tx.success {
            lines.push(format!("- **Status:** {}", if success { "Success" } else { "Failed" }));
        }

        lines.push(String::new());
        lines.push(self.link(&format!("tx/{}", tx.hash)));
        lines.join("\n")
    }

    fn token_card(&self, token: &TokenDescriptor) -> String {
        let mut lines = vec![format!("## {} ({})", token.name, token.symbol), String::new()];
        lines.extend(token_fields(token));

        if token.is_unverified() {
            lines.push(String::new());
            lines.extend(unverified_warning(token));
            lines.push(String::new());
            lines.extend(next_steps());
        } else if let Some(link) = self.token_link(token) {
            lines.push(String::new());
            lines.push(link);
        }
        lines.join("\n")
    }

    fn comparison(&self, tokens: &[TokenDescriptor]) -> String {
        let header = tokens
            .iter()
            .map(|t| t.symbol.as_str())
            .collect::<Vec<_>>()
            .join(" vs ");
        let mut lines = vec![format!("## {}", header)];

        for (i, token) in tokens.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!("### {}. {} ({})", i + 1, token.name, token.symbol));
            lines.extend(token_fields(token));
            if token.is_unverified() {
                lines.push("- **Warning:** Unverified token, no contract is known".to_string());
            } else if let Some(link) = self.token_link(token) {
                lines.push(format!("- {}", link));
            }
        }
        lines.join("\n")
    }

    fn not_found(&self, query: &str) -> String {
        let query = query.trim();
        let subject = if query.is_empty() {
            "that".to_string()
        } else {
            format!("\"{}\"", query)
        };
        [
            format!("I couldn't find any token or on-chain data for {}.", subject),
            String::new(),
            "Try one of these:".to_string(),
            "- Check the spelling, or use the token symbol (for example `$PSG`)".to_string(),
            "- Paste a contract or wallet address (`0x` followed by 40 hex characters)".to_string(),
            "- Paste a transaction hash (`0x` followed by 64 hex characters)".to_string(),
            String::new(),
            format!("Popular tokens: {}", self.registry.popular_symbols().join(", ")),
        ]
        .join("\n")
    }

    fn token_link(&self, token: &TokenDescriptor) -> Option<String> {
        match &token.contract {
            ContractRef::Address(address) => Some(self.link(&format!("token/{}", address))),
            ContractRef::Native => Some(format!("[View on Chiliz Explorer]({})", self.explorer_url)),
            ContractRef::Unverified => None,
        }
    }

    fn link(&self, path: &str) -> String {
        format!("[View on Chiliz Explorer]({}/{})", self.explorer_url, path)
    }
}

fn token_fields(token: &TokenDescriptor) -> Vec<String> {
    let contract = match &token.contract {
        ContractRef::Native => "Native (no contract)".to_string(),
        ContractRef::Unverified => "Not verified".to_string(),
        ContractRef::Address(address) => format!("`{}`", address),
    };
    let mut fields = vec![
        format!("- **Name:** {}", token.name),
        format!("- **Symbol:** {}", token.symbol),
        format!("- **Contract:** {}", contract),
    ];
    if let Some(decimals) = token.decimals {
        fields.push(format!("- **Decimals:** {}", decimals));
    }
    fields.push(format!("- **Total Supply:** {}", token.total_supply));
    fields.push(format!("- **Type:** {}", token.kind.label()));
    if token.is_unverified() {
        fields.push("- **Status:** Unverified".to_string());
    }
    fields
}

fn contract_fields(contract: &ContractInfo) -> Vec<String> {
    let mut fields = vec![format!(
        "- **Verified:** {}",
        if contract.is_verified() { "Yes (ABI published)" } else { "No" }
    )];
    if let Some(name) = &contract.contract_name {
        fields.push(format!("- **Contract Name:** {}", name));
    }
    if let Some(compiler) = &contract.compiler_version {
        fields.push(format!("- **Compiler:** {}", compiler));
    }
    if let Some(optimized) = contract.optimization_used {
        fields.push(format!(
            "- **Optimization:** {}",
            if optimized { "Enabled" } else { "Disabled" }
        ));
    }
    if let Some(license) = &contract.license {
        fields.push(format!("- **License:** {}", license));
    }
    fields
}

fn unverified_warning(token: &TokenDescriptor) -> Vec<String> {
    let mut lines = vec![format!(
        "> ⚠️ **Unverified token.** {} has no verified contract on the Chiliz explorer.",
        token.symbol
    )];
    if let Some(guidance) = &token.guidance {
        lines.push(format!("> {}", guidance));
    }
    lines
}

fn next_steps() -> Vec<String> {
    vec![
        "### Next steps".to_string(),
        "1. Get the contract address from the project's official channels.".to_string(),
        "2. Paste that address here to inspect it on the explorer.".to_string(),
        "3. Do not trade a token whose contract you cannot verify.".to_string(),
    ]
}

fn chz_or_raw(wei: &str) -> String {
    match format_chz(wei) {
        Some(chz) => format!("{} CHZ", chz),
        None => format!("{} wei", wei),
    }
}

/// Converts a decimal wei string to CHZ with four decimals, rounding half up.
///
/// Zero renders as `0.0000`; positive amounts below `0.0001` switch to
/// scientific notation with four significant digits (`5.000e-5`).
pub fn format_chz(wei: &str) -> Option<String> {
    let wei = U256::from_dec_str(wei.trim()).ok()?;
    if wei.is_zero() {
        return Some(format!("0.{}", "0".repeat(DISPLAY_DECIMALS)));
    }

    let step = U256::exp10(CHZ_DECIMALS - DISPLAY_DECIMALS);
    if wei < step {
        // Fits in a u64 since step is 10^14.
        let value = wei.as_u64() as f64 / 1e18;
        return Some(format!("{:.3e}", value));
    }

    let half = step / 2;
    let scaled = wei.checked_add(half).unwrap_or(wei) / step;
    let unit = U256::exp10(DISPLAY_DECIMALS);
    Some(format!(
        "{}.{:0>width$}",
        scaled / unit,
        (scaled % unit).to_string(),
        width = DISPLAY_DECIMALS
    ))
}

/// Scales a raw integer token amount by `decimals` and groups the whole part
/// with thousands separators. Unknown decimals leave the amount unscaled.
pub fn format_token_amount(raw: &str, decimals: Option<u8>) -> Option<String> {
    let amount = U256::from_dec_str(raw.trim()).ok()?;
    let decimals = decimals.unwrap_or(0) as usize;
    let divisor = U256::exp10(decimals);
    let whole = group_thousands(&(amount / divisor).to_string());

    let remainder = amount % divisor;
    if remainder.is_zero() {
        return Some(whole);
    }
    let fraction = format!("{:0>width$}", remainder.to_string(), width = decimals);
    let fraction: String = fraction.chars().take(DISPLAY_DECIMALS).collect();
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        Some(whole)
    } else {
        Some(format!("{}.{}", whole, fraction))
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::models::{Address, TokenKind, TxHash};
    use crate::engine::registry::TOKEN_REGISTRY;

    const EXPLORER: &str = "https://scan.chiliz.com";
    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn formatter() -> ResponseFormatter {
        ResponseFormatter::new(EXPLORER, &TOKEN_REGISTRY)
    }

    fn address_report() -> AddressReport {
        AddressReport {
            address: Address::parse(ADDRESS).unwrap(),
            balance_wei: Some("1000000000000000000".into()),
            token: Some(TokenDescriptor {
                name: "Sample Token".into(),
                symbol: "SMP".into(),
                contract: ContractRef::Address(Address::parse(ADDRESS).unwrap()),
                decimals: Some(18),
                kind: TokenKind::CommunityToken,
                total_supply: "1,000,000 SMP".into(),
                status: None,
                guidance: None,
            }),
            contract: Some(ContractInfo {
                contract_name: Some("SampleToken".into()),
                compiler_version: Some("v0.8.19+commit.7dd6d404".into()),
                optimization_used: Some(true),
                license: Some("MIT".into()),
                abi: Some("[]".into()),
            }),
        }
    }

    #[test]
    fn test_format_chz() {
        assert_eq!(format_chz("1000000000000000000").unwrap(), "1.0000");
        assert_eq!(format_chz("0").unwrap(), "0.0000");
        assert_eq!(format_chz("50000000000000").unwrap(), "5.000e-5");
        assert_eq!(format_chz("123456789").unwrap(), "1.235e-10");
        assert_eq!(format_chz("100000000000000").unwrap(), "0.0001");
        assert_eq!(format_chz("1234567890000000000000").unwrap(), "1234.5679");
        assert_eq!(format_chz("1999950000000000000").unwrap(), "2.0000");
        assert!(format_chz("not a number").is_none());
        assert!(format_chz("-5").is_none());
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount("20000000", Some(0)).unwrap(), "20,000,000");
        assert_eq!(
            format_token_amount("8888888888000000000000000000", Some(18)).unwrap(),
            "8,888,888,888"
        );
        assert_eq!(format_token_amount("1500", Some(3)).unwrap(), "1.5");
        assert_eq!(format_token_amount("999", None).unwrap(), "999");
        assert!(format_token_amount("", Some(0)).is_none());
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("100000"), "100,000");
        assert_eq!(group_thousands("8888888888"), "8,888,888,888");
    }

    #[test]
    fn test_chz_card() {
        let out = formatter().format(None, "chz");
        assert!(out.contains("CHZ"));
        assert!(out.contains("8,888,888,888 CHZ"));
        assert!(out.contains("Native Token"));
        assert!(out.contains(EXPLORER));
    }

    #[test]
    fn test_unverified_card_has_no_link() {
        let out = formatter().format(None, "chilizinu");
        assert!(out.contains("Unverified"));
        assert!(out.contains("Next steps"));
        assert!(!out.contains("https://"));
    }

    #[test]
    fn test_not_found_lists_popular_symbols() {
        let out = formatter().format(None, "doesnotexist");
        assert!(out.contains("\"doesnotexist\""));
        assert!(out.contains("Popular tokens: CHZ, PSG, BAR"));
    }

    #[test]
    fn test_address_sections_in_order() {
        let report = address_report();
        let out = formatter().format(Some(&QueryResult::Address(report)), ADDRESS);

        let positions: Vec<usize> = [
            "## Address",
            "**Balance:** 1.0000 CHZ",
            "### Token Information",
            "### Contract Information",
            "[View on Chiliz Explorer](https://scan.chiliz.com/address/",
        ]
        .iter()
        .map(|needle| out.find(needle).unwrap_or_else(|| panic!("missing {}", needle)))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", out);

        for field in ["SampleToken", "v0.8.19+commit.7dd6d404", "MIT", "Enabled", "1,000,000 SMP", "Yes (ABI published)"] {
            assert!(out.contains(field), "missing {}", field);
        }
    }

    #[test]
    fn test_address_omits_missing_sections() {
        let report = AddressReport {
            address: Address::parse(ADDRESS).unwrap(),
            balance_wei: Some("50000000000000".into()),
            token: None,
            contract: None,
        };
        let out = formatter().format(Some(&QueryResult::Address(report)), ADDRESS);
        assert!(out.contains("5.000e-5 CHZ"));
        assert!(!out.contains("Token Information"));
        assert!(!out.contains("Contract Information"));
    }

    #[test]
    fn test_unverified_contract() {
        let mut report = address_report();
        report.contract = Some(ContractInfo::default());
        report.token = None;
        let out = formatter().format(Some(&QueryResult::Address(report)), ADDRESS);
        assert!(out.contains("- **Verified:** No"));
        assert!(!out.contains("Contract Name"));
    }

    #[test]
    fn test_transaction_fields() {
        let hash = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";
        let tx = TransactionInfo {
            hash: TxHash::parse(hash).unwrap(),
            block_number: Some("1234567".into()),
            from: Some(ADDRESS.into()),
            to: None,
            value: Some("2500000000000000000".into()),
            gas_used: Some("21000".into()),
            success: Some(true),
        };
        let out = formatter().format(Some(&QueryResult::Transaction(tx)), hash);
        assert!(out.starts_with(&format!("## Transaction `{}`", hash)));
        assert!(out.contains("- **Block:** 1234567"));
        assert!(out.contains("- **Value:** 2.5000 CHZ"));
        assert!(out.contains("- **Gas Used:** 21000"));
        assert!(out.contains("- **Status:** Success"));
        assert!(!out.contains("**To:**"));
        assert!(out.contains(&format!("{}/tx/{}", EXPLORER, hash)));
    }

    #[test]
    fn test_comparison_layout() {
        let tokens = vec![
            TOKEN_REGISTRY.lookup_verified("psg").unwrap().clone(),
            TOKEN_REGISTRY.lookup_verified("bar").unwrap().clone(),
        ];
        let out = formatter().format(
            Some(&QueryResult::Tokens {
                tokens,
                comparison: true,
            }),
            "compare PSG and BAR",
        );
        assert!(out.contains("## PSG vs BAR"));
        assert!(out.find("### 1.").unwrap() < out.find("### 2.").unwrap());
        assert_eq!(out.matches("/token/").count(), 2);
    }

    #[test]
    fn test_comparison_skips_link_for_unverified() {
        let tokens = vec![
            TOKEN_REGISTRY.lookup_verified("psg").unwrap().clone(),
            TOKEN_REGISTRY.lookup_extended("pepper").unwrap().clone(),
        ];
        let out = formatter().format(
            Some(&QueryResult::Tokens {
                tokens,
                comparison: true,
            }),
            "compare psg and pepper",
        );
        assert!(out.contains("## PSG vs PEPPER"));
        assert_eq!(out.matches("https://").count(), 1);
    }

    #[test]
    fn test_single_unverified_entry_gets_next_steps() {
        let tokens = vec![TOKEN_REGISTRY.lookup_extended("kayen").unwrap().clone()];
        let out = formatter().format(
            Some(&QueryResult::Tokens {
                tokens,
                comparison: false,
            }),
            "kayen",
        );
        assert!(out.contains("### Next steps"));
        assert!(!out.contains("https://"));
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let result = QueryResult::Address(address_report());
        let f = formatter();
        assert_eq!(f.format(Some(&result), ADDRESS), f.format(Some(&result), ADDRESS));
        assert_eq!(f.format(None, "psg"), f.format(None, "psg"));
    }
}
