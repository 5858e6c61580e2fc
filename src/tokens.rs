//! Token model and base-unit amount handling.
//!
//! The native asset is represented by a zero-address sentinel in user-facing
//! positions. Every pool, quote, and path operation works on the wrapped
//! contract address instead; `Token::for_pools` performs that substitution
//! and `Token::for_display` undoes it.

use anyhow::{anyhow, bail, Result};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
    pub is_native: bool,
}

impl Token {
    /// The chain's native asset, carried under the zero-address sentinel.
    pub fn native(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address: Address::zero(),
            decimals,
            symbol: symbol.into(),
            is_native: true,
        }
    }

    pub fn erc20(address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            address,
            decimals,
            symbol: symbol.into(),
            is_native: false,
        }
    }

    /// Pool-facing form of this token: the native sentinel is replaced by the
    /// wrapped-native contract address. Idempotent for ERC-20 tokens.
    pub fn for_pools(&self, wrapped_native: Address) -> Token {
        if self.is_native {
            Token {
                address: wrapped_native,
                decimals: self.decimals,
                symbol: format!("W{}", self.symbol),
                is_native: false,
            }
        } else {
            self.clone()
        }
    }

    /// Display form: a token at the wrapped-native address maps back to the
    /// native sentinel so balances and quotes render as the user expects.
    pub fn for_display(&self, wrapped_native: Address, native_symbol: &str) -> Token {
        if !self.is_native && self.address == wrapped_native {
            Token::native(native_symbol, self.decimals)
        } else {
            self.clone()
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.symbol, self.address)
    }
}

/// Parses a decimal string amount into integer base units.
///
/// No floating-point intermediate: the string is split at the decimal point
/// and the fraction right-padded to `decimals` digits. Amounts with more
/// fractional digits than the token carries are rejected rather than
/// truncated.
pub fn parse_base_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        bail!("empty amount");
    }
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        bail!("invalid amount '{amount}'");
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        bail!("invalid amount '{amount}'");
    }
    if frac_part.len() > decimals as usize {
        bail!(
            "amount '{amount}' has more than {decimals} fractional digits"
        );
    }
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(if int_part.is_empty() { "0" } else { int_part });
    digits.push_str(frac_part);
    for _ in 0..(decimals as usize - frac_part.len()) {
        digits.push('0');
    }
    U256::from_dec_str(&digits).map_err(|e| anyhow!("amount overflow: {e}"))
}

/// Formats integer base units as a decimal string, trimming trailing zeros.
pub fn format_base_units(amount: U256, decimals: u8) -> String {
    let raw = amount.to_string();
    let decimals = decimals as usize;
    let (int_part, frac_part) = if raw.len() > decimals {
        let split = raw.len() - decimals;
        (raw[..split].to_string(), raw[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", raw, width = decimals))
    };
    let frac_trimmed = frac_part.trim_end_matches('0');
    if frac_trimmed.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac_trimmed}")
    }
}

/// Display-only conversion to `Decimal`. Never feeds on-chain arithmetic;
/// very large amounts can exceed `Decimal` range and surface as errors here.
pub fn to_display_decimal(amount: U256, decimals: u8) -> Result<Decimal> {
    Decimal::from_str(&format_base_units(amount, decimals))
        .map_err(|e| anyhow!("amount not representable for display: {e}"))
}
