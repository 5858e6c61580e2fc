use config::{Config, ConfigError, File};
use ethers::types::Address;
use serde::Deserialize;
use serde_json;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    #[serde(default)]
    pub http_urls: Vec<String>,
    #[serde(default = "default_qps_limit")]
    pub qps_limit: u32,
    #[serde(default = "default_max_concurrent_per_provider")]
    pub max_concurrent_per_provider: usize,
    #[serde(default = "default_unhealthy_cooldown_seconds")]
    pub unhealthy_cooldown_seconds: u64,
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
}

fn default_qps_limit() -> u32 {
    25
}
fn default_max_concurrent_per_provider() -> usize {
    8
}
fn default_unhealthy_cooldown_seconds() -> u64 {
    30
}
fn default_rate_limit_backoff_ms() -> u64 {
    1_000
}

/// On-chain contract addresses the engine talks to. All required: a missing
/// router or quoter makes every swap path unusable.
#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    pub factory: Address,
    pub quoter: Address,
    pub router: Address,
    pub wrapped_native: Address,
    pub fee_collector: Address,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Swap {
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u32,
    #[serde(default = "default_deadline_seconds")]
    pub deadline_seconds: u64,
    /// Protocol fee taken from the swap output, in whole percent.
    #[serde(default = "default_fee_percent")]
    pub fee_percent: u64,
    /// Suggested debounce for UI-driven quote refreshes.
    #[serde(default = "default_quote_debounce_ms")]
    pub quote_debounce_ms: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_seconds")]
    pub receipt_timeout_seconds: u64,
    /// Native balance held back from swaps to keep gas payable, in wei.
    #[serde(default = "default_native_gas_reserve_wei")]
    pub native_gas_reserve_wei: u128,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
}

fn default_slippage_bps() -> u32 {
    50 // 0.5%
}
fn default_deadline_seconds() -> u64 {
    1_200 // 20 minutes
}
fn default_fee_percent() -> u64 {
    1
}
fn default_quote_debounce_ms() -> u64 {
    500
}
fn default_receipt_poll_ms() -> u64 {
    1_500
}
fn default_receipt_timeout_seconds() -> u64 {
    180
}
fn default_native_gas_reserve_wei() -> u128 {
    2_000_000_000_000_000 // 0.002 native
}
fn default_native_symbol() -> String {
    "ETH".to_string()
}
fn default_native_decimals() -> u8 {
    18
}

impl Default for Swap {
    fn default() -> Self {
        Self {
            default_slippage_bps: default_slippage_bps(),
            deadline_seconds: default_deadline_seconds(),
            fee_percent: default_fee_percent(),
            quote_debounce_ms: default_quote_debounce_ms(),
            receipt_poll_ms: default_receipt_poll_ms(),
            receipt_timeout_seconds: default_receipt_timeout_seconds(),
            native_gas_reserve_wei: default_native_gas_reserve_wei(),
            native_symbol: default_native_symbol(),
            native_decimals: default_native_decimals(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[default]
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chain {
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    pub chain: Chain,
    pub contracts: Contracts,
    #[serde(default)]
    pub swap: Swap,
    #[serde(default)]
    pub log: LogSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("Config.toml")
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder().add_source(File::with_name(path)).build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for RPC configuration
        if let Ok(raw_http) = env::var("SWAP_RPC_HTTP_URLS") {
            if let Some(list) = parse_string_list(&raw_http) {
                if !list.is_empty() {
                    settings.rpc.http_urls = list;
                }
            }
        }

        // Optional: fee collector override via ENV
        if let Ok(raw) = env::var("SWAP_FEE_COLLECTOR") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                if let Ok(addr) = trimmed.parse() {
                    settings.contracts.fee_collector = addr;
                }
            }
        }

        Ok(settings)
    }
}

fn parse_string_list(input: &str) -> Option<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(vec![]);
    }

    // JSON array form first, comma-separated as fallback.
    if trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Some(v);
        }
    }
    let parts: Vec<String> = trimmed
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[rpc]
http_urls = ["http://127.0.0.1:8545"]

[chain]
chain_id = 42161

[contracts]
factory = "0x1F98431c8aD98523631AE4a59f267346ea31F984"
quoter = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e"
router = "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"
wrapped_native = "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"
fee_collector = "0x000000000000000000000000000000000000dEaD"
"#
        )
        .unwrap();

        let settings = Settings::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.chain.chain_id, 42161);
        assert_eq!(settings.swap.default_slippage_bps, 50);
        assert_eq!(settings.swap.deadline_seconds, 1_200);
        assert_eq!(settings.rpc.max_concurrent_per_provider, 8);
    }

    #[test]
    fn parses_url_lists_in_both_forms() {
        assert_eq!(
            parse_string_list(r#"["http://a", "http://b"]"#).unwrap(),
            vec!["http://a", "http://b"]
        );
        assert_eq!(
            parse_string_list("http://a, http://b").unwrap(),
            vec!["http://a", "http://b"]
        );
        assert!(parse_string_list("  ").unwrap().is_empty());
    }
}
