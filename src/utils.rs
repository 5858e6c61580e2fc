// src/utils.rs
// Utility functions shared across the swap engine.

use crate::settings::{LogFormat, LogSettings};
use anyhow::{anyhow, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{TransactionReceipt, TxHash};
use log::debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

/// Initializes the process-wide logger from settings.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(settings: &LogSettings) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&settings.level);
    if matches!(settings.format, LogFormat::Json) {
        builder.format(|buf, record| {
            use std::io::Write;
            let line = serde_json::json!({
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{line}")
        });
    }
    let _ = builder.try_init();
}

/// Current wall-clock time in epoch seconds.
pub fn now_epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Polls for a transaction receipt until it lands or `timeout` elapses.
///
/// Transient read errors keep the poll alive; only the timeout is terminal.
/// Once a transaction is broadcast it cannot be cancelled, so the caller's
/// only options are to observe the receipt or give up waiting.
pub async fn wait_for_receipt(
    provider: &Arc<Provider<Http>>,
    hash: TxHash,
    poll: Duration,
    timeout: Duration,
) -> Result<TransactionReceipt> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match provider.get_transaction_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => {}
            Err(e) => debug!("receipt lookup for {hash:?} failed, retrying: {e}"),
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!("timed out waiting for receipt of {hash:?}"));
        }
        sleep(poll).await;
    }
}

/// True when a mined receipt reports success.
pub fn receipt_succeeded(receipt: &TransactionReceipt) -> bool {
    receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false)
}
