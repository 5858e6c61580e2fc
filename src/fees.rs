//! Post-swap protocol fee skim.
//!
//! The fee is a fixed percentage of the swap's *output*, collected in the
//! output token as a separate transaction after the swap has settled. A
//! failed skim is logged and recorded on the outcome but never re-reports
//! the swap as failed — by the time this runs, the swap is irreversible.

use crate::contracts::Erc20;
use crate::rpc_pool::RpcPool;
use crate::signer::TransactionSigner;
use crate::tokens::Token;
use crate::utils::{receipt_succeeded, wait_for_receipt};
use anyhow::{anyhow, Result};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionReceipt, TransactionRequest, TxHash, H256, U256, U512};
use ethers::utils::keccak256;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Result of one fee collection attempt. This type is informational: a set
/// `error` does not fail the swap that produced it.
#[derive(Debug, Clone, Default)]
pub struct FeeOutcome {
    pub amount: U256,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
}

/// `floor(output_amount * fee_percent / 100)`, integer arithmetic.
/// Percentages above 100 clamp so the fee can never exceed the output.
pub fn compute_fee(output_amount: U256, fee_percent: u64) -> U256 {
    let percent = fee_percent.min(100);
    let scaled = output_amount.full_mul(U256::from(percent)) / U512::from(100u64);
    U256::try_from(scaled).unwrap_or(output_amount)
}

pub struct FeeModule {
    collector: Address,
    fee_percent: u64,
    rpc_pool: Arc<RpcPool>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl FeeModule {
    pub fn new(
        collector: Address,
        fee_percent: u64,
        rpc_pool: Arc<RpcPool>,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            fee_percent,
            rpc_pool,
            receipt_poll,
            receipt_timeout,
        }
    }

    /// Best-effort skim of the protocol fee from `output_amount` of the
    /// output token (a plain value transfer when the output is native).
    pub async fn collect(
        &self,
        signer: &dyn TransactionSigner,
        wallet_id: &str,
        token_out: &Token,
        output_amount: U256,
    ) -> FeeOutcome {
        let amount = compute_fee(output_amount, self.fee_percent);
        if amount.is_zero() {
            return FeeOutcome::default();
        }
        match self.submit(signer, wallet_id, token_out, amount).await {
            Ok(tx_hash) => {
                info!(
                    "fee collected: {} base units of {} via {tx_hash:?}",
                    amount, token_out.symbol
                );
                FeeOutcome {
                    amount,
                    tx_hash: Some(tx_hash),
                    error: None,
                }
            }
            Err(e) => {
                warn!("fee collection failed (swap outcome unaffected): {e}");
                FeeOutcome {
                    amount,
                    tx_hash: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn submit(
        &self,
        signer: &dyn TransactionSigner,
        wallet_id: &str,
        token_out: &Token,
        amount: U256,
    ) -> Result<TxHash> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let tx: TypedTransaction = if token_out.is_native {
            TransactionRequest {
                to: Some(self.collector.into()),
                value: Some(amount),
                ..Default::default()
            }
            .into()
        } else {
            let erc20 = Erc20::new(token_out.address, Arc::clone(&provider));
            erc20.transfer(self.collector, amount).tx
        };

        let hash = signer.sign_and_submit(wallet_id, tx).await?;
        let receipt =
            wait_for_receipt(&provider, hash, self.receipt_poll, self.receipt_timeout).await?;
        if !receipt_succeeded(&receipt) {
            return Err(anyhow!("fee transfer {hash:?} reverted"));
        }
        Ok(hash)
    }
}

/// Reads the swap's actual output from its receipt: the last `Transfer` of
/// `token_out` paying `recipient`. Returns `None` when no such log exists
/// (native output is delivered by unwrap, not by a token transfer).
pub fn output_from_receipt(
    receipt: &TransactionReceipt,
    token_out: Address,
    recipient: Address,
) -> Option<U256> {
    let transfer_topic = H256::from(keccak256(b"Transfer(address,address,uint256)"));
    receipt
        .logs
        .iter()
        .rev()
        .find(|log| {
            log.address == token_out
                && log.topics.len() >= 3
                && log.topics[0] == transfer_topic
                && log.topics[2] == H256::from(recipient)
                && log.data.len() == 32
        })
        .map(|log| U256::from_big_endian(log.data.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, Log};

    #[test]
    fn fee_is_floored_percent_of_output() {
        assert_eq!(compute_fee(U256::from(1_000u64), 1), U256::from(10u64));
        assert_eq!(compute_fee(U256::from(99u64), 1), U256::zero());
        assert_eq!(compute_fee(U256::from(1_000u64), 0), U256::zero());
        // clamp: a misconfigured percentage cannot exceed the output
        assert_eq!(compute_fee(U256::from(50u64), 250), U256::from(50u64));
    }

    fn transfer_log(token: Address, to: Address, amount: U256) -> Log {
        let mut data = [0u8; 32];
        amount.to_big_endian(&mut data);
        Log {
            address: token,
            topics: vec![
                H256::from(keccak256(b"Transfer(address,address,uint256)")),
                H256::from(Address::repeat_byte(0x99)),
                H256::from(to),
            ],
            data: Bytes::from(data.to_vec()),
            ..Default::default()
        }
    }

    #[test]
    fn reads_actual_output_from_transfer_logs() {
        let token = Address::repeat_byte(0x02);
        let recipient = Address::repeat_byte(0xAA);
        let mut receipt = TransactionReceipt::default();
        receipt.logs = vec![
            // intermediate hop transfer to someone else
            transfer_log(token, Address::repeat_byte(0x77), U256::from(123u64)),
            transfer_log(token, recipient, U256::from(4_567u64)),
        ];
        assert_eq!(
            output_from_receipt(&receipt, token, recipient),
            Some(U256::from(4_567u64))
        );
        // a different output token finds nothing
        assert_eq!(
            output_from_receipt(&receipt, Address::repeat_byte(0x03), recipient),
            None
        );
    }
}
