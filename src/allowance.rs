use crate::contracts::Erc20;
use crate::errors::SwapError;
use crate::rpc_pool::RpcPool;
use crate::signer::TransactionSigner;
use crate::utils::{receipt_succeeded, wait_for_receipt};
use anyhow::anyhow;
use ethers::types::{Address, TxHash, U256};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// True iff the current allowance is strictly below the amount being pulled
/// into the router. The comparison always uses the pre-fee input amount;
/// the protocol fee is taken from the *output* and never reduces what the
/// router transfers in.
pub fn needs_approval_amount(allowance: U256, amount_in: U256) -> bool {
    allowance < amount_in
}

/// Checks and raises ERC-20 spending allowance for the router.
pub struct AllowanceManager {
    router: Address,
    rpc_pool: Arc<RpcPool>,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl AllowanceManager {
    pub fn new(
        router: Address,
        rpc_pool: Arc<RpcPool>,
        receipt_poll: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            router,
            rpc_pool,
            receipt_poll,
            receipt_timeout,
        }
    }

    /// Re-reads the allowance on-chain on every call. Allowance is externally
    /// mutable state; it is never cached between swap attempts.
    pub async fn needs_approval(
        &self,
        token: Address,
        owner: Address,
        amount_in: U256,
    ) -> Result<bool, SwapError> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let erc20 = Erc20::new(token, provider);
        let allowance = erc20
            .allowance(owner, self.router)
            .call()
            .await
            .map_err(|e| SwapError::Rpc(anyhow!("allowance read failed for {token:?}: {e}")))?;
        Ok(needs_approval_amount(allowance, amount_in))
    }

    /// Sets an unlimited (max uint) allowance for the router and waits for
    /// the receipt. The swap that follows depends on this state being
    /// settled on-chain, so confirmation is not optional.
    pub async fn approve(
        &self,
        signer: &dyn TransactionSigner,
        wallet_id: &str,
        token: Address,
    ) -> Result<TxHash, SwapError> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let erc20 = Erc20::new(token, Arc::clone(&provider));
        let tx = erc20.approve(self.router, U256::MAX).tx;

        let hash = signer
            .sign_and_submit(wallet_id, tx)
            .await
            .map_err(|e| SwapError::ApprovalFailed(e.to_string()))?;
        info!("approval submitted for {token:?}: {hash:?}");

        let receipt = wait_for_receipt(&provider, hash, self.receipt_poll, self.receipt_timeout)
            .await
            .map_err(|e| SwapError::ApprovalFailed(e.to_string()))?;
        if !receipt_succeeded(&receipt) {
            return Err(SwapError::ApprovalFailed(format!(
                "approval {hash:?} reverted on-chain"
            )));
        }
        info!("approval confirmed for {token:?} in block {:?}", receipt.block_number);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_threshold_is_strict() {
        let amount = U256::from(100u64);
        assert!(needs_approval_amount(U256::from(50u64), amount));
        assert!(needs_approval_amount(U256::from(99u64), amount));
        assert!(!needs_approval_amount(U256::from(100u64), amount));
        assert!(!needs_approval_amount(U256::MAX, amount));
    }

    #[test]
    fn max_allowance_covers_any_future_amount() {
        // After an unlimited approval no conceivable amount re-triggers it.
        assert!(!needs_approval_amount(U256::MAX, U256::MAX));
        assert!(!needs_approval_amount(U256::MAX, U256::exp10(30)));
    }
}
