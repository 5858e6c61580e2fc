//! End-to-end swap orchestration.
//!
//! Wires the components together and drives the flow: route + quote
//! (read-only, superseded by newer requests) → balance pre-check →
//! allowance check/approve (receipt-awaited) → execution build → signer →
//! receipt → best-effort fee skim. Approval and swap on the same wallet are
//! strictly sequential; dropped or failed transactions are terminal, never
//! retried automatically.

use crate::allowance::AllowanceManager;
use crate::contracts::Erc20;
use crate::errors::SwapError;
use crate::execution::{ExecutionBuilder, SwapRequest};
use crate::fees::{output_from_receipt, FeeModule, FeeOutcome};
use crate::pool_locator::PoolLocator;
use crate::quote_engine::{quote_route, Quote, QuoterClient};
use crate::route_finder::RouteFinder;
use crate::rpc_pool::RpcPool;
use crate::settings::Settings;
use crate::signer::TransactionSigner;
use crate::tokens::Token;
use crate::utils::{receipt_succeeded, wait_for_receipt};
use anyhow::anyhow;
use ethers::providers::Middleware;
use ethers::types::{Address, TxHash, U256};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic generation counter for quote refreshes.
///
/// Each refresh begins a new generation; a response whose generation is no
/// longer current is discarded, never merged into newer state. Cancellation
/// is soft: the in-flight RPC completes and its result is dropped.
#[derive(Debug, Default)]
pub struct QuoteSequencer {
    current: AtomicU64,
}

impl QuoteSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current.load(Ordering::SeqCst) == generation
    }
}

/// Final report of a settled swap. `fee` is informational: a failed skim
/// appears here with its error recorded, while the swap itself stays
/// successful.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub tx_hash: TxHash,
    pub amount_out: U256,
    pub fee: FeeOutcome,
}

pub struct SwapEngine {
    settings: Arc<Settings>,
    rpc_pool: Arc<RpcPool>,
    locator: PoolLocator,
    finder: RouteFinder,
    quoter: QuoterClient,
    allowance: AllowanceManager,
    builder: ExecutionBuilder,
    fees: FeeModule,
    quotes: QuoteSequencer,
}

impl SwapEngine {
    pub fn new(settings: Arc<Settings>, rpc_pool: Arc<RpcPool>) -> Self {
        let contracts = &settings.contracts;
        let swap = &settings.swap;
        let receipt_poll = Duration::from_millis(swap.receipt_poll_ms);
        let receipt_timeout = Duration::from_secs(swap.receipt_timeout_seconds);
        let base = Token::erc20(
            contracts.wrapped_native,
            swap.native_decimals,
            format!("W{}", swap.native_symbol),
        );
        Self {
            locator: PoolLocator::new(contracts.factory, Arc::clone(&rpc_pool)),
            finder: RouteFinder::new(base),
            quoter: QuoterClient::new(contracts.quoter, Arc::clone(&rpc_pool)),
            allowance: AllowanceManager::new(
                contracts.router,
                Arc::clone(&rpc_pool),
                receipt_poll,
                receipt_timeout,
            ),
            builder: ExecutionBuilder::new(contracts.router),
            fees: FeeModule::new(
                contracts.fee_collector,
                swap.fee_percent,
                Arc::clone(&rpc_pool),
                receipt_poll,
                receipt_timeout,
            ),
            quotes: QuoteSequencer::new(),
            rpc_pool,
            settings,
        }
    }

    /// Builds an immutable request with the configured defaults. The
    /// deadline is stamped here, once, at `now + deadline_seconds`.
    pub fn new_request(
        &self,
        token_in: Token,
        token_out: Token,
        amount_in: U256,
        slippage_bps: Option<u32>,
        recipient: Address,
    ) -> SwapRequest {
        SwapRequest::new(
            token_in,
            token_out,
            amount_in,
            slippage_bps.unwrap_or(self.settings.swap.default_slippage_bps),
            recipient,
            self.settings.swap.deadline_seconds,
        )
    }

    /// Suggested debounce between UI-driven quote refreshes.
    pub fn quote_debounce(&self) -> Duration {
        Duration::from_millis(self.settings.swap.quote_debounce_ms)
    }

    /// Read-only route discovery plus price quote.
    ///
    /// Returns `Ok(None)` when a newer quote request superseded this one
    /// while its RPC calls were in flight; the stale result must not reach
    /// UI or execution state.
    pub async fn quote(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
    ) -> Result<Option<Quote>, SwapError> {
        let generation = self.quotes.begin();
        let route = self
            .finder
            .find_route(&self.locator, token_in, token_out)
            .await?;
        let quote = quote_route(&self.quoter, &route, amount_in).await?;
        if !self.quotes.is_current(generation) {
            debug!("quote generation {generation} superseded, discarding");
            return Ok(None);
        }
        Ok(Some(quote))
    }

    /// Executes a confirmed swap end-to-end.
    ///
    /// `request.recipient` doubles as the funding wallet address: balances
    /// and allowance are checked against it, and it receives the output.
    /// Each transaction (approval, swap, fee) is fully receipt-confirmed
    /// before the next dependent step.
    pub async fn swap(
        &self,
        signer: &dyn TransactionSigner,
        wallet_id: &str,
        request: &SwapRequest,
        quote: &Quote,
    ) -> Result<SwapOutcome, SwapError> {
        let owner = request.recipient;
        self.check_balance(owner, request).await?;

        if !request.token_in.is_native {
            let token_in = request.token_in.address;
            if self
                .allowance
                .needs_approval(token_in, owner, request.amount_in)
                .await?
            {
                info!("raising router allowance for {token_in:?}");
                self.allowance.approve(signer, wallet_id, token_in).await?;
            }
        }

        let plan = self.builder.plan(&self.locator, quote, request).await?;
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let tx = self.builder.assemble(Arc::clone(&provider), &plan)?;

        let tx_hash = signer
            .sign_and_submit(wallet_id, tx)
            .await
            .map_err(|e| SwapError::Rpc(anyhow!("swap submission failed: {e}")))?;
        info!(
            "swap submitted: {} {} -> {} ({tx_hash:?})",
            request.amount_in, request.token_in.symbol, request.token_out.symbol
        );

        let receipt = wait_for_receipt(
            &provider,
            tx_hash,
            Duration::from_millis(self.settings.swap.receipt_poll_ms),
            Duration::from_secs(self.settings.swap.receipt_timeout_seconds),
        )
        .await
        .map_err(|e| SwapError::SwapReverted(e.to_string()))?;
        if !receipt_succeeded(&receipt) {
            return Err(SwapError::SwapReverted(format!(
                "transaction {tx_hash:?} reverted on-chain (slippage bound or deadline exceeded)"
            )));
        }
        info!("swap mined in block {:?}", receipt.block_number);

        // Actual settled output where the receipt shows it; quoted amount as
        // fallback (native output arrives via unwrap, not a token transfer).
        let amount_out = if request.token_out.is_native {
            quote.amount_out
        } else {
            output_from_receipt(&receipt, request.token_out.address, request.recipient)
                .unwrap_or(quote.amount_out)
        };

        let fee = self
            .fees
            .collect(signer, wallet_id, &request.token_out, amount_out)
            .await;

        Ok(SwapOutcome {
            tx_hash,
            amount_out,
            fee,
        })
    }

    /// Client-side funds pre-check before any transaction is signed.
    async fn check_balance(&self, owner: Address, request: &SwapRequest) -> Result<(), SwapError> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let gas_reserve = U256::from(self.settings.swap.native_gas_reserve_wei);
        let native_balance = provider
            .get_balance(owner, None)
            .await
            .map_err(|e| SwapError::Rpc(anyhow!("native balance read failed: {e}")))?;

        if request.token_in.is_native {
            let required = request
                .amount_in
                .checked_add(gas_reserve)
                .ok_or_else(|| SwapError::InsufficientBalance("amount overflow".to_string()))?;
            if native_balance < required {
                return Err(SwapError::InsufficientBalance(format!(
                    "need {required} wei (amount + gas reserve), have {native_balance}"
                )));
            }
        } else {
            let erc20 = Erc20::new(request.token_in.address, Arc::clone(&provider));
            let token_balance = erc20
                .balance_of(owner)
                .call()
                .await
                .map_err(|e| SwapError::Rpc(anyhow!("token balance read failed: {e}")))?;
            if token_balance < request.amount_in {
                return Err(SwapError::InsufficientBalance(format!(
                    "need {} base units of {}, have {token_balance}",
                    request.amount_in, request.token_in.symbol
                )));
            }
            if native_balance < gas_reserve {
                return Err(SwapError::InsufficientBalance(format!(
                    "insufficient native balance for gas: have {native_balance} wei"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_supersede_strictly() {
        let quotes = QuoteSequencer::new();
        let first = quotes.begin();
        assert!(quotes.is_current(first));

        let second = quotes.begin();
        assert!(!quotes.is_current(first));
        assert!(quotes.is_current(second));
    }
}
