//! Swap transaction construction.
//!
//! Planning is split from assembly: [`ExecutionBuilder::plan`] decides the
//! call sequence (wrap, swap, unwrap, refund) and the slippage-bounded
//! minimum output, [`ExecutionBuilder::assemble`] turns the plan into a
//! single transaction. Any plan touching native wrap/unwrap is submitted
//! through the router's `multicall`, so a mid-sequence failure reverts the
//! entire batch — there is no state where the wrap succeeded but the swap
//! did not.

use crate::contracts::{ExactInputParams, ExactInputSingleParams, SwapRouter};
use crate::errors::SwapError;
use crate::path::encode_path;
use crate::quote_engine::Quote;
use crate::route_finder::{FeeTier, PoolProbe, RouteKind};
use crate::tokens::Token;
use crate::utils::now_epoch_seconds;
use anyhow::anyhow;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, U256, U512};
use log::debug;
use std::sync::Arc;

pub const BPS_DENOMINATOR: u32 = 10_000;

/// One user-initiated swap. Immutable once submitted; a changed amount or
/// token pair is a new request, never an edit of an in-flight one.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in: U256,
    pub slippage_bps: u32,
    pub deadline: U256,
    pub recipient: Address,
}

impl SwapRequest {
    pub fn new(
        token_in: Token,
        token_out: Token,
        amount_in: U256,
        slippage_bps: u32,
        recipient: Address,
        deadline_seconds: u64,
    ) -> Self {
        Self {
            token_in,
            token_out,
            amount_in,
            slippage_bps,
            deadline: U256::from(now_epoch_seconds() + deadline_seconds),
            recipient,
        }
    }
}

/// `floor(amount_out * (10000 - slippage_bps) / 10000)` in pure integer
/// arithmetic. Never negative, never above `amount_out`; slippage beyond
/// 100% clamps to zero output.
pub fn compute_min_out(amount_out: U256, slippage_bps: u32) -> U256 {
    let keep_bps = BPS_DENOMINATOR - slippage_bps.min(BPS_DENOMINATOR);
    let scaled = amount_out.full_mul(U256::from(keep_bps)) / U512::from(BPS_DENOMINATOR);
    // keep_bps <= 10000, so the result always fits back into U256
    U256::try_from(scaled).unwrap_or(amount_out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStep {
    WrapNative {
        amount: U256,
    },
    ExactInputSingle {
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        recipient: Address,
        amount_in: U256,
        min_out: U256,
    },
    ExactInput {
        path: Bytes,
        recipient: Address,
        amount_in: U256,
        min_out: U256,
    },
    UnwrapNative {
        min_out: U256,
        recipient: Address,
    },
    RefundNative,
}

/// Ordered call sequence plus the native value attached to the transaction.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub steps: Vec<ExecutionStep>,
    pub value: U256,
    pub deadline: U256,
    pub min_out: U256,
}

impl ExecutionPlan {
    /// Multi-step plans are executed atomically via the router multicall.
    pub fn is_batch(&self) -> bool {
        self.steps.len() > 1
    }
}

pub struct ExecutionBuilder {
    router: Address,
}

impl ExecutionBuilder {
    pub fn new(router: Address) -> Self {
        Self { router }
    }

    /// Plans the execution call sequence for a confirmed quote.
    ///
    /// For direct routes the execution tier is re-derived here as the first
    /// liquid tier in ascending scan. It can differ from the tier the quote
    /// priced best (`Quote::priced_fee`); the trade may then settle at a
    /// worse price than shown. This divergence is a preserved property of
    /// the engine's design, not an oversight of this function.
    pub async fn plan(
        &self,
        probe: &dyn PoolProbe,
        quote: &Quote,
        request: &SwapRequest,
    ) -> Result<ExecutionPlan, SwapError> {
        let route = &quote.route;
        let is_from_native = request.token_in.is_native;
        let is_to_native = request.token_out.is_native;
        let min_out = compute_min_out(quote.amount_out, request.slippage_bps);

        let mut steps = Vec::with_capacity(4);
        if is_from_native {
            steps.push(ExecutionStep::WrapNative {
                amount: request.amount_in,
            });
        }

        // When the output must be unwrapped, the swap pays the router and the
        // unwrap step forwards native funds to the user.
        let swap_recipient = if is_to_native {
            self.router
        } else {
            request.recipient
        };

        match route.kind {
            RouteKind::Direct => {
                let token_in = route.token_in().address;
                let token_out = route.token_out().address;
                let mut exec_fee = None;
                for fee in FeeTier::ALL {
                    if probe.liquid_pool(token_in, token_out, fee).await.is_some() {
                        exec_fee = Some(fee);
                        break;
                    }
                }
                let fee = exec_fee.ok_or_else(|| SwapError::NoRouteFound {
                    token_in: route.token_in().symbol.clone(),
                    token_out: route.token_out().symbol.clone(),
                })?;
                if quote.priced_fee.is_some() && quote.priced_fee != Some(fee) {
                    debug!(
                        "execution tier {} differs from quoted tier {}",
                        fee,
                        quote.priced_fee.map(|f| f.as_u32()).unwrap_or_default()
                    );
                }
                steps.push(ExecutionStep::ExactInputSingle {
                    token_in,
                    token_out,
                    fee,
                    recipient: swap_recipient,
                    amount_in: request.amount_in,
                    min_out,
                });
            }
            RouteKind::TwoHop => {
                let path = encode_path(&route.path, &route.fees).map_err(SwapError::Rpc)?;
                debug!("execution path: 0x{}", hex::encode(&path));
                steps.push(ExecutionStep::ExactInput {
                    path,
                    recipient: swap_recipient,
                    amount_in: request.amount_in,
                    min_out,
                });
            }
        }

        if is_to_native {
            steps.push(ExecutionStep::UnwrapNative {
                min_out,
                recipient: request.recipient,
            });
        }
        if is_from_native {
            steps.push(ExecutionStep::RefundNative);
        }

        Ok(ExecutionPlan {
            steps,
            value: if is_from_native {
                request.amount_in
            } else {
                U256::zero()
            },
            deadline: request.deadline,
            min_out,
        })
    }

    /// Assembles a plan into one transaction ready for signing.
    ///
    /// Single-step plans become a bare router call; anything longer goes
    /// through `multicall(deadline, calls)` and executes atomically.
    pub fn assemble(
        &self,
        provider: Arc<Provider<Http>>,
        plan: &ExecutionPlan,
    ) -> Result<TypedTransaction, SwapError> {
        let router = SwapRouter::new(self.router, provider);
        let mut calldatas: Vec<Bytes> = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let data = match step {
                ExecutionStep::WrapNative { amount } => router.wrap_native(*amount).calldata(),
                ExecutionStep::ExactInputSingle {
                    token_in,
                    token_out,
                    fee,
                    recipient,
                    amount_in,
                    min_out,
                } => router
                    .exact_input_single(ExactInputSingleParams {
                        token_in: *token_in,
                        token_out: *token_out,
                        fee: fee.as_u32(),
                        recipient: *recipient,
                        deadline: plan.deadline,
                        amount_in: *amount_in,
                        amount_out_minimum: *min_out,
                        sqrt_price_limit_x96: U256::zero(),
                    })
                    .calldata(),
                ExecutionStep::ExactInput {
                    path,
                    recipient,
                    amount_in,
                    min_out,
                } => router
                    .exact_input(ExactInputParams {
                        path: path.clone(),
                        recipient: *recipient,
                        deadline: plan.deadline,
                        amount_in: *amount_in,
                        amount_out_minimum: *min_out,
                    })
                    .calldata(),
                ExecutionStep::UnwrapNative { min_out, recipient } => {
                    router.unwrap_native(*min_out, *recipient).calldata()
                }
                ExecutionStep::RefundNative => router.refund_native().calldata(),
            }
            .ok_or_else(|| SwapError::Rpc(anyhow!("failed to encode router call data")))?;
            calldatas.push(data);
        }

        let mut tx: TypedTransaction = if calldatas.len() == 1 {
            TransactionRequest {
                to: Some(self.router.into()),
                data: Some(calldatas.remove(0)),
                ..Default::default()
            }
            .into()
        } else {
            router.multicall(plan.deadline, calldatas).tx
        };
        if !plan.value.is_zero() {
            tx.set_value(plan.value);
        }
        Ok(tx)
    }
}
