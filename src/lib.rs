//! # Swap Router SDK
//!
//! Swap routing and execution engine for concentrated-liquidity AMMs. Given
//! a token pair and an input amount, the engine discovers a liquid path
//! across the AMM's fee tiers, obtains a live simulated price quote, and
//! builds a slippage-bounded, atomically-executed transaction — including
//! wrap/unwrap of the chain's native asset and a post-trade protocol fee
//! skim.
//!
//! ## Overview
//!
//! The engine separates read-only discovery from stateful execution:
//!
//! - **Routing**: direct pools preferred over two-hop paths through the
//!   wrapped-native base asset; greedy first-match over the fixed fee-tier
//!   set, not price-optimal.
//! - **Quoting**: non-broadcast simulations across every fee tier for
//!   direct routes, keeping the best-priced one.
//! - **Execution**: single router call, or an atomic multicall batch
//!   whenever native wrap/unwrap is involved, guarded by a minimum-output
//!   bound and a deadline.
//! - **Fees**: best-effort post-swap skim from the output token that never
//!   affects the swap's own outcome.
//!
//! Key custody is external: the engine hands fully-built transactions to a
//! [`signer::TransactionSigner`] collaborator and observes receipts itself.

// Core Types
/// Token model and base-unit amount handling
pub mod tokens;
/// Swap error taxonomy
pub mod errors;

// Routing & Quoting
/// Pool resolution through the AMM factory
pub mod pool_locator;
/// Fee tiers, routes, and the greedy route search
pub mod route_finder;
/// Simulated price quoting across fee tiers
pub mod quote_engine;
/// Packed byte codec for multi-hop paths
pub mod path;

// Execution
/// Allowance checks and unlimited approvals
pub mod allowance;
/// Swap transaction planning and assembly
pub mod execution;
/// Post-swap protocol fee skim
pub mod fees;
/// External signing collaborator
pub mod signer;
/// End-to-end orchestration
pub mod engine;

// Infrastructure
/// RPC provider pool with round-robin and health tracking
pub mod rpc_pool;
/// Smart contract ABIs
pub mod contracts;
/// Configuration management
pub mod settings;
/// Shared helpers (clock, receipts)
pub mod utils;

// Re-exports for convenience
pub use engine::{SwapEngine, SwapOutcome};
pub use errors::SwapError;
pub use execution::SwapRequest;
pub use pool_locator::{Pool, PoolLocator};
pub use quote_engine::Quote;
pub use route_finder::{FeeTier, Route, RouteKind};
pub use rpc_pool::RpcPool;
pub use settings::Settings;
pub use signer::TransactionSigner;
pub use tokens::Token;
