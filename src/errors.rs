use thiserror::Error;

/// Failure taxonomy for the swap pipeline.
///
/// Every variant except `Rpc` maps to a user-visible terminal outcome of a
/// swap attempt. Fee-collection failures are deliberately absent: the fee
/// skim runs after the swap has settled on-chain and its errors are recorded
/// on [`crate::engine::SwapOutcome`] instead of being propagated.
#[derive(Debug, Error)]
pub enum SwapError {
    /// No liquid pool across any fee tier, direct or via the base asset.
    #[error("no liquid route between {token_in} and {token_out}")]
    NoRouteFound { token_in: String, token_out: String },

    /// Every quote simulation reverted for the candidate route.
    #[error("quote failed: {0}")]
    QuoteFailed(String),

    /// The approval transaction was rejected, reverted, or never confirmed.
    #[error("approval failed: {0}")]
    ApprovalFailed(String),

    /// Client-side pre-check: wallet cannot cover amount (plus gas, for native).
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// The swap transaction reverted on-chain (slippage bound, deadline, ...).
    #[error("swap reverted: {0}")]
    SwapReverted(String),

    /// Infrastructure failure surfaced from the provider layer.
    #[error(transparent)]
    Rpc(#[from] anyhow::Error),
}
