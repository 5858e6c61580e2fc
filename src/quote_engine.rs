//! Live price quoting over simulated (non-broadcast) calls.
//!
//! Direct routes re-probe *every* fee tier and keep the best-priced one;
//! tiers whose simulation reverts are unusable, not fatal. Two-hop routes
//! are quoted against exactly the tier pair the route search settled on.

use crate::contracts::{QuoteExactInputSingleParams, QuoterV2};
use crate::errors::SwapError;
use crate::path::encode_path;
use crate::route_finder::{FeeTier, Route, RouteKind};
use crate::rpc_pool::{is_rate_limit_error, RpcPool};
use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::types::{Address, Bytes, U256};
use futures::future::join_all;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A priced route. `amount_out` is in integer base units of the output token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub route: Route,
    pub amount_out: U256,
    /// For direct routes: the tier that produced the best simulated price,
    /// which may differ from the route's nominal (feasibility) tier. `None`
    /// for two-hop routes, which are quoted at their fixed tier pair.
    pub priced_fee: Option<FeeTier>,
}

/// Simulation seam for quote lookups.
///
/// Implementations issue read-only calls; a reverted simulation reads as
/// `None` ("tier unusable"), never as an error.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn simulate_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
    ) -> Option<U256>;

    async fn simulate_path(&self, path: Bytes, amount_in: U256) -> Option<U256>;
}

/// Quotes a route for `amount_in` base units of its input token.
pub async fn quote_route(
    source: &dyn QuoteSource,
    route: &Route,
    amount_in: U256,
) -> Result<Quote, SwapError> {
    match route.kind {
        RouteKind::Direct => {
            let token_in = route.token_in().address;
            let token_out = route.token_out().address;
            let (fee, amount_out) = best_direct_tier(source, token_in, token_out, amount_in)
                .await
                .ok_or_else(|| {
                    SwapError::QuoteFailed(format!(
                        "every tier simulation reverted for {} -> {}",
                        route.token_in().symbol,
                        route.token_out().symbol
                    ))
                })?;
            Ok(Quote {
                route: route.clone(),
                amount_out,
                priced_fee: Some(fee),
            })
        }
        RouteKind::TwoHop => {
            let path = encode_path(&route.path, &route.fees).map_err(SwapError::Rpc)?;
            let amount_out = source
                .simulate_path(path, amount_in)
                .await
                .ok_or_else(|| {
                    SwapError::QuoteFailed(format!(
                        "path simulation reverted for {} -> {} -> {}",
                        route.path[0].symbol, route.path[1].symbol, route.path[2].symbol
                    ))
                })?;
            Ok(Quote {
                route: route.clone(),
                amount_out,
                priced_fee: None,
            })
        }
    }
}

/// Probes every tier concurrently and reduces to the maximum output.
///
/// The reduction is a deterministic max-by over results in the canonical
/// enumeration order: a strictly greater output wins, so ties keep the
/// earliest tier. Reverted tiers are filtered out beforehand.
async fn best_direct_tier(
    source: &dyn QuoteSource,
    token_in: Address,
    token_out: Address,
    amount_in: U256,
) -> Option<(FeeTier, U256)> {
    let probes = FeeTier::ALL.iter().map(|fee| async move {
        source
            .simulate_single(token_in, token_out, *fee, amount_in)
            .await
            .map(|out| (*fee, out))
    });
    let mut best: Option<(FeeTier, U256)> = None;
    for candidate in join_all(probes).await.into_iter().flatten() {
        match best {
            Some((_, out)) if candidate.1 <= out => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// [`QuoteSource`] backed by the on-chain quoter contract.
///
/// All calls are issued as `eth_call` simulations, never broadcast; the
/// quoter's methods are declared non-view by the AMM precisely so that
/// simulating them yields the swap math result.
pub struct QuoterClient {
    quoter: Address,
    rpc_pool: Arc<RpcPool>,
}

impl QuoterClient {
    pub fn new(quoter: Address, rpc_pool: Arc<RpcPool>) -> Self {
        Self { quoter, rpc_pool }
    }
}

#[async_trait]
impl QuoteSource for QuoterClient {
    async fn simulate_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: FeeTier,
        amount_in: U256,
    ) -> Option<U256> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await.ok()?;
        let quoter = QuoterV2::new(self.quoter, Arc::clone(&provider));
        let params = QuoteExactInputSingleParams {
            token_in,
            token_out,
            amount_in,
            fee: fee.as_u32(),
            sqrt_price_limit_x96: U256::zero(),
        };
        match quoter.quote_exact_input_single(params).call().await {
            Ok((amount_out, _sqrt_price_after, _ticks_crossed, _gas_estimate)) => Some(amount_out),
            Err(ContractError::Revert(_)) => {
                debug!("quote: tier {fee} reverted for {token_in:?} -> {token_out:?}");
                None
            }
            Err(e) => {
                if is_rate_limit_error(&e) {
                    self.rpc_pool.report_rate_limit_error(&provider);
                } else {
                    self.rpc_pool.mark_as_unhealthy(&provider);
                }
                debug!("quote: tier {fee} failed: {e}");
                None
            }
        }
    }

    async fn simulate_path(&self, path: Bytes, amount_in: U256) -> Option<U256> {
        let (provider, _permit) = self.rpc_pool.get_next_provider().await.ok()?;
        let quoter = QuoterV2::new(self.quoter, Arc::clone(&provider));
        match quoter.quote_exact_input(path, amount_in).call().await {
            Ok((amount_out, _prices, _ticks, _gas_estimate)) => Some(amount_out),
            Err(ContractError::Revert(_)) => {
                debug!("quote: path simulation reverted");
                None
            }
            Err(e) => {
                if is_rate_limit_error(&e) {
                    self.rpc_pool.report_rate_limit_error(&provider);
                } else {
                    self.rpc_pool.mark_as_unhealthy(&provider);
                }
                debug!("quote: path simulation failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Token;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        per_tier: HashMap<u32, U256>,
        path_out: Option<U256>,
        single_calls: AtomicUsize,
        path_calls: AtomicUsize,
    }

    impl StubSource {
        fn tiers(entries: &[(u32, u64)]) -> Self {
            Self {
                per_tier: entries
                    .iter()
                    .map(|(fee, out)| (*fee, U256::from(*out)))
                    .collect(),
                path_out: None,
                single_calls: AtomicUsize::new(0),
                path_calls: AtomicUsize::new(0),
            }
        }

        fn path(out: Option<u64>) -> Self {
            Self {
                per_tier: HashMap::new(),
                path_out: out.map(U256::from),
                single_calls: AtomicUsize::new(0),
                path_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuoteSource for StubSource {
        async fn simulate_single(
            &self,
            _token_in: Address,
            _token_out: Address,
            fee: FeeTier,
            _amount_in: U256,
        ) -> Option<U256> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            self.per_tier.get(&fee.as_u32()).copied()
        }

        async fn simulate_path(&self, _path: Bytes, _amount_in: U256) -> Option<U256> {
            self.path_calls.fetch_add(1, Ordering::SeqCst);
            self.path_out
        }
    }

    fn token(byte: u8, symbol: &str) -> Token {
        Token::erc20(Address::repeat_byte(byte), 18, symbol)
    }

    fn direct_route() -> Route {
        Route::direct(token(0x01, "AAA"), token(0x02, "BBB"), FeeTier::Medium)
    }

    fn two_hop_route() -> Route {
        Route::two_hop(
            token(0x01, "AAA"),
            token(0xEE, "WETH"),
            token(0x02, "BBB"),
            FeeTier::Low,
            FeeTier::Medium,
        )
    }

    #[tokio::test]
    async fn direct_quote_takes_maximum_over_usable_tiers() {
        // Tier 100 reverts (absent), 3000 beats the nominal route tier's price.
        let source = StubSource::tiers(&[(500, 90), (3_000, 120), (10_000, 70)]);
        let quote = quote_route(&source, &direct_route(), U256::from(1_000u64))
            .await
            .unwrap();
        assert_eq!(quote.amount_out, U256::from(120u64));
        assert_eq!(quote.priced_fee, Some(FeeTier::Medium));
        assert_eq!(source.single_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn direct_quote_ties_keep_earliest_tier() {
        let source = StubSource::tiers(&[(500, 100), (3_000, 100)]);
        let quote = quote_route(&source, &direct_route(), U256::from(1_000u64))
            .await
            .unwrap();
        assert_eq!(quote.priced_fee, Some(FeeTier::Low));
    }

    #[tokio::test]
    async fn direct_quote_fails_when_every_tier_reverts() {
        let source = StubSource::tiers(&[]);
        let err = quote_route(&source, &direct_route(), U256::from(1_000u64))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::QuoteFailed(_)));
    }

    #[tokio::test]
    async fn two_hop_quotes_fixed_pair_without_tier_search() {
        let source = StubSource::path(Some(777));
        let quote = quote_route(&source, &two_hop_route(), U256::from(1_000u64))
            .await
            .unwrap();
        assert_eq!(quote.amount_out, U256::from(777u64));
        assert_eq!(quote.priced_fee, None);
        assert_eq!(source.single_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.path_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn two_hop_revert_is_quote_failure() {
        let source = StubSource::path(None);
        let err = quote_route(&source, &two_hop_route(), U256::from(1_000u64))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::QuoteFailed(_)));
    }
}
