//! Route discovery over the AMM's fee-tier grid.
//!
//! The search is greedy first-match, not price-optimal: it returns *a*
//! feasible route, preferring direct pools over two-hop paths, and relies on
//! the fixed ascending tier order for tie-breaking. That ordering is a
//! documented design property of the engine, not an optimization target.

use crate::errors::SwapError;
use crate::tokens::Token;
use async_trait::async_trait;
use ethers::types::Address;
use futures::future::join_all;
use log::debug;
use serde::{Deserialize, Serialize};

/// Pool fee tier in hundredths of a basis point.
///
/// The set is closed; `ALL` fixes the canonical ascending enumeration order
/// that routing and quoting tie-breaks depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeeTier {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub const ALL: [FeeTier; 4] = [FeeTier::Lowest, FeeTier::Low, FeeTier::Medium, FeeTier::High];

    pub fn as_u32(self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3_000,
            FeeTier::High => 10_000,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            100 => Some(FeeTier::Lowest),
            500 => Some(FeeTier::Low),
            3_000 => Some(FeeTier::Medium),
            10_000 => Some(FeeTier::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    Direct,
    TwoHop,
}

/// A feasible path between two tokens. `path` holds pool-form tokens (native
/// already substituted with the wrapped asset); `path.len() == fees.len() + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub kind: RouteKind,
    pub path: Vec<Token>,
    pub fees: Vec<FeeTier>,
}

impl Route {
    pub fn direct(token_in: Token, token_out: Token, fee: FeeTier) -> Self {
        Self {
            kind: RouteKind::Direct,
            path: vec![token_in, token_out],
            fees: vec![fee],
        }
    }

    pub fn two_hop(
        token_in: Token,
        base: Token,
        token_out: Token,
        fee1: FeeTier,
        fee2: FeeTier,
    ) -> Self {
        Self {
            kind: RouteKind::TwoHop,
            path: vec![token_in, base, token_out],
            fees: vec![fee1, fee2],
        }
    }

    pub fn token_in(&self) -> &Token {
        &self.path[0]
    }

    pub fn token_out(&self) -> &Token {
        &self.path[self.path.len() - 1]
    }
}

/// Pool lookup seam used by the route search.
///
/// Returns the pool address only when the pool exists *and* currently holds
/// nonzero liquidity; lookup failures surface as `None` (fail-closed), never
/// as errors.
#[async_trait]
pub trait PoolProbe: Send + Sync {
    async fn liquid_pool(&self, token_a: Address, token_b: Address, fee: FeeTier)
        -> Option<Address>;
}

pub struct RouteFinder {
    /// The single multihop intermediate (wrapped-native), in pool form.
    base: Token,
}

impl RouteFinder {
    pub fn new(base: Token) -> Self {
        Self { base }
    }

    /// Finds a feasible route, in strict preference order:
    ///
    /// 1. the first liquid direct pool, scanning tiers ascending;
    /// 2. the first `(fee1, fee2)` combination (outer × inner over the same
    ///    tier set) with both hops liquid through the base asset;
    /// 3. otherwise [`SwapError::NoRouteFound`].
    ///
    /// Tier probes are independent reads and run concurrently; the result is
    /// still selected in enumeration order.
    pub async fn find_route(
        &self,
        probe: &dyn PoolProbe,
        token_in: &Token,
        token_out: &Token,
    ) -> Result<Route, SwapError> {
        let t_in = token_in.for_pools(self.base.address);
        let t_out = token_out.for_pools(self.base.address);
        if t_in.address == t_out.address {
            return Err(self.no_route(token_in, token_out));
        }

        if let Some(fee) = self.first_liquid_tier(probe, t_in.address, t_out.address).await {
            debug!("route: direct {} -> {} at tier {}", t_in.symbol, t_out.symbol, fee);
            return Ok(Route::direct(t_in, t_out, fee));
        }

        // Two-hop is only attempted through the one configured base asset.
        if t_in.address != self.base.address && t_out.address != self.base.address {
            let hop1 = self.liquid_tiers(probe, t_in.address, self.base.address).await;
            let hop2 = self.liquid_tiers(probe, self.base.address, t_out.address).await;
            // fee1 outer x fee2 inner: the pools are independent per hop, so
            // the first workable combination is (first liquid fee1, first
            // liquid fee2).
            if let (Some(&fee1), Some(&fee2)) = (hop1.first(), hop2.first()) {
                debug!(
                    "route: two-hop {} -> {} -> {} at tiers {}/{}",
                    t_in.symbol, self.base.symbol, t_out.symbol, fee1, fee2
                );
                return Ok(Route::two_hop(t_in, self.base.clone(), t_out, fee1, fee2));
            }
        }

        Err(self.no_route(token_in, token_out))
    }

    /// First tier, in ascending order, whose pool for the pair is liquid.
    async fn first_liquid_tier(
        &self,
        probe: &dyn PoolProbe,
        token_a: Address,
        token_b: Address,
    ) -> Option<FeeTier> {
        self.liquid_tiers(probe, token_a, token_b).await.first().copied()
    }

    /// All liquid tiers for a pair, probed concurrently, in ascending order.
    async fn liquid_tiers(
        &self,
        probe: &dyn PoolProbe,
        token_a: Address,
        token_b: Address,
    ) -> Vec<FeeTier> {
        let probes = FeeTier::ALL
            .iter()
            .map(|fee| async move { probe.liquid_pool(token_a, token_b, *fee).await.map(|_| *fee) });
        join_all(probes)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    fn no_route(&self, token_in: &Token, token_out: &Token) -> SwapError {
        SwapError::NoRouteFound {
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StubProbe {
        pools: HashMap<(Address, Address, u32), Address>,
    }

    impl StubProbe {
        fn new(entries: &[(Address, Address, u32)]) -> Self {
            let mut pools = HashMap::new();
            for (i, (a, b, fee)) in entries.iter().enumerate() {
                let (t0, t1) = if a < b { (*a, *b) } else { (*b, *a) };
                pools.insert((t0, t1, *fee), Address::repeat_byte(0xB0 + i as u8));
            }
            Self { pools }
        }
    }

    #[async_trait]
    impl PoolProbe for StubProbe {
        async fn liquid_pool(
            &self,
            token_a: Address,
            token_b: Address,
            fee: FeeTier,
        ) -> Option<Address> {
            let (t0, t1) = if token_a < token_b {
                (token_a, token_b)
            } else {
                (token_b, token_a)
            };
            self.pools.get(&(t0, t1, fee.as_u32())).copied()
        }
    }

    fn wrapped() -> Address {
        Address::repeat_byte(0xEE)
    }

    fn token(byte: u8, symbol: &str) -> Token {
        Token::erc20(Address::repeat_byte(byte), 18, symbol)
    }

    fn base_token() -> Token {
        Token::erc20(wrapped(), 18, "WETH")
    }

    #[tokio::test]
    async fn direct_route_takes_first_liquid_tier() {
        let a = token(0x01, "AAA");
        let b = token(0x02, "BBB");
        let probe = StubProbe::new(&[
            (a.address, b.address, 3_000),
            (a.address, b.address, 10_000),
        ]);
        let route = RouteFinder::new(base_token())
            .find_route(&probe, &a, &b)
            .await
            .unwrap();
        assert_eq!(route.kind, RouteKind::Direct);
        assert_eq!(route.fees, vec![FeeTier::Medium]);
        assert_eq!(route.path.len(), route.fees.len() + 1);
    }

    #[tokio::test]
    async fn direct_always_beats_two_hop() {
        let a = token(0x01, "AAA");
        let b = token(0x02, "BBB");
        let probe = StubProbe::new(&[
            (a.address, b.address, 10_000),
            (a.address, wrapped(), 500),
            (wrapped(), b.address, 500),
        ]);
        let route = RouteFinder::new(base_token())
            .find_route(&probe, &a, &b)
            .await
            .unwrap();
        assert_eq!(route.kind, RouteKind::Direct);
    }

    #[tokio::test]
    async fn falls_back_to_two_hop_through_base() {
        let a = token(0x01, "AAA");
        let b = token(0x02, "BBB");
        let probe = StubProbe::new(&[
            (a.address, wrapped(), 500),
            (wrapped(), b.address, 3_000),
        ]);
        let route = RouteFinder::new(base_token())
            .find_route(&probe, &a, &b)
            .await
            .unwrap();
        assert_eq!(route.kind, RouteKind::TwoHop);
        assert_eq!(
            route.path.iter().map(|t| t.address).collect::<Vec<_>>(),
            vec![a.address, wrapped(), b.address]
        );
        assert_eq!(route.fees, vec![FeeTier::Low, FeeTier::Medium]);
    }

    #[tokio::test]
    async fn native_input_is_substituted_with_wrapped() {
        let native = Token::native("ETH", 18);
        let b = token(0x02, "BBB");
        let probe = StubProbe::new(&[(wrapped(), b.address, 3_000)]);
        let route = RouteFinder::new(base_token())
            .find_route(&probe, &native, &b)
            .await
            .unwrap();
        assert_eq!(route.kind, RouteKind::Direct);
        assert_eq!(route.token_in().address, wrapped());
    }

    #[tokio::test]
    async fn reports_no_route() {
        let a = token(0x01, "AAA");
        let b = token(0x02, "BBB");
        let probe = StubProbe::new(&[]);
        let err = RouteFinder::new(base_token())
            .find_route(&probe, &a, &b)
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NoRouteFound { .. }));
    }
}
