use crate::contracts::{IAmmFactory, IAmmPool};
use crate::route_finder::{FeeTier, PoolProbe};
use crate::rpc_pool::{is_rate_limit_error, RpcPool};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::Address;
use log::{debug, warn};
use std::sync::Arc;

/// A resolved pool. Existence and liquidity are independent facts: a pool
/// can exist with `has_liquidity == false` and is then unusable for routing,
/// which is not the same as the pool being absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub token0: Address,
    pub token1: Address,
    pub fee: FeeTier,
    pub address: Address,
    pub has_liquidity: bool,
}

/// Resolves pools through the AMM factory and checks their liquidity.
pub struct PoolLocator {
    factory: Address,
    rpc_pool: Arc<RpcPool>,
}

impl PoolLocator {
    pub fn new(factory: Address, rpc_pool: Arc<RpcPool>) -> Self {
        Self { factory, rpc_pool }
    }

    /// Looks up the pool for a pair at the given tier.
    ///
    /// The factory indexes pools by canonical `(token0, token1)` order, so
    /// the addresses are sorted before the query; passing them unsorted
    /// risks a false negative. A zero result address means no pool.
    pub async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: FeeTier,
    ) -> Result<Option<Address>> {
        let (token0, token1) = sort_addresses(token_a, token_b);
        let (provider, _permit) = self.rpc_pool.get_next_provider().await?;
        let factory = IAmmFactory::new(self.factory, Arc::clone(&provider));
        match factory.get_pool(token0, token1, fee.as_u32()).call().await {
            Ok(pool) if pool != Address::zero() => Ok(Some(pool)),
            Ok(_) => Ok(None),
            Err(e) => {
                if is_rate_limit_error(&e) {
                    self.rpc_pool.report_rate_limit_error(&provider);
                } else {
                    self.rpc_pool.mark_as_unhealthy(&provider);
                }
                Err(anyhow!("factory getPool({token0:?}, {token1:?}, {fee}) failed: {e}"))
            }
        }
    }

    /// Resolves the full pool record for a pair at the given tier.
    pub async fn find_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: FeeTier,
    ) -> Result<Option<Pool>> {
        let address = match self.get_pool(token_a, token_b, fee).await? {
            Some(address) => address,
            None => return Ok(None),
        };
        let (token0, token1) = sort_addresses(token_a, token_b);
        let has_liquidity = self.has_liquidity(address).await;
        Ok(Some(Pool {
            token0,
            token1,
            fee,
            address,
            has_liquidity,
        }))
    }

    /// True when the pool currently holds nonzero liquidity.
    ///
    /// Existence and liquidity are independent facts; a pool can exist with
    /// zero liquidity and is then unusable. Any read failure is treated as
    /// "no liquidity" (fail-closed), never propagated.
    pub async fn has_liquidity(&self, pool: Address) -> bool {
        let (provider, _permit) = match self.rpc_pool.get_next_provider().await {
            Ok(p) => p,
            Err(e) => {
                warn!("pool {pool:?}: no provider for liquidity check: {e}");
                return false;
            }
        };
        let contract = IAmmPool::new(pool, provider);
        match contract.liquidity().call().await {
            Ok(liquidity) => liquidity > 0,
            Err(e) => {
                debug!("pool {pool:?}: liquidity read failed, treating as empty: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl PoolProbe for PoolLocator {
    async fn liquid_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: FeeTier,
    ) -> Option<Address> {
        match self.find_pool(token_a, token_b, fee).await {
            Ok(Some(pool)) if pool.has_liquidity => Some(pool.address),
            Ok(_) => None,
            Err(e) => {
                debug!("pool lookup failed at tier {fee}: {e}");
                None
            }
        }
    }
}

fn sort_addresses(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_addresses_canonically() {
        let low = Address::repeat_byte(0x01);
        let high = Address::repeat_byte(0xFF);
        assert_eq!(sort_addresses(low, high), (low, high));
        assert_eq!(sort_addresses(high, low), (low, high));
    }
}
