// src/rpc_pool.rs

use crate::settings::Settings;
use anyhow::{anyhow, Result};
use ethers::prelude::{Http, Provider};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct ProviderStatus {
    provider: Arc<Provider<Http>>,
    url: String,
    backoff_until: Mutex<Instant>,
    limiter: DefaultDirectRateLimiter,
    semaphore: Arc<Semaphore>,
}

/// Round-robin pool of HTTP RPC providers.
///
/// Every component takes this pool by `Arc` reference; there is no ambient
/// global provider. Each provider carries its own rate limiter and
/// concurrency semaphore, and is skipped while in backoff after an error.
pub struct RpcPool {
    providers: Vec<ProviderStatus>,
    current_index: AtomicUsize,
    unhealthy_cooldown: Duration,
    rate_limit_backoff: Duration,
}

impl RpcPool {
    pub fn new(settings: &Settings) -> Result<Self> {
        let qps = NonZeroU32::new(settings.rpc.qps_limit.max(1)).unwrap_or(NonZeroU32::MIN);
        let mut providers = Vec::with_capacity(settings.rpc.http_urls.len());
        for url in &settings.rpc.http_urls {
            let provider = Provider::<Http>::try_from(url.as_str())
                .map_err(|e| anyhow!("invalid RPC url {url}: {e}"))?;
            providers.push(ProviderStatus {
                provider: Arc::new(provider),
                url: url.clone(),
                backoff_until: Mutex::new(Instant::now()),
                limiter: RateLimiter::direct(Quota::per_second(qps)),
                semaphore: Arc::new(Semaphore::new(settings.rpc.max_concurrent_per_provider)),
            });
        }
        if providers.is_empty() {
            return Err(anyhow!("no RPC providers configured"));
        }
        Ok(Self {
            providers,
            current_index: AtomicUsize::new(0),
            unhealthy_cooldown: Duration::from_secs(settings.rpc.unhealthy_cooldown_seconds),
            rate_limit_backoff: Duration::from_millis(settings.rpc.rate_limit_backoff_ms),
        })
    }

    /// Returns the next usable provider together with its concurrency permit.
    /// The permit must be held for the duration of the RPC call.
    pub async fn get_next_provider(&self) -> Result<(Arc<Provider<Http>>, OwnedSemaphorePermit)> {
        let n = self.providers.len();
        let start = self.current_index.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut idx = start % n;
        let mut found_ready = false;
        for offset in 0..n {
            let candidate = (start + offset) % n;
            let ready = *self.providers[candidate]
                .backoff_until
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                <= now;
            if ready {
                idx = candidate;
                found_ready = true;
                break;
            }
        }
        if !found_ready {
            warn!("all {n} RPC providers in backoff, using round-robin fallback");
        }

        let status = &self.providers[idx];
        status.limiter.until_ready().await;
        let permit = status
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| anyhow!("provider semaphore closed: {e}"))?;
        debug!("rpc: dispatching via {}", status.url);
        Ok((Arc::clone(&status.provider), permit))
    }

    /// Marks a provider unusable for the configured cooldown window.
    pub fn mark_as_unhealthy(&self, provider: &Arc<Provider<Http>>) {
        if let Some(status) = self.find(provider) {
            warn!("rpc: marking {} unhealthy for {:?}", status.url, self.unhealthy_cooldown);
            *status
                .backoff_until
                .lock()
                .unwrap_or_else(|p| p.into_inner()) = Instant::now() + self.unhealthy_cooldown;
        }
    }

    /// Short, jittered backoff after a 429-style response.
    pub fn report_rate_limit_error(&self, provider: &Arc<Provider<Http>>) {
        if let Some(status) = self.find(provider) {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
            let backoff = self.rate_limit_backoff + jitter;
            debug!("rpc: rate limited on {}, backing off {:?}", status.url, backoff);
            *status
                .backoff_until
                .lock()
                .unwrap_or_else(|p| p.into_inner()) = Instant::now() + backoff;
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    fn find(&self, provider: &Arc<Provider<Http>>) -> Option<&ProviderStatus> {
        self.providers
            .iter()
            .find(|s| Arc::ptr_eq(&s.provider, provider))
    }
}

/// Classifies provider errors the way the pool wants them reported back.
pub fn is_rate_limit_error(error: &impl std::fmt::Display) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("429")
        || message.contains("too many requests")
        || message.contains("limit exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Chain, Contracts, LogSettings, Rpc, Swap};
    use ethers::types::Address;

    fn test_settings(urls: &[&str]) -> Settings {
        Settings {
            rpc: Rpc {
                http_urls: urls.iter().map(|s| s.to_string()).collect(),
                qps_limit: 100,
                max_concurrent_per_provider: 4,
                unhealthy_cooldown_seconds: 30,
                rate_limit_backoff_ms: 100,
            },
            chain: Chain { chain_id: 42161 },
            contracts: Contracts {
                factory: Address::zero(),
                quoter: Address::zero(),
                router: Address::zero(),
                wrapped_native: Address::zero(),
                fee_collector: Address::zero(),
            },
            swap: Swap::default(),
            log: LogSettings::default(),
        }
    }

    #[tokio::test]
    async fn rotates_between_providers() {
        let pool =
            RpcPool::new(&test_settings(&["http://127.0.0.1:8545", "http://127.0.0.1:8546"]))
                .unwrap();
        let (first, _p1) = pool.get_next_provider().await.unwrap();
        let (second, _p2) = pool.get_next_provider().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn skips_unhealthy_provider() {
        let pool =
            RpcPool::new(&test_settings(&["http://127.0.0.1:8545", "http://127.0.0.1:8546"]))
                .unwrap();
        let (first, _p) = pool.get_next_provider().await.unwrap();
        pool.mark_as_unhealthy(&first);
        for _ in 0..4 {
            let (next, _p) = pool.get_next_provider().await.unwrap();
            assert!(!Arc::ptr_eq(&first, &next));
        }
    }

    #[test]
    fn refuses_empty_provider_list() {
        assert!(RpcPool::new(&test_settings(&[])).is_err());
    }

    #[test]
    fn classifies_rate_limit_messages() {
        assert!(is_rate_limit_error(&"HTTP 429 Too Many Requests"));
        assert!(is_rate_limit_error(&"daily limit exceeded"));
        assert!(!is_rate_limit_error(&"connection refused"));
    }
}
