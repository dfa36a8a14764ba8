//! Provider failover control
//!
//! Routes discovery to the primary provider until a quota-exhaustion error
//! blocks it for a cooldown window, then serves the alternate. A primary
//! with no credential configured is skipped permanently.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::MarketDataProvider;

pub struct FailoverController {
    primary: Arc<dyn MarketDataProvider>,
    alternate: Arc<dyn MarketDataProvider>,
    blocked_until: Mutex<HashMap<&'static str, Instant>>,
    cooldown: Duration,
}

impl FailoverController {
    pub fn new(
        primary: Arc<dyn MarketDataProvider>,
        alternate: Arc<dyn MarketDataProvider>,
        cooldown: Duration,
    ) -> Self {
        if !primary.is_configured() {
            info!(
                provider = primary.name(),
                "primary provider has no credential, using alternate exclusively"
            );
        }
        Self {
            primary,
            alternate,
            blocked_until: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// The provider discovery should use right now
    pub fn active(&self) -> Arc<dyn MarketDataProvider> {
        self.active_at(Instant::now())
    }

    /// Routing decision at an explicit instant
    pub fn active_at(&self, now: Instant) -> Arc<dyn MarketDataProvider> {
        if !self.primary.is_configured() {
            return self.alternate.clone();
        }
        if self.is_blocked_at(self.primary.name(), now) {
            return self.alternate.clone();
        }
        self.primary.clone()
    }

    /// Block a provider for the configured cooldown after quota exhaustion
    pub fn report_quota_exhausted(&self, provider: &str) {
        self.report_quota_exhausted_at(provider, Instant::now());
    }

    pub fn report_quota_exhausted_at(&self, provider: &str, now: Instant) {
        let name = if provider == self.primary.name() {
            self.primary.name()
        } else if provider == self.alternate.name() {
            self.alternate.name()
        } else {
            warn!(provider, "quota report for unknown provider ignored");
            return;
        };
        let until = now + self.cooldown;
        self.lock_blocked().insert(name, until);
        warn!(
            provider = name,
            cooldown_secs = self.cooldown.as_secs(),
            "provider quota exhausted, blocking"
        );
    }

    pub fn is_blocked(&self, provider: &str) -> bool {
        self.is_blocked_at(provider, Instant::now())
    }

    fn is_blocked_at(&self, provider: &str, now: Instant) -> bool {
        let mut blocked = self.lock_blocked();
        match blocked.get(provider) {
            Some(until) if now < *until => true,
            Some(_) => {
                // Window expired; eligible again from this scan on.
                blocked.remove(provider);
                false
            }
            None => false,
        }
    }

    fn lock_blocked(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Instant>> {
        self.blocked_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::providers::types::{Candle, SeedToken, TokenMetrics};
    use async_trait::async_trait;

    struct StubProvider {
        name: &'static str,
        configured: bool,
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn discover(&self, _limit: usize) -> Result<Vec<SeedToken>> {
            Ok(vec![])
        }

        async fn fetch_metrics(&self, _address: &str) -> Result<TokenMetrics> {
            Ok(TokenMetrics::new())
        }

        async fn recent_candles(&self, _address: &str, _bars: usize) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
    }

    fn controller(primary_configured: bool, cooldown: Duration) -> FailoverController {
        FailoverController::new(
            Arc::new(StubProvider {
                name: "primary",
                configured: primary_configured,
            }),
            Arc::new(StubProvider {
                name: "alternate",
                configured: true,
            }),
            cooldown,
        )
    }

    #[test]
    fn test_primary_active_by_default() {
        let failover = controller(true, Duration::from_secs(60));
        assert_eq!(failover.active().name(), "primary");
    }

    #[test]
    fn test_unconfigured_primary_skipped_permanently() {
        let failover = controller(false, Duration::from_secs(60));
        assert_eq!(failover.active().name(), "alternate");

        // Even quota trouble on the alternate never resurrects the primary.
        failover.report_quota_exhausted("alternate");
        assert_eq!(failover.active().name(), "alternate");
    }

    #[test]
    fn test_quota_block_routes_to_alternate_for_exact_window() {
        let cooldown = Duration::from_secs(60);
        let failover = controller(true, cooldown);
        let start = Instant::now();

        failover.report_quota_exhausted_at("primary", start);

        // 1ms before expiry still routes to the alternate.
        let just_before = start + cooldown - Duration::from_millis(1);
        assert_eq!(failover.active_at(just_before).name(), "alternate");

        // At and after expiry the primary is eligible again.
        assert_eq!(failover.active_at(start + cooldown).name(), "primary");
    }

    #[test]
    fn test_block_state_cleared_after_expiry() {
        let cooldown = Duration::from_millis(10);
        let failover = controller(true, cooldown);
        let start = Instant::now();

        failover.report_quota_exhausted_at("primary", start);
        assert!(failover.is_blocked_at("primary", start));
        assert!(!failover.is_blocked_at("primary", start + cooldown));
        // The expired entry is dropped, not retained.
        assert!(failover.lock_blocked().is_empty());
    }
}
