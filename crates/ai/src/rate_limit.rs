use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::advisory::{AdvisoryClient, AdvisoryResult};
use crate::result::AiError;

/// Sliding-window call budget: at most `max_calls` within any `window`.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Ten calls per rolling minute.
    pub fn advisory_default() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Claim one call slot now. Returns `false` when the budget is exhausted.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let Ok(mut calls) = self.calls.lock() else {
            return false;
        };

        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }

        if calls.len() >= self.max_calls {
            return false;
        }
        calls.push_back(now);
        true
    }
}

/// Wraps an advisory client with a local call budget.
///
/// Over-budget calls fail with [`AiError::RateLimited`] without contacting
/// the wrapped client.
#[derive(Debug)]
pub struct RateLimitedAdvisory<C> {
    inner: C,
    limiter: RateLimiter,
}

impl<C> RateLimitedAdvisory<C> {
    pub fn new(inner: C, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<C: AdvisoryClient> AdvisoryClient for RateLimitedAdvisory<C> {
    async fn analyze(
        &self,
        moisture: f64,
        history: &[f64],
        plant_name: &str,
    ) -> Result<AdvisoryResult, AiError> {
        if !self.limiter.try_acquire() {
            return Err(AiError::RateLimited {
                limit: self.limiter.max_calls(),
                window_secs: self.limiter.window().as_secs(),
            });
        }
        self.inner.analyze(moisture, history, plant_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn budget_refills_as_calls_age_out() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(10)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(59)));

        // First call is now 60s old and leaves the window.
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(60)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(61)));
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AdvisoryClient for Counting {
        async fn analyze(&self, _m: f64, _h: &[f64], _p: &str) -> Result<AdvisoryResult, AiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AdvisoryResult::default())
        }
    }

    #[tokio::test]
    async fn eleventh_call_in_a_minute_never_reaches_the_service() {
        let client = RateLimitedAdvisory::new(Counting::default(), RateLimiter::advisory_default());

        for _ in 0..10 {
            client.analyze(40.0, &[], "Monstera").await.unwrap();
        }
        let err = client.analyze(40.0, &[], "Monstera").await.unwrap_err();

        assert_eq!(
            err,
            AiError::RateLimited {
                limit: 10,
                window_secs: 60
            }
        );
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 10);
    }
}
