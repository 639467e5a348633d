//! Last-known-good FX policy.
//!
//! **Windows:**
//! - Fetch succeeds: use it and remember it with its timestamp.
//! - Fetch fails, remembered rate age <= `max_age`: serve the remembered rate.
//! - Fetch fails, remembered rate older, missing, or stamped in the future
//!   (clock skew): fail with the fetch error.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sourcing_core::clock::epoch_ms;
use sourcing_core::pricing::{FxFetchError, FxRate, FxRateSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxRateOrigin {
    Fresh,
    LastKnownGood { age_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FxResolution {
    pub rate: FxRate,
    pub origin: FxRateOrigin,
}

#[derive(Debug, Default)]
pub struct FxMetrics {
    fetch_failures_total: AtomicU64,
    fallbacks_total: AtomicU64,
}

impl FxMetrics {
    pub fn fetch_failures_total(&self) -> u64 {
        self.fetch_failures_total.load(Ordering::Relaxed)
    }

    pub fn fallbacks_total(&self) -> u64 {
        self.fallbacks_total.load(Ordering::Relaxed)
    }
}

pub struct LastKnownGoodFx<S> {
    inner: S,
    max_age: Duration,
    last_good: Mutex<Option<(FxRate, u64)>>,
    metrics: FxMetrics,
}

impl<S: FxRateSource> LastKnownGoodFx<S> {
    pub fn new(inner: S, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            last_good: Mutex::new(None),
            metrics: FxMetrics::default(),
        }
    }

    /// Prime the fallback, e.g. with a rate persisted before a restart.
    pub fn seed(&self, rate: FxRate, fetched_at_ms: u64) {
        *self.last_good.lock().expect("fx cache mutex poisoned") = Some((rate, fetched_at_ms));
    }

    pub fn last_good(&self) -> Option<(FxRate, u64)> {
        *self.last_good.lock().expect("fx cache mutex poisoned")
    }

    pub fn metrics(&self) -> &FxMetrics {
        &self.metrics
    }

    pub fn fetch_rate_at(
        &self,
        timeout: Duration,
        now_ms: u64,
    ) -> Result<FxResolution, FxFetchError> {
        let err = match self.inner.fetch_rate(timeout) {
            Ok(rate) => {
                self.seed(rate, now_ms);
                return Ok(FxResolution {
                    rate,
                    origin: FxRateOrigin::Fresh,
                });
            }
            Err(err) => err,
        };
        self.metrics
            .fetch_failures_total
            .fetch_add(1, Ordering::Relaxed);

        let Some((rate, fetched_at_ms)) = self.last_good() else {
            tracing::warn!("FxFetchFailed fallback=none error={}", err);
            return Err(err);
        };
        // Clock skew: fail closed.
        if now_ms < fetched_at_ms {
            tracing::warn!(
                "FxFetchFailed fallback=skewed cached_at_ms={} now_ms={} error={}",
                fetched_at_ms,
                now_ms,
                err
            );
            return Err(err);
        }

        let age_ms = now_ms - fetched_at_ms;
        let max_age_ms = self.max_age.as_millis() as u64;
        if age_ms > max_age_ms {
            tracing::warn!(
                "FxFetchFailed fallback=expired age_ms={} max_age_ms={} error={}",
                age_ms,
                max_age_ms,
                err
            );
            return Err(FxFetchError::Unavailable {
                reason: format!("{err}; last good rate is {age_ms}ms old (max {max_age_ms}ms)"),
            });
        }

        self.metrics.fallbacks_total.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            "FxFallback rate={} age_ms={} error={}",
            rate.value(),
            age_ms,
            err
        );
        Ok(FxResolution {
            rate,
            origin: FxRateOrigin::LastKnownGood { age_ms },
        })
    }
}

impl<S: FxRateSource> FxRateSource for LastKnownGoodFx<S> {
    fn fetch_rate(&self, timeout: Duration) -> Result<FxRate, FxFetchError> {
        self.fetch_rate_at(timeout, epoch_ms()).map(|r| r.rate)
    }
}
