//! Process-wide pacing of outbound model calls.
//!
//! One [`RateLimiter`] is shared (via `Arc`) by every model of every run in
//! the process. Calls are serialized: the mutex is held across the wait, so
//! two callers can never be stamped less than `min_interval` apart.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Sent to observers just before the limiter sleeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitNotice {
    pub sleep: Duration,
    /// Number the held-back call will receive once it proceeds.
    pub request_number: u64,
}

pub type RateLimitObserver = Arc<dyn Fn(RateLimitNotice) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStats {
    pub total_requests: u64,
    pub min_interval: Duration,
    pub last_request_at: Option<DateTime<Utc>>,
}

pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
    call_count: AtomicU64,
    /// Wall-clock millis of the last stamp, 0 when none.
    last_call_wall_ms: AtomicI64,
    observer: RwLock<Option<RateLimitObserver>>,
}

impl RateLimiter {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
            call_count: AtomicU64::new(0),
            last_call_wall_ms: AtomicI64::new(0),
            observer: RwLock::new(None),
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Self::DEFAULT_INTERVAL))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Install (or clear) the process-wide observer. A run-scoped observer
    /// passed to [`RateLimiter::acquire_with`] takes precedence.
    pub fn set_observer(&self, observer: Option<RateLimitObserver>) {
        match self.observer.write() {
            Ok(mut slot) => *slot = observer,
            Err(poisoned) => *poisoned.into_inner() = observer,
        }
    }

    pub async fn acquire(&self) -> u64 {
        self.acquire_with(None).await
    }

    /// Wait until `min_interval` has passed since the previous call, then
    /// stamp this call. Returns the call's sequence number (1-based).
    pub async fn acquire_with(&self, observer: Option<&RateLimitObserver>) -> u64 {
        let mut last_call = self.last_call.lock().await;
        let request_number = self.call_count.load(Ordering::SeqCst) + 1;

        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let sleep = self.min_interval - elapsed;
                info!(
                    sleep_ms = sleep.as_millis() as u64,
                    request_number, "Rate limiting model call"
                );
                self.notify(observer, RateLimitNotice {
                    sleep,
                    request_number,
                });
                tokio::time::sleep(sleep).await;
            }
        }

        *last_call = Some(Instant::now());
        self.call_count.store(request_number, Ordering::SeqCst);
        self.last_call_wall_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        request_number
    }

    pub fn stats(&self) -> RateLimitStats {
        let wall_ms = self.last_call_wall_ms.load(Ordering::SeqCst);
        RateLimitStats {
            total_requests: self.call_count.load(Ordering::SeqCst),
            min_interval: self.min_interval,
            last_request_at: (wall_ms != 0)
                .then(|| DateTime::from_timestamp_millis(wall_ms))
                .flatten(),
        }
    }

    fn notify(&self, scoped: Option<&RateLimitObserver>, notice: RateLimitNotice) {
        let observer = match scoped {
            Some(observer) => Some(observer.clone()),
            None => self.observer.read().ok().and_then(|slot| slot.clone()),
        };
        let Some(observer) = observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| observer(notice))).is_err() {
            warn!(request_number = notice.request_number, "Rate limit observer panicked");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test(start_paused = true)]
    async fn first_call_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let start = Instant::now();
        assert_eq!(limiter.acquire().await, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(limiter.stats().total_requests, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_never_share_a_window() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(5)));
        let stamps = Arc::new(StdMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            let stamps = stamps.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                stamps.lock().unwrap().push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut stamps = stamps.lock().unwrap().clone();
        stamps.sort();
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(5));
        }
        assert_eq!(limiter.stats().total_requests, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn observer_sees_sleep_and_next_number() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        limiter.set_observer(Some(Arc::new(move |n: RateLimitNotice| {
            sink.lock().unwrap().push(n);
        })));

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(4)).await;
        limiter.acquire().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].request_number, 2);
        assert_eq!(seen[0].sleep, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn scoped_observer_takes_precedence() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let global = Arc::new(StdMutex::new(0));
        let scoped = Arc::new(StdMutex::new(0));
        let g = global.clone();
        limiter.set_observer(Some(Arc::new(move |_| *g.lock().unwrap() += 1)));
        let s = scoped.clone();
        let run_observer: RateLimitObserver = Arc::new(move |_| *s.lock().unwrap() += 1);

        limiter.acquire_with(Some(&run_observer)).await;
        limiter.acquire_with(Some(&run_observer)).await;

        assert_eq!(*scoped.lock().unwrap(), 1);
        assert_eq!(*global.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_observer_does_not_fail_the_call() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.set_observer(Some(Arc::new(|_| panic!("observer broke"))));
        limiter.acquire().await;
        assert_eq!(limiter.acquire().await, 2);
    }

    #[test]
    fn stats_before_any_call() {
        let stats = RateLimiter::default().stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.min_interval, Duration::from_secs(10));
        assert!(stats.last_request_at.is_none());
    }
}
