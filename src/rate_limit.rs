use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, error};

use crate::clock::{Clock, SystemClock};
use crate::config::LimiterConfig;
use crate::error::LimiterError;
use crate::metrics::{
    ALLOWED_TOTAL, BUCKETS_TRACKED, CHECK_LATENCY, CHECKS_TOTAL, DENIED_TOTAL, EVICTED_TOTAL,
    INVALID_KEYS_TOTAL, RESETS_TOTAL,
};

// Slack for float error when a refill lands a hair below a whole permit
const TOKEN_EPSILON: f64 = 1e-9;

// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    // Not enough tokens. `retry_after` is the time until one permit refills.
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn retry_after_secs(&self) -> Option<f64> {
        match self {
            Decision::Allowed => None,
            Decision::Denied { retry_after } => Some(retry_after.as_secs_f64()),
        }
    }
}

// Token bucket state for one caller key
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(max_tokens: f64, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: now,
        }
    }

    // Tokens the bucket would hold at `now`, without touching it
    fn projected(&self, now: Instant, max_tokens: f64, rate: f64) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * rate).min(max_tokens)
    }

    fn in_range(&self, max_tokens: f64) -> bool {
        self.tokens.is_finite() && self.tokens >= 0.0 && self.tokens <= max_tokens
    }
}

// Read-only view of a bucket at a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSnapshot {
    // Tokens available if a check ran now.
    pub tokens: f64,
    // Time since the bucket was last checked.
    pub idle: Duration,
}

// One token bucket per caller key. Refill and debit run under the key's shard lock.
#[derive(Debug)]
pub struct Limiter {
    name: String,
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
    buckets: DashMap<String, Bucket>,
}

impl Limiter {
    // Create a limiter on the system clock.
    pub fn new(config: LimiterConfig) -> Result<Self, LimiterError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LimiterConfig, clock: Arc<dyn Clock>) -> Result<Self, LimiterError> {
        config.validate()?;
        Ok(Self {
            name: "admission".to_string(),
            config,
            clock,
            buckets: DashMap::new(),
        })
    }

    // Name used as the `limiter` label on metrics and in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    // Number of buckets currently tracked.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    // Refill the caller's bucket, then spend one permit if there is one
    pub fn check_and_consume(&self, key: &str) -> Result<Decision, LimiterError> {
        let started = Instant::now();
        CHECKS_TOTAL.with_label_values(&[self.name.as_str()]).inc();

        if key.is_empty() {
            INVALID_KEYS_TOTAL
                .with_label_values(&[self.name.as_str()])
                .inc();
            return Err(LimiterError::InvalidKey);
        }

        let now = self.clock.now();
        let max_tokens = f64::from(self.config.max_tokens);

        let decision = if let Some(mut bucket) = self.buckets.get_mut(key) {
            self.admit(key, &mut bucket, now)
        } else {
            let decision = {
                let mut bucket = self
                    .buckets
                    .entry(key.to_owned())
                    .or_insert_with(|| Bucket::full(max_tokens, now));
                self.admit(key, &mut bucket, now)
            };
            // The shard guard is gone, so len() can take its read locks
            self.record_bucket_count();
            decision
        };

        match decision {
            Decision::Allowed => ALLOWED_TOTAL.with_label_values(&[self.name.as_str()]).inc(),
            Decision::Denied { retry_after } => {
                DENIED_TOTAL.with_label_values(&[self.name.as_str()]).inc();
                debug!(
                    limiter = %self.name,
                    key,
                    retry_after_secs = retry_after.as_secs_f64(),
                    "admission denied"
                );
            }
        }
        CHECK_LATENCY
            .with_label_values(&[self.name.as_str()])
            .observe(started.elapsed().as_secs_f64());

        Ok(decision)
    }

    // Refill then debit. Caller holds the bucket's shard lock.
    fn admit(&self, key: &str, bucket: &mut Bucket, now: Instant) -> Decision {
        let max_tokens = f64::from(self.config.max_tokens);
        let rate = self.config.refill_rate_per_sec;

        if !bucket.in_range(max_tokens) {
            error!(
                limiter = %self.name,
                key,
                tokens = bucket.tokens,
                max_tokens,
                "bucket token count out of range, resetting to full"
            );
            RESETS_TOTAL.with_label_values(&[self.name.as_str()]).inc();
            *bucket = Bucket::full(max_tokens, now);
        }

        bucket.tokens = bucket.projected(now, max_tokens, rate);
        bucket.last_refill = bucket.last_refill.max(now);

        if bucket.tokens + TOKEN_EPSILON >= 1.0 {
            bucket.tokens = (bucket.tokens - 1.0).max(0.0);
            Decision::Allowed
        } else {
            Decision::Denied {
                retry_after: retry_after(bucket.tokens, rate),
            }
        }
    }

    // Returns how many buckets were removed
    pub fn evict_idle(&self, now: Instant) -> usize {
        let window = self.config.idle_eviction_window;
        // Counted per removal, inserts racing the sweep must not offset it
        let mut evicted = 0usize;
        self.buckets.retain(|_, bucket| {
            let keep = now.saturating_duration_since(bucket.last_refill) <= window;
            if !keep {
                evicted += 1;
            }
            keep
        });
        let after = self.buckets.len();

        if evicted > 0 {
            EVICTED_TOTAL
                .with_label_values(&[self.name.as_str()])
                .inc_by(evicted as f64);
            debug!(limiter = %self.name, evicted, remaining = after, "evicted idle buckets");
        }
        BUCKETS_TRACKED
            .with_label_values(&[self.name.as_str()])
            .set(after as f64);
        evicted
    }

    // Current state of `key`'s bucket, or `None` if it is not tracked.
    pub fn snapshot(&self, key: &str) -> Option<BucketSnapshot> {
        let now = self.clock.now();
        let bucket = self.buckets.get(key)?;
        Some(BucketSnapshot {
            tokens: bucket.projected(
                now,
                f64::from(self.config.max_tokens),
                self.config.refill_rate_per_sec,
            ),
            idle: now.saturating_duration_since(bucket.last_refill),
        })
    }

    fn record_bucket_count(&self) {
        BUCKETS_TRACKED
            .with_label_values(&[self.name.as_str()])
            .set(self.buckets.len() as f64);
    }
}

// Time until `tokens` reaches one whole permit, rounded up to the nanosecond
fn retry_after(tokens: f64, rate: f64) -> Duration {
    let secs = ((1.0 - tokens) / rate).max(0.0);
    let nanos = (secs * 1e9).ceil();
    if nanos >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_nanos(nanos as u64)
    }
}
