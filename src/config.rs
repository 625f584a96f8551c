use std::time::Duration;

use clap::Parser;

use crate::error::LimiterError;
use crate::key::KeySource;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "admission-gateway")]
#[command(about = "Per-caller token bucket admission control over HTTP")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "ADMISSION_PORT", default_value_t = 8080)]
    pub port: u16,

    // Burst capacity of each caller's bucket
    #[arg(long, env = "ADMISSION_MAX_TOKENS", default_value_t = 10)]
    pub max_tokens: u32,

    // Tokens restored per second
    #[arg(long, env = "ADMISSION_REFILL_RATE", default_value_t = 1.0)]
    pub refill_rate: f64,

    // Buckets untouched for this long are swept
    #[arg(long, env = "ADMISSION_IDLE_EVICTION_SECS", default_value_t = 600)]
    pub idle_eviction_secs: u64,

    // How often the idle sweep runs
    #[arg(long, env = "ADMISSION_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    // How the guard derives a caller key from a request
    #[arg(long, env = "ADMISSION_KEY_SOURCE", value_enum, default_value_t = KeySource::PeerIp)]
    pub key_source: KeySource,

    // Burst capacity guarding the admission API itself (0 disables the guard)
    #[arg(long, env = "ADMISSION_GUARD_MAX_TOKENS", default_value_t = 0)]
    pub guard_max_tokens: u32,

    // Refill rate of the guard
    #[arg(long, env = "ADMISSION_GUARD_REFILL_RATE", default_value_t = 5.0)]
    pub guard_refill_rate: f64,
}

impl Args {
    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            max_tokens: self.max_tokens,
            refill_rate_per_sec: self.refill_rate,
            idle_eviction_window: Duration::from_secs(self.idle_eviction_secs),
        }
    }

    pub fn guard_config(&self) -> Option<LimiterConfig> {
        if self.guard_max_tokens == 0 {
            return None;
        }
        Some(LimiterConfig {
            max_tokens: self.guard_max_tokens,
            refill_rate_per_sec: self.guard_refill_rate,
            idle_eviction_window: Duration::from_secs(self.idle_eviction_secs),
        })
    }

    pub fn sweep_interval(&self) -> Result<Duration, LimiterError> {
        if self.sweep_interval_secs == 0 {
            return Err(LimiterError::InvalidConfig(
                "sweep interval must be at least one second".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.sweep_interval_secs))
    }
}

// Settings for one limiter instance, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    // Maximum burst capacity of a bucket.
    pub max_tokens: u32,
    // Tokens restored per second of elapsed time.
    pub refill_rate_per_sec: f64,
    // How long an untouched bucket survives before the sweep evicts it.
    pub idle_eviction_window: Duration,
}

impl LimiterConfig {
    pub fn new(max_tokens: u32, refill_rate_per_sec: f64) -> Self {
        Self {
            max_tokens,
            refill_rate_per_sec,
            ..Self::default()
        }
    }

    pub fn with_idle_eviction(mut self, window: Duration) -> Self {
        self.idle_eviction_window = window;
        self
    }

    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.max_tokens == 0 {
            return Err(LimiterError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !self.refill_rate_per_sec.is_finite() || self.refill_rate_per_sec <= 0.0 {
            return Err(LimiterError::InvalidConfig(format!(
                "refill rate must be a positive finite number, got {}",
                self.refill_rate_per_sec
            )));
        }
        Ok(())
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            refill_rate_per_sec: 1.0,
            idle_eviction_window: Duration::from_secs(600),
        }
    }
}
