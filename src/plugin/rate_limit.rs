//! Token-bucket rate limiting of frame flow.
//!
//! The bucket holds at most `limit` tokens and starts full. Tokens come back
//! in whole refill periods: one frame every `1 / limit` seconds in array mode,
//! `limit / 100` bytes every 10 ms in byte mode. A frame that finds too few
//! tokens is dropped; one that passes is forwarded unchanged, without a copy.

use std::time::{Duration, Instant};

use daq_pool::SharedFrame;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::counters::PluginCounters;
use crate::error::AppResult;

/// Refill period in byte mode.
pub const BYTE_REFILL_PERIOD: Duration = Duration::from_millis(10);

const BYTE_REFILLS_PER_SECOND: u64 = 100;

/// What the bucket counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Every frame passes.
    #[default]
    Off,
    /// `limit` is in frames per second.
    ArrayRate,
    /// `limit` is in payload bytes per second.
    ByteRate,
}

/// Plugin settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Unit of `limit`.
    pub mode: RateLimitMode,
    /// Frames or bytes per second, and the bucket's capacity.
    pub limit: u64,
}

/// Current bucket state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Tokens available right now.
    pub tokens: u64,
    /// Time between refills; zero when nothing is refilled.
    pub refill_period: Duration,
    /// Tokens added per refill.
    pub refill_amount: u64,
}

#[derive(Debug)]
struct Bucket {
    config: RateLimitConfig,
    tokens: u64,
    refill_period: Duration,
    refill_amount: u64,
    last_update: Instant,
}

impl Bucket {
    /// A full bucket for `config`.
    fn new(config: RateLimitConfig, now: Instant) -> Self {
        let limit = config.limit;
        let (refill_period, refill_amount) = match config.mode {
            RateLimitMode::Off => (Duration::ZERO, 0),
            RateLimitMode::ArrayRate if limit == 0 => (Duration::ZERO, 0),
            RateLimitMode::ArrayRate => {
                let nanos = (1_000_000_000 / limit).max(1);
                (Duration::from_nanos(nanos), 1)
            }
            RateLimitMode::ByteRate => (BYTE_REFILL_PERIOD, limit / BYTE_REFILLS_PER_SECOND),
        };
        Self {
            config,
            tokens: limit,
            refill_period,
            refill_amount,
            last_update: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        if self.refill_period.is_zero() {
            return;
        }
        let elapsed = now.saturating_duration_since(self.last_update);
        let count = elapsed.as_nanos() / self.refill_period.as_nanos();
        if count == 0 {
            return;
        }
        let added = u64::try_from(count)
            .unwrap_or(u64::MAX)
            .saturating_mul(self.refill_amount);
        self.tokens = self.tokens.saturating_add(added).min(self.config.limit);
        self.last_update = now;
    }

    fn try_take(&mut self, tokens: u64, now: Instant) -> bool {
        self.refill(now);
        if tokens > self.tokens {
            return false;
        }
        self.tokens -= tokens;
        true
    }

    fn status(&self) -> RateLimitStatus {
        RateLimitStatus {
            tokens: self.tokens,
            refill_period: self.refill_period,
            refill_amount: self.refill_amount,
        }
    }
}

/// Drops frames that would exceed a frame or byte rate.
///
/// Safe to share between worker threads; settings and bucket share one lock.
#[derive(Debug)]
pub struct RateLimitPlugin {
    name: String,
    bucket: Mutex<Bucket>,
    counters: PluginCounters,
}

impl RateLimitPlugin {
    /// Plugin with a full bucket.
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self::new_at(name, config, Instant::now())
    }

    /// Plugin with a full bucket whose refill clock starts at `now`.
    pub fn new_at(name: impl Into<String>, config: RateLimitConfig, now: Instant) -> Self {
        Self {
            name: name.into(),
            bucket: Mutex::new(Bucket::new(config, now)),
            counters: PluginCounters::new(),
        }
    }

    /// Plugin name used in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the current settings.
    pub fn config(&self) -> RateLimitConfig {
        self.bucket.lock().config
    }

    /// Replace the settings and refill the bucket to the new limit.
    pub fn set_config(&self, config: RateLimitConfig) {
        *self.bucket.lock() = Bucket::new(config, Instant::now());
        debug!(plugin = %self.name, ?config.mode, limit = config.limit, "Rate limit reset");
    }

    /// Arrival and drop counters.
    pub fn counters(&self) -> &PluginCounters {
        &self.counters
    }

    /// Bucket state, refilled up to now.
    pub fn status(&self) -> RateLimitStatus {
        self.status_at(Instant::now())
    }

    /// Bucket state, refilled up to `now`.
    pub fn status_at(&self, now: Instant) -> RateLimitStatus {
        let mut bucket = self.bucket.lock();
        bucket.refill(now);
        bucket.status()
    }

    /// Pass `input` on if the bucket allows it.
    ///
    /// Returns `Ok(None)` when the frame is dropped for exceeding the rate.
    /// In byte mode a frame whose size cannot be determined is counted as
    /// dropped and its error returned.
    pub fn process(&self, input: &SharedFrame) -> AppResult<Option<SharedFrame>> {
        self.process_at(input, Instant::now())
    }

    /// [`process`](Self::process) with the bucket clock read as `now`.
    pub fn process_at(
        &self,
        input: &SharedFrame,
        now: Instant,
    ) -> AppResult<Option<SharedFrame>> {
        if !self.counters.record_arrival(input.unique_id) {
            debug!(plugin = %self.name, unique_id = input.unique_id, "Frame arrived out of order");
        }

        let mut bucket = self.bucket.lock();
        let cost = match bucket.config.mode {
            RateLimitMode::Off => return Ok(Some(input.clone())),
            RateLimitMode::ArrayRate => 1,
            RateLimitMode::ByteRate => match frame_bytes(input) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.counters.record_drop();
                    warn!(
                        plugin = %self.name,
                        unique_id = input.unique_id,
                        error = %e,
                        "Dropping frame"
                    );
                    return Err(e);
                }
            },
        };

        if bucket.try_take(cost, now) {
            Ok(Some(input.clone()))
        } else {
            drop(bucket);
            self.counters.record_drop();
            debug!(
                plugin = %self.name,
                unique_id = input.unique_id,
                cost,
                "Rate limit reached, dropping frame"
            );
            Ok(None)
        }
    }
}

/// Payload size charged in byte mode: the compressed size when one is
/// recorded, otherwise the uncompressed element bytes.
fn frame_bytes(frame: &SharedFrame) -> AppResult<u64> {
    let bytes = if frame.compressed_size > 0 {
        frame.compressed_size
    } else {
        frame.info()?.total_bytes
    };
    Ok(u64::try_from(bytes).unwrap_or(u64::MAX))
}
