//! Sending window and pacing
//!
//! The window is a half-open daily range `[start_hour, end_hour)` evaluated
//! in a fixed UTC offset. All inputs and outputs are UTC instants.

use crate::config::SendingConfig;
use crate::{ConfigError, ConfigResult};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use parking_lot::Mutex;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendingWindow {
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
}

impl SendingWindow {
    /// Builds the window from validated sending configuration
    pub fn new(config: &SendingConfig) -> ConfigResult<Self> {
        if config.window_end_hour > 24 || config.window_start_hour >= config.window_end_hour {
            return Err(ConfigError::Validation(format!(
                "sending window must satisfy start < end <= 24, got {}..{}",
                config.window_start_hour, config.window_end_hour
            )));
        }
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            ConfigError::Validation(format!("invalid utc offset {}", config.utc_offset_hours))
        })?;

        Ok(Self {
            start_hour: config.window_start_hour,
            end_hour: config.window_end_hour,
            offset,
        })
    }

    /// Local midnight of the day containing `now`, as a UTC instant
    fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset);
        now - Duration::seconds(i64::from(local.num_seconds_from_midnight()))
            - Duration::nanoseconds(i64::from(local.nanosecond()))
    }

    fn opens_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start(now) + Duration::hours(i64::from(self.start_hour))
    }

    fn closes_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.day_start(now) + Duration::hours(i64::from(self.end_hour))
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.offset).hour();
        hour >= self.start_hour && hour < self.end_hour
    }

    /// Earliest instant at or after `now` when sending is allowed
    pub fn next_available_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let hour = now.with_timezone(&self.offset).hour();
        if hour < self.start_hour {
            self.opens_at(now)
        } else if hour >= self.end_hour {
            self.opens_at(now) + Duration::days(1)
        } else {
            now
        }
    }

    /// Whole minutes between sends so `total` sends fit before the window closes
    ///
    /// Zero outside the window or for no sends; otherwise at least one.
    pub fn delay_minutes(&self, total: usize, now: DateTime<Utc>) -> u64 {
        if total == 0 || !self.is_open(now) {
            return 0;
        }
        let remaining = (self.closes_at(now) - now).num_minutes().max(0) as u64;
        (remaining / total as u64).max(1)
    }

    pub fn delay_between_sends(&self, total: usize, now: DateTime<Utc>) -> std::time::Duration {
        std::time::Duration::from_secs(self.delay_minutes(total, now) * 60)
    }

    /// Local time of `at` formatted for refusal messages
    pub fn describe(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%Y-%m-%d %H:%M %:z").to_string()
    }
}
