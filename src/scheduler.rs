//! Next-wake calculation.
//!
//! The node runs once a day at a fixed local time.  After each cycle the
//! orchestrator asks how long to sleep:
//!
//! ```text
//!   now ──▶ same local day @ HH:MM:00 ──┬── in the future ──▶ target - now
//!                                       └── already passed ─▶ + 86 400 s
//! ```
//!
//! Local time is a fixed UTC offset taken from the configuration.  The
//! rollover is always exactly 86 400 s; there are no DST rules to apply.

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, TimeDelta, Utc};

use crate::config::SystemConfig;

/// One day, in seconds.
pub const DAY_SECS: i64 = 86_400;

const DAY_US: u64 = DAY_SECS as u64 * 1_000_000;

/// Anything before 2020-01-01 means the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

/// Whether `now` looks like a calendar time rather than time since boot.
pub fn clock_is_plausible(now: DateTime<Utc>) -> bool {
    now.timestamp() >= EPOCH_2020
}

/// Daily local wake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTarget {
    time: NaiveTime,
}

impl ScheduleTarget {
    /// `None` unless `hour` is 0–23 and `minute` is 0–59.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0).map(|time| Self { time })
    }

    pub fn from_config(cfg: &SystemConfig) -> Option<Self> {
        Self::new(cfg.target_hour, cfg.target_minute)
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }
}

/// 18:00, the reference node's daily run.
impl Default for ScheduleTarget {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Build a fixed offset from minutes east of UTC, falling back to UTC.
pub fn offset_from_minutes(minutes: i16) -> FixedOffset {
    FixedOffset::east_opt(i32::from(minutes) * 60).unwrap_or_else(|| Utc.fix())
}

/// Microseconds from `now` until the next occurrence of `target` in `tz`.
///
/// Always strictly positive.  When the same-day target is at or before
/// `now`, the result lands exactly one day after that same-day target.
pub fn next_run_micros(now: DateTime<Utc>, target: ScheduleTarget, tz: FixedOffset) -> u64 {
    let local_day = now.with_timezone(&tz).date_naive();
    let candidate_local = local_day.and_time(target.time);
    let mut candidate =
        (candidate_local - TimeDelta::seconds(i64::from(tz.local_minus_utc()))).and_utc();

    if candidate <= now {
        candidate += TimeDelta::seconds(DAY_SECS);
    }

    (candidate - now)
        .num_microseconds()
        .and_then(|us| u64::try_from(us).ok())
        .filter(|&us| us > 0)
        .unwrap_or(DAY_US)
}

/// Local wall-clock time `delay_us` after `now`, for log lines.
pub fn wake_time_local(now: DateTime<Utc>, delay_us: u64, tz: FixedOffset) -> DateTime<FixedOffset> {
    let delay = TimeDelta::microseconds(i64::try_from(delay_us).unwrap_or(i64::MAX / 2));
    (now + delay).with_timezone(&tz)
}
