//! Civil time for ledger timestamps.
//!
//! Timestamps are written in a fixed UTC offset so the ledger reads the
//! same regardless of the host's locale or timezone.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

/// Format of every timestamp cell in the ledger.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the current civil time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current time formatted for a ledger cell.
    fn stamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Wall clock pinned to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct CivilClock {
    offset: FixedOffset,
}

impl CivilClock {
    /// Returns `None` when the offset is outside chrono's supported range.
    pub fn new(utc_offset_hours: i32) -> Option<Self> {
        FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?).map(|offset| Self { offset })
    }
}

impl Clock for CivilClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock frozen at a single instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    instant: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn new(instant: DateTime<FixedOffset>) -> Self {
        Self { instant }
    }

    /// Build from civil date/time components in the given offset.
    pub fn at(
        utc_offset_hours: i32,
        (year, month, day): (i32, u32, u32),
        (hour, minute, second): (u32, u32, u32),
    ) -> Option<Self> {
        let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
        offset
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .map(Self::new)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.instant
    }
}
