//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Returns the duration from another timestamp to this one.
    ///
    /// Returns negative duration if other is after self.
    pub fn duration_since(&self, other: &Timestamp) -> Duration {
        self.0.signed_duration_since(other.0)
    }

    /// Seconds elapsed from `earlier` to `self`, fractional and possibly negative.
    pub fn secs_since(&self, earlier: &Timestamp) -> f64 {
        self.duration_since(earlier).num_milliseconds() as f64 / 1000.0
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Out-of-range values saturate to the Unix epoch.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self(Utc.timestamp_opt(secs, 0).single().unwrap_or_default())
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Creates a new timestamp by adding the specified number of seconds.
    ///
    /// Negative values move backwards in time.
    pub fn plus_secs(&self, secs: i64) -> Self {
        Self(self.0 + Duration::seconds(secs))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn timestamp_deserializes_from_json() {
        let json = "\"2024-01-15T10:30:00Z\"";
        let ts: Timestamp = serde_json::from_str(json).unwrap();
        assert_eq!(ts.as_datetime().year(), 2024);
    }

    #[test]
    fn timestamp_from_unix_secs_roundtrips() {
        let ts = Timestamp::from_unix_secs(1_705_276_800);
        assert_eq!(ts.as_unix_secs(), 1_705_276_800);
        assert_eq!(ts.as_datetime().month(), 1);
    }

    #[test]
    fn plus_secs_accepts_negative_offsets() {
        let ts = Timestamp::from_unix_secs(1000);
        assert_eq!(ts.plus_secs(60).as_unix_secs(), 1060);
        assert_eq!(ts.plus_secs(-60).as_unix_secs(), 940);
    }

    #[test]
    fn secs_since_is_signed() {
        let a = Timestamp::from_unix_secs(1000);
        let b = a.plus_secs(90);
        assert_eq!(b.secs_since(&a), 90.0);
        assert_eq!(a.secs_since(&b), -90.0);
        assert!(a.is_before(&b));
        assert!(b.is_after(&a));
    }
}
