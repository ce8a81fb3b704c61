//! OSC time tags
//!
//! A time tag is a 64-bit NTP timestamp: the upper 32 bits count seconds
//! since 1900-01-01T00:00:00Z, the lower 32 bits are a binary fraction of a
//! second. The 32-bit seconds field wraps every 2^32 seconds (~136 years);
//! the first wrap ("era 1") starts on 2036-02-07T06:28:16Z.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
pub const NTP_UNIX_OFFSET_SECS: i64 = 2_208_988_800;

/// Length of one NTP era in seconds
pub const ERA_SECONDS: i64 = 1 << 32;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// An OSC/NTP 32.32 fixed point time tag.
///
/// Ordering is lexicographic on `(seconds, fraction)`, which is the numeric
/// ordering of the raw 64-bit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeTag(u64);

impl TimeTag {
    /// Raw value of the "dispatch immediately" sentinel
    pub const IMMEDIATE_RAW: u64 = 1;

    /// The "dispatch immediately" sentinel
    pub const IMMEDIATE: TimeTag = TimeTag(Self::IMMEDIATE_RAW);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn from_parts(seconds: u32, fraction: u32) -> Self {
        Self(((seconds as u64) << 32) | fraction as u64)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Whole seconds within the era
    pub const fn seconds(&self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Fractional second in units of 2^-32 s
    pub const fn fraction(&self) -> u32 {
        self.0 as u32
    }

    pub const fn is_immediate(&self) -> bool {
        self.0 == Self::IMMEDIATE_RAW
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Wall-clock time `delay` from now, `None` if the platform clock
    /// cannot represent it
    pub fn after(delay: Duration) -> Option<Self> {
        SystemTime::now()
            .checked_add(delay)
            .map(Self::from_system_time)
    }

    /// Convert a wall-clock instant, wrapping into whichever era it falls in
    pub fn from_system_time(time: SystemTime) -> Self {
        let (unix_secs, nanos) = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let before = e.duration();
                if before.subsec_nanos() == 0 {
                    (-(before.as_secs() as i64), 0)
                } else {
                    (-(before.as_secs() as i64) - 1, 1_000_000_000 - before.subsec_nanos())
                }
            }
        };

        let seconds = (unix_secs + NTP_UNIX_OFFSET_SECS).rem_euclid(ERA_SECONDS) as u32;
        let fraction = ((nanos as u128) << 32) / NANOS_PER_SEC;
        let rounding = (((nanos as u128) << 32) % NANOS_PER_SEC) * 2 >= NANOS_PER_SEC;
        let fraction = fraction + rounding as u128;

        // 999_999_999ns rounds to just below 2^32, so no carry into seconds
        Self::from_parts(seconds, fraction as u32)
    }

    /// Convert to wall-clock time in a specific NTP era (0 = 1900-2036)
    pub fn to_system_time_in_era(&self, era: i64) -> SystemTime {
        let unix_secs = era * ERA_SECONDS + self.seconds() as i64 - NTP_UNIX_OFFSET_SECS;
        let nanos = ((self.fraction() as u128 * NANOS_PER_SEC) + (1u128 << 31)) >> 32;
        let sub = Duration::from_nanos(nanos as u64);

        if unix_secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(unix_secs as u64) + sub
        } else {
            UNIX_EPOCH - Duration::from_secs(unix_secs.unsigned_abs()) + sub
        }
    }

    /// Convert to wall-clock time, choosing the era that puts the result
    /// closest to the current time.
    pub fn to_system_time(&self) -> SystemTime {
        self.to_system_time_near(SystemTime::now())
    }

    /// Convert to wall-clock time, choosing the era closest to `reference`
    pub fn to_system_time_near(&self, reference: SystemTime) -> SystemTime {
        let reference_ntp = Self::unix_seconds(reference) + NTP_UNIX_OFFSET_SECS;
        let era = reference_ntp.div_euclid(ERA_SECONDS);
        let offset = self.seconds() as i64 - reference_ntp.rem_euclid(ERA_SECONDS);

        let era = if offset > ERA_SECONDS / 2 {
            era - 1
        } else if offset < -ERA_SECONDS / 2 {
            era + 1
        } else {
            era
        };
        self.to_system_time_in_era(era)
    }

    /// Time left until this tag is due, `None` if it is due already.
    ///
    /// The immediate sentinel is always due.
    pub fn delay_from(&self, now: SystemTime) -> Option<Duration> {
        if self.is_immediate() {
            return None;
        }
        self.to_system_time_near(now)
            .duration_since(now)
            .ok()
            .filter(|d| !d.is_zero())
    }

    fn unix_seconds(time: SystemTime) -> i64 {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(e) => -(e.duration().as_secs() as i64) - 1,
        }
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

impl From<SystemTime> for TimeTag {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl From<u64> for TimeTag {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_immediate() {
            write!(f, "immediate")
        } else {
            write!(f, "{}.{:08x}", self.seconds(), self.fraction())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let tag = TimeTag::from_system_time(UNIX_EPOCH);
        assert_eq!(tag.seconds(), 0x83AA_7E80);
        assert_eq!(tag.fraction(), 0);
        assert_eq!(tag.to_system_time_in_era(0), UNIX_EPOCH);
    }

    #[test]
    fn test_immediate() {
        assert!(TimeTag::IMMEDIATE.is_immediate());
        assert_eq!(TimeTag::IMMEDIATE.seconds(), 0);
        assert_eq!(TimeTag::IMMEDIATE.fraction(), 1);
        assert!(!TimeTag::from_parts(0, 2).is_immediate());
        assert_eq!(TimeTag::default(), TimeTag::IMMEDIATE);
    }

    #[test]
    fn test_half_second_fraction() {
        let tag = TimeTag::from_system_time(UNIX_EPOCH + Duration::from_millis(500));
        assert_eq!(tag.fraction(), 0x8000_0000);
    }

    #[test]
    fn test_ordering() {
        let a = TimeTag::from_parts(10, 0xFFFF_FFFF);
        let b = TimeTag::from_parts(11, 0);
        assert!(a < b);
        assert!(TimeTag::from_parts(11, 1) > b);
    }

    #[test]
    fn test_era_wrap() {
        // 2036-12-31T00:00:00Z lies in era 1
        let time = UNIX_EPOCH + Duration::from_secs(2_114_294_400);
        let tag = TimeTag::from_system_time(time);
        assert_eq!(tag.seconds(), 0x01B0_1100);
        assert_eq!(tag.to_system_time_near(time), time);
    }

    #[test]
    fn test_delay_from() {
        let now = SystemTime::now();
        let later = TimeTag::from_system_time(now + Duration::from_secs(2));
        let delay = later.delay_from(now).unwrap();
        assert!(delay > Duration::from_millis(1990) && delay < Duration::from_millis(2001));

        let earlier = TimeTag::from_system_time(now - Duration::from_secs(2));
        assert!(earlier.delay_from(now).is_none());
        assert!(TimeTag::IMMEDIATE.delay_from(now).is_none());
    }
}
