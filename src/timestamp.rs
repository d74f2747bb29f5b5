//! MS-DOS date/time handling.
//!
//! Zip headers store modification times as two packed 16-bit words with a
//! two-second resolution and a 1980..=2107 range:
//!
//! ```text
//! time: hhhhhmmm mmmsssss   (seconds / 2)
//! date: yyyyyyym mmmddddd   (years since 1980)
//! ```
//!
//! Values are interpreted as UTC. The extended timestamp extra field carries
//! the exact Unix time alongside when the archive was written by this crate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: i64 = 86_400;

/// A packed MS-DOS date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DosDateTime {
    date: u16,
    time: u16,
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::MIN
    }
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable value.
    pub const MIN: Self = Self {
        date: (1 << 5) | 1,
        time: 0,
    };

    /// Builds a value from calendar fields.
    ///
    /// Returns `None` when a field is out of range. Odd seconds are rounded
    /// down to the two-second resolution.
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if !(1980..=2107).contains(&year)
            || !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year as i64, month as u32) as u8
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        Some(Self {
            date: ((year - 1980) << 9) | ((month as u16) << 5) | day as u16,
            time: ((hour as u16) << 11) | ((minute as u16) << 5) | (second as u16 / 2),
        })
    }

    /// Wraps raw header words without validation.
    #[inline]
    pub const fn from_parts(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// Unpacks the `(date << 16) | time` representation.
    #[inline]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            date: (packed >> 16) as u16,
            time: packed as u16,
        }
    }

    /// Returns `(date << 16) | time`, the form most zip tools expose.
    #[inline]
    pub const fn to_packed(self) -> u32 {
        ((self.date as u32) << 16) | self.time as u32
    }

    /// The raw date word.
    #[inline]
    pub const fn date(self) -> u16 {
        self.date
    }

    /// The raw time word.
    #[inline]
    pub const fn time(self) -> u16 {
        self.time
    }

    /// Calendar year.
    pub fn year(self) -> u16 {
        1980 + (self.date >> 9)
    }

    /// Month, 1..=12 for well-formed values.
    pub fn month(self) -> u8 {
        ((self.date >> 5) & 0x0F) as u8
    }

    /// Day of month.
    pub fn day(self) -> u8 {
        (self.date & 0x1F) as u8
    }

    /// Hour of day.
    pub fn hour(self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute.
    pub fn minute(self) -> u8 {
        ((self.time >> 5) & 0x3F) as u8
    }

    /// Second, always even.
    pub fn second(self) -> u8 {
        ((self.time & 0x1F) * 2) as u8
    }

    /// Converts a `SystemTime`, clamping to the representable range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs() as i64,
            Err(_) => return Self::MIN,
        };
        Self::from_unix_secs(secs)
    }

    /// Converts Unix seconds, clamping to the representable range.
    pub fn from_unix_secs(secs: i64) -> Self {
        let days = secs.div_euclid(SECONDS_PER_DAY);
        let rem = secs.rem_euclid(SECONDS_PER_DAY);
        let (year, month, day) = civil_from_days(days);
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self {
                date: (127 << 9) | (12 << 5) | 31,
                time: (23 << 11) | (59 << 5) | 29,
            };
        }
        let hour = (rem / 3600) as u8;
        let minute = ((rem % 3600) / 60) as u8;
        let second = (rem % 60) as u8;
        Self::new(year as u16, month as u8, day as u8, hour, minute, second).unwrap_or(Self::MIN)
    }

    /// Unix seconds for this value, or `None` for malformed fields.
    pub fn to_unix_secs(self) -> Option<i64> {
        let month = self.month() as u32;
        let day = self.day() as u32;
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(self.year() as i64, month)
            || self.hour() > 23
            || self.minute() > 59
            || self.second() > 59
        {
            return None;
        }
        let days = days_from_civil(self.year() as i64, month, day);
        Some(
            days * SECONDS_PER_DAY
                + self.hour() as i64 * 3600
                + self.minute() as i64 * 60
                + self.second() as i64,
        )
    }

    /// Converts to a `SystemTime`, or `None` for malformed fields.
    pub fn to_system_time(self) -> Option<SystemTime> {
        let secs = self.to_unix_secs()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(u64::try_from(secs).ok()?))
    }

    /// The current time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

impl std::fmt::Display for DosDateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 0,
    }
}

// Proleptic Gregorian conversions, days relative to 1970-01-01.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_value() {
        let min = DosDateTime::MIN;
        assert_eq!((min.year(), min.month(), min.day()), (1980, 1, 1));
        assert_eq!(min.to_unix_secs(), Some(315_532_800));
    }

    #[test]
    fn test_field_packing() {
        let dt = DosDateTime::new(2024, 2, 29, 13, 45, 31).unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 2);
        assert_eq!(dt.day(), 29);
        assert_eq!(dt.hour(), 13);
        assert_eq!(dt.minute(), 45);
        assert_eq!(dt.second(), 30);
        assert_eq!(DosDateTime::from_packed(dt.to_packed()), dt);
        assert_eq!(dt.to_string(), "2024-02-29 13:45:30");
    }

    #[test]
    fn test_rejects_invalid_fields() {
        assert!(DosDateTime::new(1979, 12, 31, 0, 0, 0).is_none());
        assert!(DosDateTime::new(2023, 2, 29, 0, 0, 0).is_none());
        assert!(DosDateTime::new(2023, 13, 1, 0, 0, 0).is_none());
        assert!(DosDateTime::new(2023, 1, 1, 24, 0, 0).is_none());
        assert_eq!(DosDateTime::from_parts(0, 0).to_unix_secs(), None);
    }

    #[test]
    fn test_unix_conversion() {
        // 2001-09-09 01:46:40 UTC
        let dt = DosDateTime::from_unix_secs(1_000_000_000);
        assert_eq!(dt.to_string(), "2001-09-09 01:46:40");
        assert_eq!(dt.to_unix_secs(), Some(1_000_000_000));
    }

    #[test]
    fn test_clamping() {
        assert_eq!(DosDateTime::from_unix_secs(0), DosDateTime::MIN);
        let max = DosDateTime::from_unix_secs(i64::from(u32::MAX) * 4);
        assert_eq!(max.year(), 2107);
        assert_eq!(max.month(), 12);
    }

    #[test]
    fn test_system_time_roundtrip() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let dt = DosDateTime::from_system_time(t);
        assert_eq!(dt.to_system_time(), Some(t));
    }
}
