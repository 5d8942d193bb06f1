//! Date/time parsing
//!
//! ISO9660 has two datetime formats: 7-byte and 17-byte. Both are converted
//! to seconds since the Unix epoch, corrected by the recorded GMT offset.

use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// 7-byte directory record datetime (ISO9660 9.1.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime7 {
    /// Years since 1900
    pub year: u8,

    /// Month (1-12)
    pub month: u8,

    /// Day (1-31)
    pub day: u8,

    /// Hour (0-23)
    pub hour: u8,

    /// Minute (0-59)
    pub minute: u8,

    /// Second (0-59)
    pub second: u8,

    /// GMT offset in 15-minute intervals (-48 to +52)
    pub gmt_offset: i8,
}

impl DateTime7 {
    /// Parse from 7-byte array
    pub fn from_bytes(bytes: &[u8; 7]) -> Self {
        Self {
            year: bytes[0],
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
            gmt_offset: bytes[6] as i8,
        }
    }

    /// Get full year (1900 + year)
    pub fn full_year(&self) -> u16 {
        1900 + self.year as u16
    }

    /// Calendar value, `None` for an unset or invalid stamp
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(i32::from(self.full_year()), month, self.day).ok()?;
        let time = Time::from_hms(self.hour, self.minute, self.second).ok()?;
        Some(PrimitiveDateTime::new(date, time).assume_offset(gmt_offset(self.gmt_offset)?))
    }

    /// Seconds since the Unix epoch, 0 for an unset or invalid stamp
    pub fn to_unix(&self) -> i64 {
        self.to_datetime().map_or(0, OffsetDateTime::unix_timestamp)
    }
}

/// 17-byte ASCII datetime (ISO9660 8.4.26.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime17 {
    /// Calendar date and time of day, hundredths included
    pub local: PrimitiveDateTime,

    /// GMT offset in 15-minute intervals
    pub gmt_offset: i8,
}

impl DateTime17 {
    /// Parse from 17-byte ASCII string
    ///
    /// Returns `None` for the all-zero "not specified" value and for
    /// anything that is not a valid calendar date and time.
    pub fn from_bytes(bytes: &[u8; 17]) -> Option<Self> {
        let text = std::str::from_utf8(&bytes[..16]).ok()?;
        if text == "0000000000000000" {
            return None;
        }
        // YYYYMMDDhhmmss followed by hundredths
        let format = format_description!("[year][month][day][hour][minute][second][subsecond digits:2]");
        let local = match PrimitiveDateTime::parse(text, format) {
            Ok(local) => local,
            Err(err) => {
                log::debug!("invalid volume timestamp {text:?}: {err}");
                return None;
            }
        };
        Some(Self {
            local,
            gmt_offset: bytes[16] as i8,
        })
    }

    /// Hundredths of a second
    pub fn hundredths(&self) -> u8 {
        (self.local.millisecond() / 10) as u8
    }

    /// Calendar value with the GMT offset applied
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        Some(self.local.assume_offset(gmt_offset(self.gmt_offset)?))
    }

    /// Seconds since the Unix epoch, 0 for an invalid stamp
    pub fn to_unix(&self) -> i64 {
        self.to_datetime().map_or(0, OffsetDateTime::unix_timestamp)
    }
}

/// Decode either stamp form from a slice of exactly 7 or 17 bytes
pub fn decode_stamp(bytes: &[u8]) -> i64 {
    if let Ok(short) = <&[u8; 7]>::try_from(bytes) {
        DateTime7::from_bytes(short).to_unix()
    } else if let Ok(long) = <&[u8; 17]>::try_from(bytes) {
        DateTime17::from_bytes(long).map_or(0, |dt| dt.to_unix())
    } else {
        0
    }
}

fn gmt_offset(quarters: i8) -> Option<UtcOffset> {
    UtcOffset::from_whole_seconds(i32::from(quarters) * 15 * 60).ok()
}
