//! Resolving a canonical timezone name to a UTC offset.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

/// Get the current UTC offset for `canonical_timezone`, e.g. "Pacific/Auckland".
///
/// # Errors
/// This function will return a [Error::InvalidTimezone] if the timezone name
/// is not a known canonical timezone.
pub fn get_local_offset(canonical_timezone: &str) -> Result<UtcOffset, Error> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
        .ok_or_else(|| Error::InvalidTimezone(canonical_timezone.to_string()))
}

#[cfg(test)]
mod timezone_tests {
    use crate::Error;

    use super::get_local_offset;

    #[test]
    fn resolves_canonical_name() {
        assert!(get_local_offset("Pacific/Auckland").is_ok());
    }

    #[test]
    fn rejects_unknown_name() {
        assert_eq!(
            get_local_offset("Middle/Nowhere"),
            Err(Error::InvalidTimezone("Middle/Nowhere".to_string()))
        );
    }
}
