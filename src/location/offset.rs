//! UTC offset formatting and tz-database lookups.

use chrono::{FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Largest magnitude `format_offset` renders; anything beyond saturates.
const MAX_OFFSET_SECS: u64 = 99 * 3600 + 59 * 60;

/// Format a UTC offset in seconds as `±HH:MM`.
///
/// Seconds that do not make up a whole minute are truncated, so `19_859`
/// renders as `+05:30`. Zero is rendered with a `+` sign.
pub fn format_offset(seconds: i64) -> String {
    let sign = if seconds >= 0 { '+' } else { '-' };
    let abs = seconds.unsigned_abs().min(MAX_OFFSET_SECS);
    let hh = abs / 3600;
    let mm = (abs % 3600) / 60;
    format!("{}{:02}:{:02}", sign, hh, mm)
}

/// Parse `+05:30`, `-0500` or `Z` into a fixed offset.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hh: i32 = digits[..2].parse().ok()?;
    let mm: i32 = digits[2..].parse().ok()?;
    if mm >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hh * 3600 + mm * 60))
}

/// Offset of an IANA zone at a local wall-clock time.
///
/// Ambiguous local times (DST fall-back) use the earlier mapping; times
/// that do not exist locally (DST spring-forward gap) yield `None`.
pub fn offset_for_zone_at(tzid: &str, local: NaiveDateTime) -> Option<String> {
    let tz: Tz = tzid.parse().ok()?;
    let dt = tz.from_local_datetime(&local).earliest()?;
    let fixed: FixedOffset = dt.offset().fix();
    Some(format_offset(fixed.local_minus_utc() as i64))
}

/// Offset of an IANA zone at the present instant.
pub fn current_offset_for_zone(tzid: &str) -> Option<String> {
    let tz: Tz = tzid.parse().ok()?;
    let fixed = Utc::now().with_timezone(&tz).offset().fix();
    Some(format_offset(fixed.local_minus_utc() as i64))
}
