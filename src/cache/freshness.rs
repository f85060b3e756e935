//! Freshness headers: `Last-Modified` dates and the clamped `Cache-Control`.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Lowest `max-age` ever advertised, whatever the route asks for.
pub const MIN_MAX_AGE_SECS: u32 = 61;

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

pub fn clamp_max_age(requested: u32) -> u32 {
    requested.max(MIN_MAX_AGE_SECS)
}

pub fn cache_control_value(requested: u32) -> String {
    format!("public, max-age={}", clamp_max_age(requested))
}

/// Drops sub-second precision so stored timestamps compare exactly against
/// dates echoed back by clients.
pub fn truncate_to_second(value: OffsetDateTime) -> OffsetDateTime {
    value - time::Duration::nanoseconds(i64::from(value.nanosecond()))
}

/// Formats an IMF-fixdate, e.g. `Sun, 18 Oct 2026 12:00:00 GMT`.
pub fn format_http_date(value: OffsetDateTime) -> Option<String> {
    value.to_offset(UtcOffset::UTC).format(HTTP_DATE).ok()
}

pub fn parse_http_date(value: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(value.trim(), HTTP_DATE)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
