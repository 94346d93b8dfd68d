//! Dates as they appear in `creationdate` and `getlastmodified`.
//!
//! Servers disagree on the format, so a fixed list of layouts is tried in order and the first
//! that parses wins. Values without a zone are taken as GMT. Weekday names are skipped, so a
//! weekday that disagrees with the date does not reject it.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

type DateParser = fn(&str) -> Option<DateTime<Utc>>;

const PARSERS: [DateParser; 7] = [
    iso_utc,
    rfc1123,
    iso_utc_fraction,
    iso_numeric_offset,
    unix_date,
    rfc850,
    asctime,
];

/// Parse a WebDAV date, or `None` when no known layout matches.
pub fn parse_dav_date(value: &str) -> Option<DateTime<Utc>> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return None;
    }
    PARSERS.iter().find_map(|parse| parse(&normalized))
}

/// `2024-01-31T12:00:00Z`
fn iso_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `Wed, 31 Jan 2024 12:00:00 GMT`
fn rfc1123(s: &str) -> Option<DateTime<Utc>> {
    let (rest, offset) = split_trailing_zone(strip_weekday(s, ", ")?)?;
    with_offset(
        NaiveDateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S").ok()?,
        offset,
    )
}

/// `2024-01-31T12:00:00.250Z`
fn iso_utc_fraction(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// `2024-01-31T13:00:00+0100`
fn iso_numeric_offset(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `Wed Jan 31 12:00:00 GMT 2024`
fn unix_date(s: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = s.split(' ').collect();
    let [weekday, month, day, time, zone, year] = tokens.as_slice() else {
        return None;
    };
    if !is_weekday_name(weekday) {
        return None;
    }
    let offset = zone_offset(zone)?;
    let rest = format!("{month} {day} {time} {year}");
    with_offset(
        NaiveDateTime::parse_from_str(&rest, "%b %d %H:%M:%S %Y").ok()?,
        offset,
    )
}

/// `Wednesday, 31-Jan-24 12:00:00 GMT`
fn rfc850(s: &str) -> Option<DateTime<Utc>> {
    let (rest, offset) = split_trailing_zone(strip_weekday(s, ", ")?)?;
    with_offset(
        NaiveDateTime::parse_from_str(rest, "%d-%b-%y %H:%M:%S").ok()?,
        offset,
    )
}

/// `Wed January 31 12:00:00 2024`
fn asctime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(strip_weekday(s, " ")?, "%B %d %H:%M:%S %Y")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The text after a leading weekday name and `separator`.
fn strip_weekday<'a>(s: &'a str, separator: &str) -> Option<&'a str> {
    let (weekday, rest) = s.split_once(separator)?;
    is_weekday_name(weekday).then_some(rest)
}

fn is_weekday_name(token: &str) -> bool {
    token.len() >= 3 && token.bytes().all(|b| b.is_ascii_alphabetic())
}

fn split_trailing_zone(s: &str) -> Option<(&str, FixedOffset)> {
    let (rest, zone) = s.rsplit_once(' ')?;
    Some((rest, zone_offset(zone)?))
}

fn with_offset(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "GMT" | "UT" | "UTC" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        upper => {
            let numeric = upper
                .strip_prefix("GMT")
                .or_else(|| upper.strip_prefix("UTC"))
                .unwrap_or(upper);
            return numeric_offset(numeric);
        }
    };
    FixedOffset::east_opt(hours * 3600)
}

/// `+0100`, `-05:30`
fn numeric_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
