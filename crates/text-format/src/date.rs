//! Date parsing and formatting
//!
//! Date values arrive as strings. RFC 3339 instants are converted into the
//! render time zone; naive date-times and bare dates are read as wall-clock
//! times already in that zone.
//!
//! Formatting accepts either a standard pattern (a single letter such as
//! `d` or a name such as `LongDate`) or a custom pattern built from tokens:
//!
//! | Token | Meaning |
//! |---|---|
//! | `d` `dd` | day of month, optional zero padding |
//! | `ddd` `dddd` | weekday name, abbreviated / full |
//! | `M` `MM` | month number |
//! | `MMM` `MMMM` | month name, abbreviated / full |
//! | `y` `yy` `yyyy` | year (two digits, or padded to the token width) |
//! | `h` `hh` / `H` `HH` | hour, 12 / 24 hour clock |
//! | `m` `mm` / `s` `ss` | minute / second |
//! | `t` `tt` | AM/PM designator (first letter / full) |
//! | `z` `zz` `zzz` | UTC offset (`+7`, `+07`, `+07:00`) |
//! | `/` `:` | locale date separator / time separator |
//!
//! Quoted text (`'...'` or `"..."`) and `\`-escaped characters are literal.
//! A leading `%` forces a single letter to be read as a custom token.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike,
    Utc,
};

use crate::locale::Locale;
use crate::{FormatError, Result};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a UTC offset such as `UTC`, `Z`, `+07:00`, `-0530` or `GMT+1`
pub fn parse_time_zone(text: &str) -> Result<FixedOffset> {
    let invalid = || FormatError::InvalidTimeZone(text.to_string());
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();

    let offset = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    if offset.is_empty() || offset == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match offset.as_bytes()[0] {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return Err(invalid()),
    };
    if !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return Err(invalid());
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() > 2 => rest.split_at(rest.len() - 2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse a date value into an instant in the given time zone
///
/// # Examples
/// ```
/// use text_format::{parse_date_value, parse_time_zone};
/// let tz = parse_time_zone("+07:00").unwrap();
/// let dt = parse_date_value("2025-01-22T00:00:00Z", &tz).unwrap();
/// assert_eq!(dt.to_rfc3339(), "2025-01-22T07:00:00+07:00");
/// ```
pub fn parse_date_value(text: &str, tz: &FixedOffset) -> Result<DateTime<FixedOffset>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(tz));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.with_timezone(tz));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return localize(naive, tz, text);
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            let naive = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| FormatError::InvalidDate(text.to_string()))?;
            return localize(naive, tz, text);
        }
    }

    Err(FormatError::InvalidDate(text.to_string()))
}

fn localize(naive: NaiveDateTime, tz: &FixedOffset, text: &str) -> Result<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| FormatError::InvalidDate(text.to_string()))
}

/// Standard pattern resolved for a locale
enum Standard {
    Custom(String),
    Universal,
    RoundTrip,
}

fn standard_pattern(pattern: &str, locale: &Locale) -> Option<Standard> {
    let custom = |p: &str| Some(Standard::Custom(p.to_string()));
    let joined = |a: &str, b: &str| Some(Standard::Custom(format!("{a} {b}")));

    match pattern {
        "d" => custom(locale.short_date),
        "D" => custom(locale.long_date),
        "f" => joined(locale.long_date, locale.short_time),
        "F" => joined(locale.long_date, locale.long_time),
        "g" => joined(locale.short_date, locale.short_time),
        "G" => joined(locale.short_date, locale.long_time),
        "M" | "m" => custom("MMMM d"),
        "s" => custom("yyyy'-'MM'-'dd'T'HH':'mm':'ss"),
        "t" => custom(locale.short_time),
        "T" => custom(locale.long_time),
        "u" => Some(Standard::Universal),
        "Y" | "y" => custom("MMMM yyyy"),
        "o" | "O" => Some(Standard::RoundTrip),
        _ => match pattern.to_ascii_lowercase().as_str() {
            "shortdate" => custom(locale.short_date),
            "longdate" => custom(locale.long_date),
            "shorttime" => custom(locale.short_time),
            "longtime" => custom(locale.long_time),
            "fulldatetime" => joined(locale.long_date, locale.long_time),
            "generaldatetime" => joined(locale.short_date, locale.long_time),
            "monthday" => custom("MMMM d"),
            "yearmonth" => custom("MMMM yyyy"),
            "sortable" => custom("yyyy'-'MM'-'dd'T'HH':'mm':'ss"),
            "universal" => Some(Standard::Universal),
            "roundtrip" => Some(Standard::RoundTrip),
            _ => None,
        },
    }
}

/// Format an instant with a standard or custom pattern
///
/// An empty pattern renders the general date-time (`G`).
///
/// # Examples
/// ```
/// use text_format::{format_date, parse_date_value, parse_time_zone, Locale};
/// let tz = parse_time_zone("UTC").unwrap();
/// let dt = parse_date_value("2025-03-07 14:05:09", &tz).unwrap();
/// let en = Locale::en_us();
/// assert_eq!(format_date(&dt, "d", en).unwrap(), "3/7/2025");
/// assert_eq!(format_date(&dt, "dd-MMM-yy hh:mm tt", en).unwrap(), "07-Mar-25 02:05 PM");
/// ```
pub fn format_date(dt: &DateTime<FixedOffset>, pattern: &str, locale: &Locale) -> Result<String> {
    let pattern = if pattern.is_empty() { "G" } else { pattern };

    match standard_pattern(pattern, locale) {
        Some(Standard::Custom(expanded)) => Ok(render_custom(dt, &expanded, locale)),
        Some(Standard::Universal) => {
            let utc = dt.with_timezone(&Utc).fixed_offset();
            Ok(render_custom(&utc, "yyyy'-'MM'-'dd HH':'mm':'ss'Z'", locale))
        }
        Some(Standard::RoundTrip) => Ok(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        None if pattern.chars().count() == 1 => {
            Err(FormatError::UnknownFormat(pattern.to_string()))
        }
        None => Ok(render_custom(dt, pattern, locale)),
    }
}

fn render_custom(dt: &DateTime<FixedOffset>, pattern: &str, locale: &Locale) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    out.push(chars[i]);
                    i += 1;
                }
                i += 1;
            }
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                }
                i += 2;
            }
            '%' => i += 1,
            '/' => {
                out.push_str(locale.date_separator);
                i += 1;
            }
            'd' | 'M' | 'y' | 'h' | 'H' | 'm' | 's' | 't' | 'z' => {
                let run = chars[i..].iter().take_while(|&&x| x == c).count();
                out.push_str(&render_token(dt, c, run));
                i += run;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn render_token(dt: &DateTime<FixedOffset>, token: char, width: usize) -> String {
    match (token, width) {
        ('d', 1) => dt.day().to_string(),
        ('d', 2) => format!("{:02}", dt.day()),
        ('d', 3) => abbreviate(WEEKDAYS[dt.weekday().num_days_from_monday() as usize]),
        ('d', _) => WEEKDAYS[dt.weekday().num_days_from_monday() as usize].to_string(),
        ('M', 1) => dt.month().to_string(),
        ('M', 2) => format!("{:02}", dt.month()),
        ('M', 3) => abbreviate(MONTHS[dt.month0() as usize]),
        ('M', _) => MONTHS[dt.month0() as usize].to_string(),
        ('y', 1) => (dt.year() % 100).to_string(),
        ('y', 2) => format!("{:02}", dt.year() % 100),
        ('y', n) => format!("{:0n$}", dt.year()),
        ('h', 1) => dt.hour12().1.to_string(),
        ('h', _) => format!("{:02}", dt.hour12().1),
        ('H', 1) => dt.hour().to_string(),
        ('H', _) => format!("{:02}", dt.hour()),
        ('m', 1) => dt.minute().to_string(),
        ('m', _) => format!("{:02}", dt.minute()),
        ('s', 1) => dt.second().to_string(),
        ('s', _) => format!("{:02}", dt.second()),
        ('t', 1) => (if dt.hour12().0 { "P" } else { "A" }).to_string(),
        ('t', _) => (if dt.hour12().0 { "PM" } else { "AM" }).to_string(),
        ('z', n) => render_offset(dt.offset().local_minus_utc(), n),
        _ => String::new(),
    }
}

fn render_offset(seconds: i32, width: usize) -> String {
    let sign = if seconds < 0 { '-' } else { '+' };
    let hours = seconds.abs() / 3600;
    let minutes = (seconds.abs() % 3600) / 60;
    match width {
        1 => format!("{sign}{hours}"),
        2 => format!("{sign}{hours:02}"),
        _ => format!("{sign}{hours:02}:{minutes:02}"),
    }
}

fn abbreviate(name: &str) -> String {
    name.chars().take(3).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        parse_time_zone("UTC").unwrap()
    }

    fn sample() -> DateTime<FixedOffset> {
        parse_date_value("2025-01-22T09:05:03", &utc()).unwrap()
    }

    #[test]
    fn test_parse_time_zone() {
        assert_eq!(parse_time_zone("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_time_zone("+07:00").unwrap().local_minus_utc(), 7 * 3600);
        assert_eq!(
            parse_time_zone("-0530").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert_eq!(parse_time_zone("GMT+1").unwrap().local_minus_utc(), 3600);
        assert!(parse_time_zone("Mars/Olympus").is_err());
        assert!(parse_time_zone("+25:00").is_err());
        assert!(parse_time_zone("+1é1").is_err());
        assert!(parse_time_zone("-é").is_err());
    }

    #[test]
    fn test_parse_date_value_converts_instants() {
        let tz = parse_time_zone("-05:00").unwrap();
        let dt = parse_date_value("2025-01-22T03:00:00Z", &tz).unwrap();
        assert_eq!(dt.day(), 21);
        assert_eq!(dt.hour(), 22);
    }

    #[test]
    fn test_parse_date_value_naive_is_local() {
        let tz = parse_time_zone("+07:00").unwrap();
        let dt = parse_date_value("2025-01-22", &tz).unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-01-22T00:00:00+07:00");
    }

    #[test]
    fn test_parse_date_value_invalid() {
        assert!(matches!(
            parse_date_value("not a date", &utc()),
            Err(FormatError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_standard_patterns() {
        let dt = sample();
        let en = Locale::en_us();
        assert_eq!(format_date(&dt, "d", en).unwrap(), "1/22/2025");
        assert_eq!(format_date(&dt, "D", en).unwrap(), "Wednesday, January 22, 2025");
        assert_eq!(format_date(&dt, "s", en).unwrap(), "2025-01-22T09:05:03");
        assert_eq!(format_date(&dt, "t", en).unwrap(), "9:05 AM");
        assert_eq!(format_date(&dt, "Y", en).unwrap(), "January 2025");
        assert_eq!(format_date(&dt, "LongDate", en).unwrap(), "Wednesday, January 22, 2025");
        assert_eq!(format_date(&dt, "u", en).unwrap(), "2025-01-22 09:05:03Z");
    }

    #[test]
    fn test_standard_patterns_follow_locale() {
        let dt = sample();
        let gb = Locale::find("en-GB").unwrap();
        let de = Locale::find("de-DE").unwrap();
        assert_eq!(format_date(&dt, "d", gb).unwrap(), "22/01/2025");
        assert_eq!(format_date(&dt, "d", de).unwrap(), "22.01.2025");
    }

    #[test]
    fn test_custom_tokens() {
        let dt = sample();
        let en = Locale::en_us();
        assert_eq!(format_date(&dt, "yyyy/MM/dd", en).unwrap(), "2025/01/22");
        assert_eq!(format_date(&dt, "ddd dd MMM yy", en).unwrap(), "Wed 22 Jan 25");
        assert_eq!(format_date(&dt, "dddd MMMM", en).unwrap(), "Wednesday January");
        assert_eq!(format_date(&dt, "H:mm:ss", en).unwrap(), "9:05:03");
        assert_eq!(format_date(&dt, "hh:m:s t", en).unwrap(), "09:5:3 A");
        assert_eq!(format_date(&dt, "%d", en).unwrap(), "22");
        assert_eq!(format_date(&dt, "'Day' d", en).unwrap(), "Day 22");
    }

    #[test]
    fn test_offset_tokens() {
        let tz = parse_time_zone("+07:00").unwrap();
        let dt = parse_date_value("2025-01-22T09:05:03", &tz).unwrap();
        let en = Locale::en_us();
        assert_eq!(format_date(&dt, "z", en).unwrap(), "+7");
        assert_eq!(format_date(&dt, "zz", en).unwrap(), "+07");
        assert_eq!(format_date(&dt, "zzz", en).unwrap(), "+07:00");
    }

    #[test]
    fn test_pm_hours() {
        let dt = parse_date_value("2025-01-22T23:15:00", &utc()).unwrap();
        let en = Locale::en_us();
        assert_eq!(format_date(&dt, "h:mm tt", en).unwrap(), "11:15 PM");
        assert_eq!(format_date(&dt, "HH", en).unwrap(), "23");
    }

    #[test]
    fn test_unknown_single_letter() {
        let dt = sample();
        assert!(format_date(&dt, "q", Locale::en_us()).is_err());
    }
}
