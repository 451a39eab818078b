//! Formatter facade and text truncation

use crate::locale::Locale;
use crate::words::{currency_to_words, number_to_words, WordCase};
use crate::{date, number, Result};

/// Text formatting utilities keyed by culture tag
///
/// Unknown culture tags format with `en-US` conventions.
pub struct TextFormatter;

impl TextFormatter {
    /// Spell out an integer in lowercase English
    pub fn number_words(n: u64) -> String {
        number_to_words(n)
    }

    /// Spell out a currency amount
    pub fn currency_words(amount: f64, case: WordCase) -> Result<String> {
        currency_to_words(amount, case)
    }

    /// Format a number with a code such as `N2` or a pattern such as `#,###.##`
    pub fn number(pattern: &str, n: f64, locale: &str) -> Result<String> {
        number::format_number(pattern, n, resolve_locale(locale))
    }

    /// Format an amount in the locale's currency
    pub fn currency(amount: f64, locale: &str) -> Result<String> {
        number::format_currency(amount, resolve_locale(locale), None)
    }

    /// Parse a date string and format it in the given time zone
    pub fn date(value: &str, pattern: &str, locale: &str, time_zone: &str) -> Result<String> {
        let tz = date::parse_time_zone(time_zone)?;
        let dt = date::parse_date_value(value, &tz)?;
        date::format_date(&dt, pattern, resolve_locale(locale))
    }
}

fn resolve_locale(tag: &str) -> &'static Locale {
    Locale::find(tag).unwrap_or_else(Locale::en_us)
}

/// Drop `count` characters from the start of `text`
///
/// Dropping at least as many characters as the text holds yields an empty
/// string.
pub fn left_truncate(text: &str, count: usize) -> String {
    text.chars().skip(count).collect()
}

/// Drop `count` characters from the end of `text`
pub fn right_truncate(text: &str, count: usize) -> String {
    let len = text.chars().count();
    text.chars().take(len.saturating_sub(count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_truncate() {
        assert_eq!(left_truncate("INV-00042", 4), "00042");
        assert_eq!(left_truncate("abc", 0), "abc");
        assert_eq!(left_truncate("abc", 3), "");
        assert_eq!(left_truncate("abc", 10), "");
    }

    #[test]
    fn test_right_truncate() {
        assert_eq!(right_truncate("2025-01-22", 6), "2025");
        assert_eq!(right_truncate("abc", 10), "");
        assert_eq!(right_truncate("ราคา", 1), "ราค");
    }

    #[test]
    fn test_facade() {
        assert_eq!(TextFormatter::number_words(42), "forty two");
        assert_eq!(TextFormatter::number("N2", 1234.5, "en-US").unwrap(), "1,234.50");
        assert_eq!(TextFormatter::currency(10.0, "en-GB").unwrap(), "£10.00");
        assert_eq!(TextFormatter::currency(10.0, "xx-XX").unwrap(), "$10.00");
        assert_eq!(
            TextFormatter::date("2025-01-22", "yyyy-MM-dd", "en-US", "UTC").unwrap(),
            "2025-01-22"
        );
    }
}
