//! Number and currency formatting

use crate::locale::{CurrencyPosition, Locale};
use crate::{FormatError, Result};

/// Upper bound on fraction digits a format code may request
const MAX_PRECISION: u8 = 15;

/// Format a number with a format code or picture pattern
///
/// Supported codes (case-insensitive, optional precision digits):
/// - `F` / `F#` - fixed point, default 2 decimals
/// - `N` / `N#` - fixed point with group separators
/// - `D` / `D#` - integer zero-padded to `#` digits
/// - `C` / `C#` - locale currency
/// - `P` / `P#` - percent (value multiplied by 100)
/// - `G` or empty - shortest round-trip representation
///
/// Anything else containing `#` or `0` is treated as a picture pattern
/// such as `#,###.##`: `,` in the integer part turns on grouping, `0`s
/// set a minimum digit count, and `#`/`0` after the `.` set the decimals.
///
/// # Examples
/// ```
/// use text_format::{format_number, Locale};
/// let en = Locale::en_us();
/// assert_eq!(format_number("F3", 2.5, en).unwrap(), "2.500");
/// assert_eq!(format_number("N0", 1234567.0, en).unwrap(), "1,234,567");
/// assert_eq!(format_number("D5", 42.0, en).unwrap(), "00042");
/// ```
pub fn format_number(pattern: &str, n: f64, locale: &Locale) -> Result<String> {
    if !n.is_finite() {
        return Err(FormatError::OutOfRange(n));
    }

    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(general(n, locale));
    }

    if let Some((code, digits)) = split_code(pattern) {
        let group = Some(locale.group_separator);
        let decimal = locale.decimal_separator;
        return match code {
            'G' => Ok(general(n, locale)),
            'F' => fixed(n, digits.unwrap_or(2), None, decimal, 1),
            'N' => fixed(n, digits.unwrap_or(2), group, decimal, 1),
            'D' => {
                if n.fract() != 0.0 {
                    return Err(FormatError::NotIntegral(n));
                }
                let width = digits.unwrap_or(1).max(1) as usize;
                fixed(n, 0, None, decimal, width)
            }
            'C' => format_currency(n, locale, digits),
            'P' => {
                let body = fixed(n * 100.0, digits.unwrap_or(2), group, decimal, 1)?;
                Ok(format!("{body}%"))
            }
            _ => Err(FormatError::UnknownFormat(pattern.to_string())),
        };
    }

    if pattern.contains(['#', '0']) {
        return render_picture(pattern, n, locale);
    }

    Err(FormatError::UnknownFormat(pattern.to_string()))
}

/// Format an amount in the locale's currency
///
/// # Examples
/// ```
/// use text_format::{format_currency, Locale};
/// assert_eq!(format_currency(-1234.5, Locale::en_us(), None).unwrap(), "-$1,234.50");
/// ```
pub fn format_currency(amount: f64, locale: &Locale, decimals: Option<u8>) -> Result<String> {
    if !amount.is_finite() {
        return Err(FormatError::OutOfRange(amount));
    }

    let precision = decimals.unwrap_or(locale.currency_decimals);
    let body = fixed(
        amount.abs(),
        precision,
        Some(locale.group_separator),
        locale.decimal_separator,
        1,
    )?;
    let negative = amount < 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };

    Ok(match locale.currency_position {
        CurrencyPosition::Prefix => format!("{sign}{}{body}", locale.currency_symbol),
        CurrencyPosition::SuffixSpaced => format!("{sign}{body} {}", locale.currency_symbol),
    })
}

/// Picture pattern such as `#,###.##` with the locale's separators
fn render_picture(format: &str, n: f64, locale: &Locale) -> Result<String> {
    let (int_pattern, frac_pattern) = match format.rfind('.') {
        Some(pos) => (&format[..pos], &format[pos + 1..]),
        None => (format, ""),
    };

    let precision = frac_pattern
        .chars()
        .filter(|c| *c == '#' || *c == '0')
        .count()
        .min(MAX_PRECISION as usize) as u8;
    let group = int_pattern
        .contains(',')
        .then_some(locale.group_separator);
    let min_digits = int_pattern.chars().filter(|c| *c == '0').count().max(1);

    fixed(n, precision, group, locale.decimal_separator, min_digits)
}

/// Split `N2` into `('N', Some(2))`; `None` if not a letter code
fn split_code(pattern: &str) -> Option<(char, Option<u8>)> {
    let mut chars = pattern.chars();
    let code = chars.next()?.to_ascii_uppercase();
    if !code.is_ascii_alphabetic() {
        return None;
    }

    let rest = chars.as_str();
    if rest.is_empty() {
        return Some((code, None));
    }
    if !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: u8 = rest.parse().ok()?;
    Some((code, Some(digits.min(MAX_PRECISION))))
}

/// Shortest representation, integers without a fraction
fn general(n: f64, locale: &Locale) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let text = n.to_string();
    if locale.decimal_separator == '.' {
        text
    } else {
        text.replace('.', &locale.decimal_separator.to_string())
    }
}

/// Fixed-point rendering, rounding half away from zero
///
/// Fails with [`FormatError::OutOfRange`] when the scaled value does not fit
/// in a `u128`.
fn fixed(
    n: f64,
    precision: u8,
    group: Option<char>,
    decimal: char,
    min_digits: usize,
) -> Result<String> {
    let precision = precision.min(MAX_PRECISION);
    let scale = 10u128.pow(precision as u32);
    let scaled = (n.abs() * scale as f64).round();
    if !scaled.is_finite() || scaled >= u128::MAX as f64 {
        return Err(FormatError::OutOfRange(n));
    }
    let scaled = scaled as u128;
    let int_part = scaled / scale;
    let frac_part = scaled % scale;

    let mut digits = int_part.to_string();
    if digits.len() < min_digits {
        digits = format!("{digits:0>min_digits$}");
    }

    let mut out = String::new();
    if n < 0.0 && scaled > 0 {
        out.push('-');
    }
    match group {
        Some(sep) => out.push_str(&group_digits(&digits, sep)),
        None => out.push_str(&digits),
    }
    if precision > 0 {
        out.push(decimal);
        out.push_str(&format!("{:0>width$}", frac_part, width = precision as usize));
    }
    Ok(out)
}

/// Insert a separator every three digits from the right
fn group_digits(digits: &str, sep: char) -> String {
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(sep);
        }
        result.push(c);
    }
    result
}
