//! Field value formatting
//!
//! Every [`FieldFormat`] variant is handled by [`format_value`]. Formatting
//! never fails a render: callers use [`format_or_fallback`], which falls back
//! to the raw value text and hands back the error for a warning.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;
use text_format::{
    currency_to_words, format_currency, format_date, format_number, left_truncate,
    right_truncate, FormatError, WordCase,
};

use crate::context::RenderContext;
use crate::schema::{CurrencyMode, FieldFormat, FormatOptions};

/// Convert a JSON value to string for rendering
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Numeric reading of a value: numbers, or strings holding a finite number
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Boolean reading of a value
///
/// Accepts JSON booleans, `1`/`0`, and the strings `true/yes/y/1/on` and
/// `false/no/n/0/off` in any case.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" => Some(true),
            "false" | "no" | "n" | "0" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Comparison key shared by conditions and table sorting
///
/// A value reads as a number if it can, otherwise as a date in the render
/// time zone, otherwise as case-insensitive text. Keys of different kinds
/// order numbers before dates before text, so the order is total.
#[derive(Debug, Clone)]
pub enum Comparable {
    Number(f64),
    Date(DateTime<FixedOffset>),
    Text(String),
}

impl Comparable {
    pub fn of(value: &Value, ctx: &RenderContext) -> Self {
        if let Some(n) = as_number(value) {
            return Comparable::Number(n);
        }
        let text = value_to_string(value);
        if !text.trim().is_empty() {
            if let Ok(dt) = ctx.parse_date(&text) {
                return Comparable::Date(dt);
            }
        }
        Comparable::Text(text.to_lowercase())
    }

    fn rank(&self) -> u8 {
        match self {
            Comparable::Number(_) => 0,
            Comparable::Date(_) => 1,
            Comparable::Text(_) => 2,
        }
    }
}

impl Ord for Comparable {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // as_number only yields finite values
            (Comparable::Number(a), Comparable::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Comparable::Date(a), Comparable::Date(b)) => a.cmp(b),
            (Comparable::Text(a), Comparable::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Comparable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Comparable {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Comparable {}

/// Compare two values through their [`Comparable`] keys
pub fn compare_values(a: &Value, b: &Value, ctx: &RenderContext) -> Ordering {
    Comparable::of(a, ctx).cmp(&Comparable::of(b, ctx))
}

/// Whether a value counts as empty for formatting (absent, null, or blank)
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Format a resolved value
///
/// Empty values produce an empty string (or the boolean empty text) without
/// prepend/append text. Otherwise truncation is applied to the formatted
/// text first, then prepend/append.
pub fn format_value(
    value: Option<&Value>,
    format: &FieldFormat,
    options: &FormatOptions,
    ctx: &RenderContext,
) -> Result<String, FormatError> {
    let value = match value {
        Some(v) if !is_blank(Some(v)) => v,
        _ => {
            return Ok(match format {
                FieldFormat::Boolean { empty_text, .. } => empty_text.clone(),
                _ => String::new(),
            });
        }
    };

    let text = match format {
        FieldFormat::Attribute | FieldFormat::RichText => value_to_string(value),
        FieldFormat::Boolean {
            true_text,
            false_text,
            ..
        } => match parse_bool(value) {
            Some(true) => true_text.clone(),
            Some(false) => false_text.clone(),
            None => return Err(FormatError::NotBoolean(value_to_string(value))),
        },
        FieldFormat::Currency { mode, decimals } => {
            let amount = require_number(value)?;
            match mode {
                CurrencyMode::Standard => format_currency(amount, ctx.locale(), *decimals)?,
                CurrencyMode::WordsMixedCase => currency_to_words(amount, WordCase::Mixed)?,
                CurrencyMode::WordsUpperCase => currency_to_words(amount, WordCase::Upper)?,
                CurrencyMode::WordsLowerCase => currency_to_words(amount, WordCase::Lower)?,
            }
        }
        FieldFormat::Date { pattern } => {
            let dt = match value {
                Value::String(s) => ctx.parse_date(s)?,
                other => return Err(FormatError::InvalidDate(value_to_string(other))),
            };
            format_date(&dt, pattern, ctx.locale())?
        }
        FieldFormat::Number { pattern } => {
            format_number(pattern, require_number(value)?, ctx.locale())?
        }
    };

    Ok(apply_options(text, options))
}

/// Format a value, falling back to its raw text on a format mismatch
pub fn format_or_fallback(
    value: Option<&Value>,
    format: &FieldFormat,
    options: &FormatOptions,
    ctx: &RenderContext,
) -> (String, Option<FormatError>) {
    match format_value(value, format, options, ctx) {
        Ok(text) => (text, None),
        Err(err) => {
            let raw = value.map(value_to_string).unwrap_or_default();
            (apply_options(raw, options), Some(err))
        }
    }
}

fn require_number(value: &Value) -> Result<f64, FormatError> {
    as_number(value).ok_or_else(|| FormatError::NotNumeric(value_to_string(value)))
}

/// Truncate, then prepend/append
fn apply_options(text: String, options: &FormatOptions) -> String {
    let mut text = text;
    if let Some(count) = options.left_truncate {
        text = left_truncate(&text, count);
    }
    if let Some(count) = options.right_truncate {
        text = right_truncate(&text, count);
    }

    match (&options.prepend_text, &options.append_text) {
        (None, None) => text,
        (prefix, suffix) => format!(
            "{}{text}{}",
            prefix.as_deref().unwrap_or_default(),
            suffix.as_deref().unwrap_or_default()
        ),
    }
}

/// Piece of a text with `{{Path}}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextPiece<'t> {
    Literal(&'t str),
    Placeholder(&'t str),
}

/// Split text on `{{...}}` placeholders; an unclosed `{{` stays literal
pub fn split_placeholders(text: &str) -> Vec<TextPiece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        if open > 0 {
            pieces.push(TextPiece::Literal(&rest[..open]));
        }
        pieces.push(TextPiece::Placeholder(rest[open + 2..open + 2 + close].trim()));
        rest = &rest[open + 2 + close + 2..];
    }

    if !rest.is_empty() {
        pieces.push(TextPiece::Literal(rest));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RenderOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> RenderContext {
        RenderContext::new(&RenderOptions::default()).unwrap()
    }

    fn words(mode: CurrencyMode) -> FieldFormat {
        FieldFormat::Currency {
            mode,
            decimals: None,
        }
    }

    fn fmt(value: Value, format: &FieldFormat) -> Result<String, FormatError> {
        format_value(Some(&value), format, &FormatOptions::default(), &ctx())
    }

    #[test]
    fn test_currency_words() {
        assert_eq!(
            fmt(json!(300.00), &words(CurrencyMode::WordsLowerCase)).unwrap(),
            "three hundred dollars and zero cents"
        );
        assert_eq!(
            fmt(json!(0), &words(CurrencyMode::WordsMixedCase)).unwrap(),
            "Zero Dollars And Zero Cents"
        );
        assert_eq!(
            fmt(json!("1.01"), &words(CurrencyMode::WordsUpperCase)).unwrap(),
            "ONE DOLLAR AND ONE CENT"
        );
    }

    #[test]
    fn test_currency_standard() {
        assert_eq!(
            fmt(json!(1234.5), &words(CurrencyMode::Standard)).unwrap(),
            "$1,234.50"
        );
        let de = RenderContext::new(&RenderOptions::new().with_locale("de-DE")).unwrap();
        let text = format_value(
            Some(&json!(1234.5)),
            &words(CurrencyMode::Standard),
            &FormatOptions::default(),
            &de,
        )
        .unwrap();
        assert_eq!(text, "1.234,50 €");
    }

    #[test]
    fn test_number_and_date() {
        let number = FieldFormat::Number {
            pattern: "N2".to_string(),
        };
        assert_eq!(fmt(json!(1234567.891), &number).unwrap(), "1,234,567.89");

        let date = FieldFormat::Date {
            pattern: "dd MMM yyyy".to_string(),
        };
        assert_eq!(fmt(json!("2025-01-22"), &date).unwrap(), "22 Jan 2025");
        assert!(matches!(
            fmt(json!(20250122), &date),
            Err(FormatError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_boolean_texts() {
        let format = FieldFormat::Boolean {
            true_text: "Approved".to_string(),
            false_text: "Rejected".to_string(),
            empty_text: "Pending".to_string(),
        };
        assert_eq!(fmt(json!(true), &format).unwrap(), "Approved");
        assert_eq!(fmt(json!("no"), &format).unwrap(), "Rejected");
        assert_eq!(fmt(Value::Null, &format).unwrap(), "Pending");
        assert_eq!(
            format_value(None, &format, &FormatOptions::default(), &ctx()).unwrap(),
            "Pending"
        );
        assert!(matches!(fmt(json!("maybe"), &format), Err(FormatError::NotBoolean(_))));
    }

    #[test]
    fn test_truncate_before_affixes() {
        let options = FormatOptions {
            prepend_text: Some("#".to_string()),
            append_text: Some("!".to_string()),
            left_truncate: Some(4),
            right_truncate: Some(1),
        };
        let text =
            format_value(Some(&json!("INV-00042")), &FieldFormat::Attribute, &options, &ctx());
        assert_eq!(text.unwrap(), "#0004!");
    }

    #[test]
    fn test_truncation_longer_than_text_is_empty() {
        let options = FormatOptions {
            left_truncate: Some(50),
            ..FormatOptions::default()
        };
        let text = format_value(Some(&json!("short")), &FieldFormat::Attribute, &options, &ctx());
        assert_eq!(text.unwrap(), "");
    }

    #[test]
    fn test_empty_value_skips_affixes() {
        let options = FormatOptions {
            append_text: Some(" only".to_string()),
            ..FormatOptions::default()
        };
        let text = format_value(None, &words(CurrencyMode::WordsLowerCase), &options, &ctx());
        assert_eq!(text.unwrap(), "");
    }

    #[test]
    fn test_fallback_to_raw_text() {
        let options = FormatOptions {
            append_text: Some(" only".to_string()),
            ..FormatOptions::default()
        };
        let (text, err) = format_or_fallback(
            Some(&json!("TBD")),
            &words(CurrencyMode::Standard),
            &options,
            &ctx(),
        );
        assert_eq!(text, "TBD only");
        assert_eq!(err, Some(FormatError::NotNumeric("TBD".to_string())));
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(as_number(&json!(" 12.5 ")), Some(12.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(parse_bool(&json!("Yes")), Some(true));
        assert_eq!(parse_bool(&json!(0)), Some(false));
        assert_eq!(parse_bool(&json!("x")), None);
    }

    #[test]
    fn test_oversized_number_falls_back() {
        let number = FieldFormat::Number {
            pattern: "N2".to_string(),
        };
        let (_, err) =
            format_or_fallback(Some(&json!(1e40)), &number, &FormatOptions::default(), &ctx());
        assert_eq!(err, Some(FormatError::OutOfRange(1e40)));
    }

    #[test]
    fn test_comparable_tiers() {
        let ctx = ctx();
        let cmp = |a: Value, b: Value| compare_values(&a, &b, &ctx);

        assert_eq!(cmp(json!("1500.00"), json!(1500)), Ordering::Equal);
        assert_eq!(cmp(json!("9/1/2024"), json!("10/1/2024")), Ordering::Less);
        assert_eq!(cmp(json!("1/15/2025"), json!("2024-12-31")), Ordering::Greater);
        assert_eq!(cmp(json!("Apple"), json!("apple")), Ordering::Equal);

        // numbers < dates < text whatever the text holds
        assert_eq!(cmp(json!(10), json!("1a")), Ordering::Less);
        assert_eq!(cmp(json!(9), json!("1a")), Ordering::Less);
        assert_eq!(cmp(json!("2025-01-01"), json!("1a")), Ordering::Less);
        assert_eq!(cmp(json!(99999), json!("2025-01-01")), Ordering::Less);
    }

    #[test]
    fn test_split_placeholders() {
        assert_eq!(
            split_placeholders("Change Order {{ Number }} for {{Owner.Name}}"),
            vec![
                TextPiece::Literal("Change Order "),
                TextPiece::Placeholder("Number"),
                TextPiece::Literal(" for "),
                TextPiece::Placeholder("Owner.Name"),
            ]
        );
        assert_eq!(
            split_placeholders("open {{ brace"),
            vec![TextPiece::Literal("open {{ brace")]
        );
    }
}
