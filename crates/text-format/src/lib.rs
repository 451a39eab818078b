//! Text Format - value formatting for document templates
//!
//! This crate provides:
//! - English number and currency spelling ("three hundred dollars and zero cents")
//! - Number format codes (`F2`, `N0`, `D5`, `C`, `P1`) and `#,###.##` patterns
//! - Locale-aware separators and currency symbols
//! - Date parsing, standard date patterns and custom date tokens
//! - Left/right truncation
//!
//! # Example
//!
//! ```
//! use text_format::{currency_to_words, format_number, Locale, WordCase};
//!
//! let words = currency_to_words(300.0, WordCase::Lower).unwrap();
//! assert_eq!(words, "three hundred dollars and zero cents");
//!
//! let text = format_number("N2", 1234.5, Locale::en_us()).unwrap();
//! assert_eq!(text, "1,234.50");
//! ```

mod date;
mod formatter;
mod locale;
mod number;
mod words;

pub use date::{format_date, parse_date_value, parse_time_zone};
pub use formatter::{left_truncate, right_truncate, TextFormatter};
pub use locale::{CurrencyPosition, Locale};
pub use number::{format_currency, format_number};
pub use words::{currency_to_words, number_to_words, WordCase};

use thiserror::Error;

/// Errors that can occur while formatting a value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("Value is not numeric: {0}")]
    NotNumeric(String),

    #[error("Value is not an integer: {0}")]
    NotIntegral(f64),

    #[error("Value is out of range: {0}")]
    OutOfRange(f64),

    #[error("Value is not a date: {0}")]
    InvalidDate(String),

    #[error("Value is not a boolean: {0}")]
    NotBoolean(String),

    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),
}

/// Result type for formatting operations
pub type Result<T> = std::result::Result<T, FormatError>;
