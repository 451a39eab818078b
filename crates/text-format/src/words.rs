//! English number and currency spelling

use crate::{FormatError, Result};

/// Number names below twenty
const ONES: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

/// Tens names (index = tens digit)
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Scale words for each group of three digits
const SCALES: [&str; 7] = [
    "",
    "thousand",
    "million",
    "billion",
    "trillion",
    "quadrillion",
    "quintillion",
];

/// Largest absolute amount that can be spelled with cent precision
const MAX_SPELLED_AMOUNT: f64 = 1e15;

/// Letter case applied to spelled-out amounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WordCase {
    /// "Three Hundred Dollars And Zero Cents"
    #[default]
    Mixed,
    /// "THREE HUNDRED DOLLARS AND ZERO CENTS"
    Upper,
    /// "three hundred dollars and zero cents"
    Lower,
}

impl WordCase {
    /// Apply the case transform to lowercase words
    pub fn apply(self, text: &str) -> String {
        match self {
            WordCase::Lower => text.to_lowercase(),
            WordCase::Upper => text.to_uppercase(),
            WordCase::Mixed => text
                .split(' ')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Spell out a non-negative integer in lowercase English
///
/// # Examples
/// ```
/// use text_format::number_to_words;
/// assert_eq!(number_to_words(0), "zero");
/// assert_eq!(number_to_words(21), "twenty one");
/// assert_eq!(number_to_words(1_002_003), "one million two thousand three");
/// ```
pub fn number_to_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut groups = Vec::new();
    let mut rest = n;
    let mut scale = 0;

    while rest > 0 {
        let chunk = (rest % 1000) as usize;
        if chunk > 0 {
            let words = hundreds_to_words(chunk);
            if SCALES[scale].is_empty() {
                groups.push(words);
            } else {
                groups.push(format!("{words} {}", SCALES[scale]));
            }
        }
        rest /= 1000;
        scale += 1;
    }

    groups.reverse();
    groups.join(" ")
}

/// Spell out 1..=999
fn hundreds_to_words(n: usize) -> String {
    let mut parts = Vec::new();
    let hundreds = n / 100;
    let rest = n % 100;

    if hundreds > 0 {
        parts.push(format!("{} hundred", ONES[hundreds]));
    }

    if rest >= 20 {
        let tens = TENS[rest / 10];
        if rest % 10 > 0 {
            parts.push(format!("{tens} {}", ONES[rest % 10]));
        } else {
            parts.push(tens.to_string());
        }
    } else if rest > 0 {
        parts.push(ONES[rest].to_string());
    }

    parts.join(" ")
}

/// Spell out a currency amount as dollars and cents
///
/// Cents are rounded half away from zero. The whole-dollar part always
/// renders, so amounts under a dollar read "zero dollars and ...".
///
/// # Examples
/// ```
/// use text_format::{currency_to_words, WordCase};
/// assert_eq!(
///     currency_to_words(1250.05, WordCase::Mixed).unwrap(),
///     "One Thousand Two Hundred Fifty Dollars And Five Cents"
/// );
/// ```
pub fn currency_to_words(amount: f64, case: WordCase) -> Result<String> {
    if !amount.is_finite() || amount.abs() >= MAX_SPELLED_AMOUNT {
        return Err(FormatError::OutOfRange(amount));
    }

    let total_cents = (amount.abs() * 100.0).round() as u64;
    let dollars = total_cents / 100;
    let cents = total_cents % 100;

    let mut text = String::new();
    if amount < 0.0 && total_cents > 0 {
        text.push_str("negative ");
    }
    text.push_str(&number_to_words(dollars));
    text.push_str(if dollars == 1 { " dollar" } else { " dollars" });
    text.push_str(" and ");
    text.push_str(&number_to_words(cents));
    text.push_str(if cents == 1 { " cent" } else { " cents" });

    Ok(case.apply(&text))
}
