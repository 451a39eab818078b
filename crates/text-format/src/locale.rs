//! Locale conventions for numbers, currency, and dates

/// Where the currency symbol goes relative to the amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencyPosition {
    /// "$1,234.56"
    Prefix,
    /// "1.234,56 €"
    SuffixSpaced,
}

/// Formatting conventions for a culture tag such as `en-US`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    /// Culture tag
    pub tag: &'static str,
    pub decimal_separator: char,
    pub group_separator: char,
    pub currency_symbol: &'static str,
    pub currency_position: CurrencyPosition,
    /// Default fraction digits for currency
    pub currency_decimals: u8,
    /// Replaces `/` in custom date patterns
    pub date_separator: &'static str,
    /// Custom pattern behind the `d` standard format
    pub short_date: &'static str,
    /// Custom pattern behind the `D` standard format
    pub long_date: &'static str,
    /// Custom pattern behind the `t` standard format
    pub short_time: &'static str,
    /// Custom pattern behind the `T` standard format
    pub long_time: &'static str,
}

static EN_US: Locale = Locale {
    tag: "en-US",
    decimal_separator: '.',
    group_separator: ',',
    currency_symbol: "$",
    currency_position: CurrencyPosition::Prefix,
    currency_decimals: 2,
    date_separator: "/",
    short_date: "M/d/yyyy",
    long_date: "dddd, MMMM d, yyyy",
    short_time: "h:mm tt",
    long_time: "h:mm:ss tt",
};

static EN_GB: Locale = Locale {
    tag: "en-GB",
    decimal_separator: '.',
    group_separator: ',',
    currency_symbol: "£",
    currency_position: CurrencyPosition::Prefix,
    currency_decimals: 2,
    date_separator: "/",
    short_date: "dd/MM/yyyy",
    long_date: "dd MMMM yyyy",
    short_time: "HH:mm",
    long_time: "HH:mm:ss",
};

static DE_DE: Locale = Locale {
    tag: "de-DE",
    decimal_separator: ',',
    group_separator: '.',
    currency_symbol: "€",
    currency_position: CurrencyPosition::SuffixSpaced,
    currency_decimals: 2,
    date_separator: ".",
    short_date: "dd/MM/yyyy",
    long_date: "dddd, d. MMMM yyyy",
    short_time: "HH:mm",
    long_time: "HH:mm:ss",
};

static FR_FR: Locale = Locale {
    tag: "fr-FR",
    decimal_separator: ',',
    group_separator: '\u{202f}',
    currency_symbol: "€",
    currency_position: CurrencyPosition::SuffixSpaced,
    currency_decimals: 2,
    date_separator: "/",
    short_date: "dd/MM/yyyy",
    long_date: "dddd d MMMM yyyy",
    short_time: "HH:mm",
    long_time: "HH:mm:ss",
};

static TH_TH: Locale = Locale {
    tag: "th-TH",
    decimal_separator: '.',
    group_separator: ',',
    currency_symbol: "฿",
    currency_position: CurrencyPosition::Prefix,
    currency_decimals: 2,
    date_separator: "/",
    short_date: "d/M/yyyy",
    long_date: "d MMMM yyyy",
    short_time: "H:mm",
    long_time: "H:mm:ss",
};

static LOCALES: [&Locale; 5] = [&EN_US, &EN_GB, &DE_DE, &FR_FR, &TH_TH];

impl Locale {
    /// US English conventions (the fallback locale)
    pub fn en_us() -> &'static Locale {
        &EN_US
    }

    /// Look up a locale by culture tag (case-insensitive, `_` accepted for `-`)
    pub fn find(tag: &str) -> Option<&'static Locale> {
        let normalized = tag.trim().replace('_', "-");
        LOCALES
            .iter()
            .copied()
            .find(|locale| locale.tag.eq_ignore_ascii_case(&normalized))
    }

    /// Supported culture tags
    pub fn supported() -> impl Iterator<Item = &'static str> {
        LOCALES.iter().map(|locale| locale.tag)
    }
}

impl Default for Locale {
    fn default() -> Self {
        EN_US.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_locale() {
        assert_eq!(Locale::find("en-US").map(|l| l.tag), Some("en-US"));
        assert_eq!(Locale::find("de_de").map(|l| l.tag), Some("de-DE"));
        assert!(Locale::find("xx-YY").is_none());
    }

    #[test]
    fn test_default_is_en_us() {
        assert_eq!(Locale::default().tag, "en-US");
        assert_eq!(Locale::supported().count(), 5);
    }
}
