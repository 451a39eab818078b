//! Render options, immutable render context, and warnings

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use text_format::{parse_date_value, parse_time_zone, FormatError, Locale};

use crate::{Result, TemplateError};

/// Cooperative cancellation flag shared between a caller and a render
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; in-flight renders stop at the next boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

/// Caller-supplied settings for one render
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Culture tag for number, currency, and date formatting
    pub locale: String,

    /// UTC offset used for date conversion (`UTC`, `+07:00`, ...)
    pub time_zone: String,

    /// Cap on filtered rows per table or list
    pub max_table_rows: Option<usize>,

    /// Value of `@Now` (the engine never reads the clock for it)
    pub now: Option<String>,

    /// Value of `@User`
    pub user: Value,

    /// Value of `@Metadata`
    pub metadata: Value,

    #[serde(skip)]
    pub deadline: Option<Instant>,

    #[serde(skip)]
    pub cancellation: Option<CancellationToken>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            time_zone: default_time_zone(),
            max_table_rows: None,
            now: None,
            user: Value::Null,
            metadata: Value::Null,
            deadline: None,
            cancellation: None,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    pub fn with_time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = time_zone.to_string();
        self
    }

    pub fn with_max_table_rows(mut self, max: usize) -> Self {
        self.max_table_rows = Some(max);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_now(mut self, now: &str) -> Self {
        self.now = Some(now.to_string());
        self
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = user;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Immutable ambient state threaded through a render
#[derive(Debug, Clone)]
pub struct RenderContext {
    locale: &'static Locale,
    requested_locale: Option<String>,
    time_zone: FixedOffset,
    now: Option<DateTime<FixedOffset>>,
    max_table_rows: Option<usize>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
    variables: Value,
}

impl RenderContext {
    /// Build a context from options
    ///
    /// Unknown locales fall back to `en-US`; see [`RenderContext::locale_fallback`].
    pub fn new(options: &RenderOptions) -> Result<Self> {
        let (locale, requested_locale) = match Locale::find(&options.locale) {
            Some(locale) => (locale, None),
            None => (Locale::en_us(), Some(options.locale.clone())),
        };

        let time_zone = parse_time_zone(&options.time_zone)
            .map_err(|e| TemplateError::InvalidOptions(e.to_string()))?;

        let now = options
            .now
            .as_deref()
            .map(|text| parse_date_value(text, &time_zone))
            .transpose()
            .map_err(|e| TemplateError::InvalidOptions(format!("now: {e}")))?;

        let variables = json!({
            "Now": now.map(|dt| dt.to_rfc3339()),
            "Today": now.map(|dt| dt.format("%Y-%m-%d").to_string()),
            "User": options.user,
            "Metadata": options.metadata,
            "Locale": locale.tag,
            "TimeZone": options.time_zone,
        });

        Ok(Self {
            locale,
            requested_locale,
            time_zone,
            now,
            max_table_rows: options.max_table_rows,
            deadline: options.deadline,
            cancellation: options.cancellation.clone(),
            variables,
        })
    }

    pub fn locale(&self) -> &'static Locale {
        self.locale
    }

    /// The requested locale tag when it was unknown and `en-US` was used
    pub fn locale_fallback(&self) -> Option<&str> {
        self.requested_locale.as_deref()
    }

    pub fn time_zone(&self) -> &FixedOffset {
        &self.time_zone
    }

    pub fn now(&self) -> Option<DateTime<FixedOffset>> {
        self.now
    }

    pub fn max_table_rows(&self) -> Option<usize> {
        self.max_table_rows
    }

    /// Values addressed by `@` paths
    pub fn variables(&self) -> &Value {
        &self.variables
    }

    /// Parse a date string in the render time zone
    pub fn parse_date(&self, text: &str) -> std::result::Result<DateTime<FixedOffset>, FormatError> {
        parse_date_value(text, &self.time_zone)
    }

    /// Whether the deadline passed or cancellation was requested
    pub fn is_expired(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with [`TemplateError::Cancelled`] when the render must stop
    pub fn check(&self, section_path: &str) -> Result<()> {
        if self.is_expired() {
            return Err(TemplateError::Cancelled {
                section_path: section_path.to_string(),
            });
        }
        Ok(())
    }
}

/// Category of a non-fatal render issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Value did not match its format; raw text was used
    Format,
    /// Non-numeric aggregation input counted as zero
    AggregationType,
    /// Rows beyond `maxTableRows` were dropped
    RowsTruncated,
    /// Unknown locale; `en-US` was used
    LocaleFallback,
}

/// Non-fatal issue attached to a successful render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderWarning {
    pub section_path: String,
    pub kind: WarningKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_options_from_json() {
        let options: RenderOptions = serde_json::from_str(
            r#"{ "locale": "de-DE", "timeZone": "+07:00", "maxTableRows": 50 }"#,
        )
        .unwrap();
        assert_eq!(options.locale, "de-DE");
        assert_eq!(options.time_zone, "+07:00");
        assert_eq!(options.max_table_rows, Some(50));
        assert!(options.deadline.is_none());

        let defaults: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.locale, "en-US");
        assert_eq!(defaults.time_zone, "UTC");
    }

    #[test]
    fn test_context_variables() {
        let options = RenderOptions::new()
            .with_time_zone("+07:00")
            .with_now("2025-01-21T20:00:00Z")
            .with_user(json!({ "Name": "Pat" }));
        let ctx = RenderContext::new(&options).unwrap();

        assert_eq!(ctx.variables()["Today"], json!("2025-01-22"));
        assert_eq!(ctx.variables()["Now"], json!("2025-01-22T03:00:00+07:00"));
        assert_eq!(ctx.variables()["User"]["Name"], json!("Pat"));
        assert_eq!(ctx.variables()["Locale"], json!("en-US"));
        assert!(ctx.locale_fallback().is_none());
    }

    #[test]
    fn test_without_now_nothing_is_read_from_the_clock() {
        let ctx = RenderContext::new(&RenderOptions::default()).unwrap();
        assert!(ctx.now().is_none());
        assert_eq!(ctx.variables()["Now"], Value::Null);
    }

    #[test]
    fn test_locale_fallback() {
        let ctx = RenderContext::new(&RenderOptions::new().with_locale("xx-XX")).unwrap();
        assert_eq!(ctx.locale().tag, "en-US");
        assert_eq!(ctx.locale_fallback(), Some("xx-XX"));
    }

    #[test]
    fn test_invalid_options() {
        let bad_zone = RenderContext::new(&RenderOptions::new().with_time_zone("Mars/Base"));
        assert!(matches!(bad_zone, Err(TemplateError::InvalidOptions(_))));

        let multibyte = RenderContext::new(&RenderOptions::new().with_time_zone("+1é1"));
        assert!(matches!(multibyte, Err(TemplateError::InvalidOptions(_))));

        let bad_now = RenderContext::new(&RenderOptions::new().with_now("yesterday"));
        assert!(matches!(bad_now, Err(TemplateError::InvalidOptions(_))));
    }

    #[test]
    fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = RenderContext::new(&RenderOptions::new().with_cancellation(token.clone())).unwrap();
        assert!(ctx.check("body").is_ok());

        token.cancel();
        let err = ctx.check("body").unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.section_path(), Some("body"));
    }

    #[test]
    fn test_expired_deadline() {
        let options = RenderOptions::new().with_deadline(Instant::now());
        let ctx = RenderContext::new(&options).unwrap();
        assert!(ctx.is_expired());
    }
}
