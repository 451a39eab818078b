//! WASM bindings for docbind
//!
//! This crate provides JavaScript-friendly API for:
//! - Loading and validating document templates
//! - Rendering templates against entity data into content blocks
//! - Number, currency, and date formatting helpers
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { DocumentTemplate, TextFormatter } from 'docbind-wasm';
//!
//! await init();
//!
//! const template = DocumentTemplate.fromJson(templateJson);
//! const output = template.render(
//!   { Number: "CO-7", Amount: 300 },
//!   { locale: "en-US", timeZone: "+07:00", maxTableRows: 500 },
//! );
//! // output.blocks, output.warnings
//!
//! TextFormatter.currencyWords(300, "lower"); // "three hundred dollars and zero cents"
//! ```

use serde::Serialize;
use template::{ConditionCache, RenderOptions, Template, TemplateRenderer, TextContent};
use text_format::WordCase;
use wasm_bindgen::prelude::*;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Render options from a JS object; `undefined` or `null` gives the defaults
fn render_options(options: JsValue) -> Result<RenderOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        return Ok(RenderOptions::default());
    }
    Ok(serde_wasm_bindgen::from_value(options)?)
}

/// Number, currency, and date formatting utilities
#[wasm_bindgen]
pub struct TextFormatter;

#[wasm_bindgen]
impl TextFormatter {
    /// Format a number with a code (`N2`, `F0`, `P1`) or pattern (`#,###.##`)
    ///
    /// @param pattern - Format code or pattern
    /// @param n - Number to format
    /// @param locale - Culture tag (e.g., "de-DE")
    #[wasm_bindgen(js_name = formatNumber)]
    pub fn format_number(pattern: &str, n: f64, locale: &str) -> Result<String, JsValue> {
        text_format::TextFormatter::number(pattern, n, locale).map_err(js_error)
    }

    /// Format an amount in the locale's currency
    ///
    /// @returns Currency text (e.g., "$1,234.50")
    #[wasm_bindgen(js_name = formatCurrency)]
    pub fn format_currency(amount: f64, locale: &str) -> Result<String, JsValue> {
        text_format::TextFormatter::currency(amount, locale).map_err(js_error)
    }

    /// Spell out a currency amount
    ///
    /// @param amount - Amount in dollars
    /// @param case - "mixed", "upper", or "lower"
    /// @returns Words (e.g., "One Dollar And One Cent")
    #[wasm_bindgen(js_name = currencyWords)]
    pub fn currency_words(amount: f64, case: &str) -> Result<String, JsValue> {
        let case = match case.to_ascii_lowercase().as_str() {
            "mixed" => WordCase::Mixed,
            "upper" => WordCase::Upper,
            "lower" => WordCase::Lower,
            other => return Err(JsValue::from_str(&format!("unknown word case '{other}'"))),
        };
        text_format::TextFormatter::currency_words(amount, case).map_err(js_error)
    }

    /// Format a date string
    ///
    /// @param value - ISO-8601 date or date-time
    /// @param pattern - Standard code ("d", "D", "g") or custom pattern ("dd MMM yyyy")
    /// @param locale - Culture tag
    /// @param timeZone - "UTC" or a fixed offset such as "+07:00"
    #[wasm_bindgen(js_name = formatDate)]
    pub fn format_date(
        value: &str,
        pattern: &str,
        locale: &str,
        time_zone: &str,
    ) -> Result<String, JsValue> {
        text_format::TextFormatter::date(value, pattern, locale, time_zone).map_err(js_error)
    }
}

/// Parsed and validated document template
#[wasm_bindgen]
pub struct DocumentTemplate {
    template: Template,
    conditions: ConditionCache,
}

#[wasm_bindgen]
impl DocumentTemplate {
    /// Create template from JSON
    ///
    /// Paths, conditions, and table configurations are checked here, so a
    /// malformed template fails before any data is bound.
    ///
    /// @param json - Template JSON string
    /// @returns DocumentTemplate instance
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(json: &str) -> Result<DocumentTemplate, JsValue> {
        let template = template::parse_template(json).map_err(js_error)?;
        Ok(DocumentTemplate {
            template,
            conditions: ConditionCache::new(),
        })
    }

    /// Template name, if set
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> Option<String> {
        self.template.name.clone()
    }

    /// Render with data
    ///
    /// @param data - Entity data object
    /// @param options - Optional render options (`locale`, `timeZone`, `maxTableRows`, `now`, `user`, `metadata`)
    /// @returns `{ blocks, warnings }`
    pub fn render(&self, data: JsValue, options: JsValue) -> Result<JsValue, JsValue> {
        let data: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
        let options = render_options(options)?;

        let output = TemplateRenderer::new(&self.template)
            .with_condition_cache(&self.conditions)
            .render(&data, &options)
            .map_err(js_error)?;

        Ok(output.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?)
    }

    /// Render with data and return the plain text of every block
    #[wasm_bindgen(js_name = renderText)]
    pub fn render_text(&self, data: JsValue, options: JsValue) -> Result<String, JsValue> {
        let data: serde_json::Value = serde_wasm_bindgen::from_value(data)?;
        let options = render_options(options)?;

        let output = TemplateRenderer::new(&self.template)
            .with_condition_cache(&self.conditions)
            .render(&data, &options)
            .map_err(js_error)?;

        Ok(output.get_text().unwrap_or_default())
    }
}

/// Culture tags with dedicated formatting conventions
#[wasm_bindgen(js_name = supportedLocales)]
pub fn supported_locales() -> js_sys::Array {
    text_format::Locale::supported().map(JsValue::from_str).collect()
}

/// JSON schema for template documents
#[wasm_bindgen(js_name = templateSchema)]
pub fn template_schema() -> String {
    template::TEMPLATE_SCHEMA.to_string()
}
