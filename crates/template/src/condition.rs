//! Condition expressions
//!
//! Two dialects compile into one [`ConditionExpression`] tree:
//!
//! - single condition: `Path Operator [Value]`, e.g. `Status Equals Approved`
//!   or `Retainage IsNotNull`
//! - nested groups: `AllOf(cond; cond; ...)` and `AnyOf(...)`, nestable
//!
//! Values may be double-quoted to keep spaces or separators
//! (`Title Contains "Phase 2; East"`). A value starting with `$.` or `@` is a
//! path resolved in the same scope as the left-hand side.
//!
//! Compiled trees are memoized by source string in a [`ConditionCache`].

use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use tracing::trace;

use crate::context::RenderContext;
use crate::format::{compare_values, parse_bool, value_to_string};
use crate::path::{DataPath, Scope, NULL};
use crate::{Result, TemplateError};

/// Comparison operator of a condition leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    DoesNotEqual,
    Contains,
    DoesNotContain,
    In,
    ContainedIn,
    NotContainedIn,
    IsGreaterThan,
    IsGreaterThanOrEqualTo,
    IsLessThan,
    IsLessThanOrEqualTo,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,
    IsTrue,
    IsFalse,
}

impl Operator {
    const ALL: [Operator; 17] = [
        Operator::Equals,
        Operator::DoesNotEqual,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::In,
        Operator::ContainedIn,
        Operator::NotContainedIn,
        Operator::IsGreaterThan,
        Operator::IsGreaterThanOrEqualTo,
        Operator::IsLessThan,
        Operator::IsLessThanOrEqualTo,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::IsTrue,
        Operator::IsFalse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Equals => "Equals",
            Operator::DoesNotEqual => "DoesNotEqual",
            Operator::Contains => "Contains",
            Operator::DoesNotContain => "DoesNotContain",
            Operator::In => "In",
            Operator::ContainedIn => "ContainedIn",
            Operator::NotContainedIn => "NotContainedIn",
            Operator::IsGreaterThan => "IsGreaterThan",
            Operator::IsGreaterThanOrEqualTo => "IsGreaterThanOrEqualTo",
            Operator::IsLessThan => "IsLessThan",
            Operator::IsLessThanOrEqualTo => "IsLessThanOrEqualTo",
            Operator::IsEmpty => "IsEmpty",
            Operator::IsNotEmpty => "IsNotEmpty",
            Operator::IsNull => "IsNull",
            Operator::IsNotNull => "IsNotNull",
            Operator::IsTrue => "IsTrue",
            Operator::IsFalse => "IsFalse",
        }
    }

    /// Operators that take no value
    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::IsEmpty
                | Operator::IsNotEmpty
                | Operator::IsNull
                | Operator::IsNotNull
                | Operator::IsTrue
                | Operator::IsFalse
        )
    }
}

impl FromStr for Operator {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let symbol = match s {
            "=" | "==" => Some(Operator::Equals),
            "!=" | "<>" => Some(Operator::DoesNotEqual),
            ">" => Some(Operator::IsGreaterThan),
            ">=" => Some(Operator::IsGreaterThanOrEqualTo),
            "<" => Some(Operator::IsLessThan),
            "<=" => Some(Operator::IsLessThanOrEqualTo),
            _ => None,
        };
        symbol
            .or_else(|| {
                Operator::ALL
                    .into_iter()
                    .find(|op| op.name().eq_ignore_ascii_case(s))
            })
            .ok_or(())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Right-hand side of a condition leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Path(DataPath),
}

/// Compiled condition tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpression {
    Leaf {
        path: DataPath,
        operator: Operator,
        value: Option<Operand>,
    },
    AllOf(Vec<ConditionExpression>),
    AnyOf(Vec<ConditionExpression>),
}

impl ConditionExpression {
    /// Compile a condition string
    pub fn parse(source: &str) -> Result<Self> {
        parse_expression(source.trim(), source)
    }
}

impl FromStr for ConditionExpression {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self> {
        ConditionExpression::parse(s)
    }
}

fn parse_error(source: &str, message: impl Into<String>) -> TemplateError {
    TemplateError::ConditionParse {
        expression: source.to_string(),
        message: message.into(),
    }
}

fn parse_expression(text: &str, source: &str) -> Result<ConditionExpression> {
    if text.is_empty() {
        return Err(parse_error(source, "empty condition"));
    }

    if let Some((all, body)) = group_body(text, source)? {
        let children = split_top_level(body)
            .into_iter()
            .map(|child| parse_expression(child.trim(), source))
            .collect::<Result<Vec<_>>>()?;
        return Ok(if all {
            ConditionExpression::AllOf(children)
        } else {
            ConditionExpression::AnyOf(children)
        });
    }

    parse_leaf(text, source)
}

/// `AllOf( ... )` / `AnyOf( ... )`: returns `(is_all, inner text)`
fn group_body<'t>(text: &'t str, source: &str) -> Result<Option<(bool, &'t str)>> {
    let keyword = text.get(..5).unwrap_or_default();
    let all = if keyword.eq_ignore_ascii_case("allof") {
        true
    } else if keyword.eq_ignore_ascii_case("anyof") {
        false
    } else {
        return Ok(None);
    };

    let rest = text[5..].trim_start();
    let Some(inner) = rest.strip_prefix('(') else {
        return Ok(None);
    };

    let close = matching_paren(inner).ok_or_else(|| parse_error(source, "unbalanced parentheses"))?;
    if !inner[close + 1..].trim().is_empty() {
        return Err(parse_error(source, "unexpected text after ')'"));
    }

    let body = &inner[..close];
    if body.trim().is_empty() {
        let name = if all { "AllOf" } else { "AnyOf" };
        return Err(parse_error(source, format!("{name} group is empty")));
    }
    Ok(Some((all, body)))
}

/// Byte offset of the `)` closing an already-opened group
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Split on `;` outside quotes and nested parentheses
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ';' if !quoted && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn parse_leaf(text: &str, source: &str) -> Result<ConditionExpression> {
    if text.contains([')', '(']) && !text.contains('"') {
        return Err(parse_error(source, "unbalanced parentheses"));
    }

    let (path, rest) = split_token(text);
    let (operator_text, value_text) = split_token(rest);

    if operator_text.is_empty() {
        return Err(parse_error(source, format!("missing operator after '{path}'")));
    }
    let operator: Operator = operator_text
        .parse()
        .map_err(|_| parse_error(source, format!("unknown operator '{operator_text}'")))?;

    let path = DataPath::parse(path)?;
    let value = value_text.trim();

    let value = match (operator.is_unary(), value.is_empty()) {
        (true, true) => None,
        (true, false) => {
            return Err(parse_error(source, format!("{operator} does not take a value")));
        }
        (false, true) => {
            return Err(parse_error(source, format!("{operator} requires a value")));
        }
        (false, false) => Some(parse_operand(value, source)?),
    };

    Ok(ConditionExpression::Leaf {
        path,
        operator,
        value,
    })
}

fn split_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

fn parse_operand(text: &str, source: &str) -> Result<Operand> {
    if let Some(inner) = text.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| parse_error(source, "unterminated quoted value"))?;
        return Ok(Operand::Literal(inner.to_string()));
    }
    if text.starts_with("$.") || text.starts_with('@') {
        return Ok(Operand::Path(DataPath::parse(text)?));
    }
    Ok(Operand::Literal(text.to_string()))
}

/// Memo table of compiled conditions keyed by source string
///
/// Entries are inserted once and never replaced, so concurrent renders may
/// share one cache freely.
#[derive(Debug, Default)]
pub struct ConditionCache {
    entries: DashMap<String, Arc<ConditionExpression>>,
}

impl ConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by renderers without their own
    pub fn shared() -> &'static ConditionCache {
        static SHARED: OnceLock<ConditionCache> = OnceLock::new();
        SHARED.get_or_init(ConditionCache::new)
    }

    /// Compiled form of `source`, compiling it on first use
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<ConditionExpression>> {
        if let Some(entry) = self.entries.get(source) {
            return Ok(Arc::clone(entry.value()));
        }

        let compiled = Arc::new(ConditionExpression::parse(source)?);
        trace!(condition = source, "compiled condition");

        let entry = self.entries.entry(source.to_string()).or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates compiled conditions within a render context
pub struct ConditionEvaluator<'c> {
    ctx: &'c RenderContext,
}

impl<'c> ConditionEvaluator<'c> {
    pub fn new(ctx: &'c RenderContext) -> Self {
        Self { ctx }
    }

    /// Evaluate an expression; groups short-circuit
    pub fn evaluate(&self, expr: &ConditionExpression, scope: &Scope<'_>) -> bool {
        match expr {
            ConditionExpression::AllOf(children) => {
                children.iter().all(|child| self.evaluate(child, scope))
            }
            ConditionExpression::AnyOf(children) => {
                children.iter().any(|child| self.evaluate(child, scope))
            }
            ConditionExpression::Leaf {
                path,
                operator,
                value,
            } => self.evaluate_leaf(path.resolve(scope), *operator, value.as_ref(), scope),
        }
    }

    fn evaluate_leaf(
        &self,
        left: Option<&Value>,
        operator: Operator,
        operand: Option<&Operand>,
        scope: &Scope<'_>,
    ) -> bool {
        let literal;
        let right: Option<&Value> = match operand {
            Some(Operand::Literal(text)) => {
                literal = Value::String(text.clone());
                Some(&literal)
            }
            Some(Operand::Path(path)) => path.resolve(scope),
            None => None,
        };
        let present = left.filter(|v| !v.is_null());

        match operator {
            Operator::IsNull => present.is_none(),
            Operator::IsNotNull => present.is_some(),
            Operator::IsEmpty => is_empty(left),
            Operator::IsNotEmpty => !is_empty(left),
            Operator::IsTrue => present.and_then(parse_bool) == Some(true),
            Operator::IsFalse => present.and_then(parse_bool) != Some(true),
            Operator::Equals => self.compare(left, right) == Ordering::Equal,
            Operator::DoesNotEqual => self.compare(left, right) != Ordering::Equal,
            Operator::Contains => contains(left, right),
            Operator::DoesNotContain => !contains(left, right),
            Operator::In => list_items(right)
                .iter()
                .any(|item| self.compare(left, Some(item)) == Ordering::Equal),
            Operator::ContainedIn => self.contained_in(present, right),
            Operator::NotContainedIn => !self.contained_in(present, right),
            Operator::IsGreaterThan => {
                present.is_some() && self.compare(left, right) == Ordering::Greater
            }
            Operator::IsGreaterThanOrEqualTo => {
                present.is_some() && self.compare(left, right) != Ordering::Less
            }
            Operator::IsLessThan => present.is_some() && self.compare(left, right) == Ordering::Less,
            Operator::IsLessThanOrEqualTo => {
                present.is_some() && self.compare(left, right) != Ordering::Greater
            }
        }
    }

    /// Numeric, then date, then case-insensitive text comparison
    ///
    /// Absent and null read as the empty string.
    fn compare(&self, left: Option<&Value>, right: Option<&Value>) -> Ordering {
        compare_values(left.unwrap_or(&NULL), right.unwrap_or(&NULL), self.ctx)
    }

    /// Every item of the left value appears in the right-hand list
    fn contained_in(&self, left: Option<&Value>, right: Option<&Value>) -> bool {
        let items = list_items(left);
        if items.is_empty() {
            return false;
        }
        let allowed = list_items(right);
        items.iter().all(|item| {
            allowed
                .iter()
                .any(|candidate| self.compare(Some(item), Some(candidate)) == Ordering::Equal)
        })
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Case-insensitive substring, or membership for arrays
fn contains(left: Option<&Value>, right: Option<&Value>) -> bool {
    let needle = right.map(value_to_string).unwrap_or_default().to_lowercase();
    match left {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| value_to_string(item).to_lowercase() == needle),
        Some(other) => value_to_string(other).to_lowercase().contains(&needle),
    }
}

/// Array items, or the trimmed entries of a comma-separated string
fn list_items(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
        Some(other) => vec![other.clone()],
    }
}
