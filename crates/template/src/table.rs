//! Table aggregation: filter, sort, group, aggregate
//!
//! Rows flow through a fixed pipeline:
//!
//! 1. keep rows matching `where`
//! 2. stable sort by the composite key
//! 3. cap at `maxTableRows`
//! 4. split into runs of equal `groupBy` value (the leading sort key)
//! 5. compute aggregations per group and over all kept rows
//! 6. emit detail and total rows according to `groupMode` / `totalMode`

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use crate::condition::{ConditionCache, ConditionEvaluator, ConditionExpression};
use crate::context::{RenderContext, WarningKind};
use crate::format::{as_number, value_to_string, Comparable};
use crate::path::{collection_items, set_path, DataPath, Scope};
use crate::schema::{AggregateOp, GroupMode, SortDirection, SortKey, TableConfig, TotalMode};
use crate::{Result, TemplateError};

/// Decimal places kept in aggregation results
const RESULT_PRECISION: f64 = 1e10;

/// One emitted table row
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateRow<'a> {
    /// A source row
    Detail(&'a Value),
    /// Synthetic record closing a group: the group key plus aggregation targets
    GroupTotal { key: Value, record: Value },
    /// Synthetic record over every kept row
    GrandTotal { record: Value },
}

impl AggregateRow<'_> {
    /// The record columns resolve against
    pub fn record(&self) -> &Value {
        match self {
            AggregateRow::Detail(row) => row,
            AggregateRow::GroupTotal { record, .. } | AggregateRow::GrandTotal { record } => record,
        }
    }
}

/// Aggregator result with its non-fatal issues
#[derive(Debug, Default)]
pub struct AggregateOutput<'a> {
    pub rows: Vec<AggregateRow<'a>>,
    pub issues: Vec<(WarningKind, String)>,
}

/// Filtered, sorted, and capped collection items
#[derive(Debug, Default)]
pub struct Selection<'a> {
    pub rows: Vec<&'a Value>,
    pub issues: Vec<(WarningKind, String)>,
}

impl TableConfig {
    /// Check paths, conditions, and the grouping invariants
    pub fn validate(&self) -> Result<()> {
        DataPath::parse(&self.source_path)?;

        if self.columns.is_empty() {
            return Err(TemplateError::TableConfig(format!(
                "table over '{}' has no columns",
                self.source_path
            )));
        }
        for column in &self.columns {
            DataPath::parse(&column.path)?;
        }
        for key in &self.sort {
            DataPath::parse(&key.path)?;
        }
        if let Some(condition) = &self.where_condition {
            ConditionExpression::parse(condition)?;
        }

        match (&self.group_by, self.group_mode) {
            (None, GroupMode::None) => {}
            (None, mode) => {
                return Err(TemplateError::TableConfig(format!(
                    "groupMode {mode:?} requires groupBy"
                )));
            }
            (Some(group_by), _) => {
                DataPath::parse(group_by)?;
                let leading = self.sort.first().map(|key| key.path.trim());
                if leading != Some(group_by.trim()) {
                    return Err(TemplateError::TableConfig(format!(
                        "groupBy '{group_by}' must be the leading sort key"
                    )));
                }
            }
        }

        for aggregation in &self.aggregations {
            DataPath::parse(&aggregation.source_path)?;
            let target = DataPath::parse(&aggregation.target_path)?;
            if target.field_names().is_none() {
                return Err(TemplateError::TableConfig(format!(
                    "aggregation target '{}' must be a plain field path",
                    aggregation.target_path
                )));
            }
        }

        Ok(())
    }
}

/// Filter, stable-sort, and cap collection items
///
/// `where_condition` and sort keys resolve with each item as the current
/// scope. Cancellation is checked once per item.
pub fn select_rows<'a>(
    items: Vec<&'a Value>,
    where_condition: Option<&str>,
    sort: &[SortKey],
    scope: &Scope<'a>,
    ctx: &RenderContext,
    conditions: &ConditionCache,
    section_path: &str,
) -> Result<Selection<'a>> {
    let filter = where_condition
        .map(|source| conditions.get_or_compile(source))
        .transpose()?;
    let evaluator = ConditionEvaluator::new(ctx);

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        ctx.check(section_path)?;
        let keep = filter
            .as_ref()
            .map_or(true, |expr| evaluator.evaluate(expr, &scope.with_current(item)));
        if keep {
            rows.push(item);
        }
    }

    if !sort.is_empty() {
        let keys = sort
            .iter()
            .map(|key| Ok((DataPath::parse(&key.path)?, key.direction)))
            .collect::<Result<Vec<_>>>()?;

        let mut keyed: Vec<(Vec<Option<Comparable>>, &'a Value)> = rows
            .into_iter()
            .map(|row| {
                let row_scope = scope.with_current(row);
                let values = keys
                    .iter()
                    .map(|(path, _)| sort_key(path.resolve(&row_scope), ctx))
                    .collect();
                (values, row)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| {
            keys.iter()
                .zip(a.iter().zip(b.iter()))
                .map(|((_, direction), (x, y))| match direction {
                    SortDirection::Ascending => x.cmp(y),
                    SortDirection::Descending => y.cmp(x),
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    let mut issues = Vec::new();
    if let Some(max) = ctx.max_table_rows() {
        if rows.len() > max {
            issues.push((
                WarningKind::RowsTruncated,
                format!("kept {max} of {} rows", rows.len()),
            ));
            rows.truncate(max);
        }
    }

    Ok(Selection { rows, issues })
}

/// Run the full table pipeline over a resolved collection
pub fn aggregate<'a>(
    config: &TableConfig,
    source: Option<&'a Value>,
    scope: &Scope<'a>,
    ctx: &RenderContext,
    conditions: &ConditionCache,
    section_path: &str,
) -> Result<AggregateOutput<'a>> {
    config.validate()?;

    let Selection { rows, mut issues } = select_rows(
        collection_items(source),
        config.where_condition.as_deref(),
        &config.sort,
        scope,
        ctx,
        conditions,
        section_path,
    )?;

    let aggregator = Aggregator::new(config, scope)?;
    let mut output = Vec::new();

    match (&aggregator.group_by, config.group_mode) {
        (Some(group_path), GroupMode::SubTotal | GroupMode::Summary) => {
            for group in group_runs(&rows, group_path, scope, ctx) {
                let key = group_path
                    .resolve(&scope.with_current(group[0]))
                    .cloned()
                    .unwrap_or(Value::Null);
                if config.group_mode == GroupMode::SubTotal {
                    output.extend(group.iter().copied().map(AggregateRow::Detail));
                }
                let record = aggregator.record(group, Some(&key), &mut issues);
                output.push(AggregateRow::GroupTotal { key, record });
            }
        }
        _ => output.extend(rows.iter().copied().map(AggregateRow::Detail)),
    }

    if config.total_mode == TotalMode::Summary {
        let record = aggregator.record(&rows, None, &mut issues);
        output.push(AggregateRow::GrandTotal { record });
    }

    Ok(AggregateOutput {
        rows: output,
        issues,
    })
}

/// Consecutive runs of rows with equal group keys
fn group_runs<'r, 'a>(
    rows: &'r [&'a Value],
    group_path: &DataPath,
    scope: &Scope<'a>,
    ctx: &RenderContext,
) -> Vec<&'r [&'a Value]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        let boundary = i == rows.len() || {
            let previous = group_path.resolve(&scope.with_current(rows[i - 1]));
            let current = group_path.resolve(&scope.with_current(rows[i]));
            sort_key(previous, ctx) != sort_key(current, ctx)
        };
        if boundary && i > start {
            runs.push(&rows[start..i]);
            start = i;
        }
    }
    runs
}

/// Parsed aggregation plan
struct Aggregator<'c, 'a> {
    scope: Scope<'a>,
    group_by: Option<DataPath>,
    group_field: Option<Vec<String>>,
    steps: Vec<(AggregateOp, DataPath, Vec<String>)>,
    config: &'c TableConfig,
}

impl<'c, 'a> Aggregator<'c, 'a> {
    fn new(config: &'c TableConfig, scope: &Scope<'a>) -> Result<Self> {
        let group_by = config.group_by.as_deref().map(DataPath::parse).transpose()?;
        let group_field: Option<Vec<String>> = group_by
            .as_ref()
            .and_then(DataPath::field_names)
            .map(|names| names.into_iter().map(str::to_string).collect());

        let mut steps = Vec::with_capacity(config.aggregations.len());
        for aggregation in &config.aggregations {
            let source = DataPath::parse(&aggregation.source_path)?;
            let target = DataPath::parse(&aggregation.target_path)?;
            let names: Vec<String> = target
                .field_names()
                .map(|names| names.into_iter().map(str::to_string).collect())
                .ok_or_else(|| {
                    TemplateError::TableConfig(format!(
                        "aggregation target '{}' must be a plain field path",
                        aggregation.target_path
                    ))
                })?;
            steps.push((aggregation.op, source, names));
        }

        Ok(Self {
            scope: *scope,
            group_by,
            group_field,
            steps,
            config,
        })
    }

    /// Synthetic total record for a set of rows
    fn record(
        &self,
        rows: &[&'a Value],
        key: Option<&Value>,
        issues: &mut Vec<(WarningKind, String)>,
    ) -> Value {
        let mut record = Map::new();

        if let (Some(key), Some(names)) = (key, &self.group_field) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            set_path(&mut record, &names, key.clone());
        }

        for (op, source, target) in &self.steps {
            let value = self.compute(*op, source, rows, issues);
            let names: Vec<&str> = target.iter().map(String::as_str).collect();
            set_path(&mut record, &names, value);
        }

        Value::Object(record)
    }

    fn compute(
        &self,
        op: AggregateOp,
        source: &DataPath,
        rows: &[&'a Value],
        issues: &mut Vec<(WarningKind, String)>,
    ) -> Value {
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            match source.resolve(&self.scope.with_current(row)) {
                None | Some(Value::Null) => {}
                Some(value) => match as_number(value) {
                    Some(n) => values.push(n),
                    None => {
                        let message = format!(
                            "non-numeric value '{}' in '{}' counted as zero (source '{}')",
                            value_to_string(value),
                            source,
                            self.config.source_path
                        );
                        let issue = (WarningKind::AggregationType, message);
                        if !issues.contains(&issue) {
                            issues.push(issue);
                        }
                        values.push(0.0);
                    }
                },
            }
        }

        let result: Option<f64> = match op {
            AggregateOp::Sum => Some(values.iter().sum()),
            AggregateOp::Min => values.iter().copied().reduce(f64::min),
            AggregateOp::Max => values.iter().copied().reduce(f64::max),
            AggregateOp::Average => {
                (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        result.map_or(Value::Null, number_value)
    }
}

/// JSON number, integral when the rounded result has no fraction
fn number_value(n: f64) -> Value {
    let rounded = (n * RESULT_PRECISION).round() / RESULT_PRECISION;
    if rounded.fract() == 0.0 && rounded.abs() < 9.0e15 {
        return Value::from(rounded as i64);
    }
    Number::from_f64(rounded).map_or(Value::Null, Value::Number)
}

/// Sort key of a resolved value: absent and null sort before everything
fn sort_key(value: Option<&Value>, ctx: &RenderContext) -> Option<Comparable> {
    value
        .filter(|v| !v.is_null())
        .map(|v| Comparable::of(v, ctx))
}
