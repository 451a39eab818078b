//! Section rendering
//!
//! Walks the section tree in order and emits [`RenderBlock`]s. Every section
//! boundary and every table/list row checks the deadline and cancellation
//! token. Fatal errors carry the section path reached, e.g.
//! `body/lines[2]/part:Signature/sig`.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::blocks::{
    Branch, ConditionalBlock, FieldValue, HeadingBlock, PageBreakBlock, ParagraphBlock,
    RenderBlock, RenderOutput, RowKind, TableBlock, TableColumn, TableRow,
};
use crate::condition::{ConditionCache, ConditionEvaluator};
use crate::context::{RenderContext, RenderOptions, RenderWarning, WarningKind};
use crate::format::{format_or_fallback, split_placeholders, value_to_string, TextPiece};
use crate::parser::validate_template_with;
use crate::path::{collection_items, resolve_correlated, DataPath, Scope, NULL};
use crate::schema::{
    ConditionalSection, FieldFormat, FieldMapping, ListSection, PartSection, Section,
    TableSection, Template, TemplatePart,
};
use crate::table::{aggregate, select_rows, AggregateRow};
use crate::{Result, TemplateError};

/// Template renderer
pub struct TemplateRenderer<'a> {
    template: &'a Template,
    conditions: &'a ConditionCache,
    parts: HashMap<&'a str, &'a TemplatePart>,
}

/// Mutable state owned by one render call
struct RenderState<'c> {
    ctx: &'c RenderContext,
    warnings: Vec<RenderWarning>,
    /// Section ids (and row/part markers) from the root to the current section
    path: Vec<String>,
    /// Names of the template parts being expanded
    expanding: Vec<String>,
}

impl RenderState<'_> {
    fn section_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            if !out.is_empty() && !segment.starts_with('[') {
                out.push('/');
            }
            out.push_str(segment);
        }
        out
    }

    fn warn(&mut self, kind: WarningKind, message: String) {
        let section_path = self.section_path();
        warn!(section = %section_path, kind = ?kind, "{message}");
        self.warnings.push(RenderWarning {
            section_path,
            kind,
            message,
        });
    }
}

impl<'a> TemplateRenderer<'a> {
    /// Create a new renderer using the process-wide condition cache
    pub fn new(template: &'a Template) -> Self {
        let parts = template
            .parts
            .iter()
            .map(|part| (part.name.as_str(), part))
            .collect();
        Self {
            template,
            conditions: ConditionCache::shared(),
            parts,
        }
    }

    /// Use a dedicated condition cache
    pub fn with_condition_cache(mut self, cache: &'a ConditionCache) -> Self {
        self.conditions = cache;
        self
    }

    /// Render the template against entity data
    ///
    /// The template is expected to have passed load-time validation
    /// ([`crate::parse_template`] or [`Template::render`]).
    pub fn render(&self, data: &Value, options: &RenderOptions) -> Result<RenderOutput> {
        let ctx = RenderContext::new(options)?;
        debug!(
            template = self.template.name.as_deref().unwrap_or_default(),
            sections = self.template.sections.len(),
            locale = ctx.locale().tag,
            "render started"
        );

        let mut state = RenderState {
            ctx: &ctx,
            warnings: Vec::new(),
            path: Vec::new(),
            expanding: Vec::new(),
        };

        if let Some(requested) = ctx.locale_fallback() {
            state.warn(
                WarningKind::LocaleFallback,
                format!("unknown locale '{requested}', using en-US"),
            );
        }

        let scope = Scope::new(data, ctx.variables());
        let blocks = self.render_sections(&self.template.sections, &scope, &mut state)?;

        debug!(
            blocks = blocks.len(),
            warnings = state.warnings.len(),
            "render finished"
        );

        Ok(RenderOutput {
            blocks,
            warnings: state.warnings,
        })
    }

    fn render_sections(
        &self,
        sections: &[Section],
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<RenderBlock>> {
        let mut blocks = Vec::new();
        for section in sections {
            state.path.push(section.id().to_string());
            let result = self.render_section(section, scope, state);
            let section_path = state.section_path();
            state.path.pop();
            blocks.extend(result.map_err(|e| e.in_section(&section_path))?);
        }
        Ok(blocks)
    }

    fn render_section(
        &self,
        section: &Section,
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<RenderBlock>> {
        state.ctx.check(&state.section_path())?;

        if let Some(guard) = section.visible_when() {
            if !self.condition(guard, scope, state.ctx)? {
                return Ok(Vec::new());
            }
        }

        let block = match section {
            Section::Header(s) => RenderBlock::Heading(HeadingBlock {
                section_id: s.id.clone(),
                level: s.level,
                text: s
                    .title
                    .as_deref()
                    .map(|title| interpolate(title, scope))
                    .transpose()?,
                fields: self.bind_fields(&s.fields, scope, state)?,
                style: s.style.clone(),
            }),
            Section::Detail(s) => RenderBlock::Paragraph(ParagraphBlock {
                section_id: s.id.clone(),
                text: None,
                fields: self.bind_fields(&s.fields, scope, state)?,
                style: s.style.clone(),
            }),
            Section::Text(s) => RenderBlock::Paragraph(ParagraphBlock {
                section_id: s.id.clone(),
                text: Some(interpolate(&s.text, scope)?),
                fields: Vec::new(),
                style: s.style.clone(),
            }),
            Section::PageBreak(s) => RenderBlock::PageBreak(PageBreakBlock {
                section_id: s.id.clone(),
                style: s.style.clone(),
            }),
            Section::Table(s) => RenderBlock::Table(self.render_table(s, scope, state)?),
            Section::Conditional(s) => match self.render_conditional(s, scope, state)? {
                Some(block) => RenderBlock::ConditionalChoice(block),
                None => return Ok(Vec::new()),
            },
            Section::List(s) => return self.render_list(s, scope, state),
            Section::Part(s) => return self.render_part(s, scope, state),
        };

        Ok(vec![block])
    }

    fn condition(&self, source: &str, scope: &Scope<'_>, ctx: &RenderContext) -> Result<bool> {
        let expr = self.conditions.get_or_compile(source)?;
        Ok(ConditionEvaluator::new(ctx).evaluate(&expr, scope))
    }

    /// Exactly one branch, or nothing when the guard fails without `else`
    fn render_conditional(
        &self,
        section: &ConditionalSection,
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Option<ConditionalBlock>> {
        let (branch, sections) = if self.condition(&section.condition, scope, state.ctx)? {
            (Branch::Then, &section.then_sections)
        } else {
            match &section.else_sections {
                Some(sections) => (Branch::Else, sections),
                None => return Ok(None),
            }
        };

        Ok(Some(ConditionalBlock {
            section_id: section.id.clone(),
            branch,
            blocks: self.render_sections(sections, scope, state)?,
        }))
    }

    fn render_table(
        &self,
        section: &TableSection,
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<TableBlock> {
        let config = &section.table;
        let section_path = state.section_path();
        let source = DataPath::parse(&config.source_path)?.resolve(scope);

        let output = aggregate(config, source, scope, state.ctx, self.conditions, &section_path)?;
        for (kind, message) in output.issues {
            state.warn(kind, message);
        }

        let rows = self.table_rows(section, &output.rows, scope, state)?;

        Ok(TableBlock {
            section_id: section.id.clone(),
            columns: config
                .columns
                .iter()
                .map(|column| TableColumn {
                    header: column.header.clone(),
                    path: column.path.clone(),
                    align: column.align,
                })
                .collect(),
            rows,
            style: section.style.clone(),
        })
    }

    /// Format aggregated rows into cells, checking cancellation per row
    fn table_rows(
        &self,
        section: &TableSection,
        rows: &[AggregateRow<'_>],
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<TableRow>> {
        let config = &section.table;
        let section_path = state.section_path();
        let columns = config
            .columns
            .iter()
            .map(|column| DataPath::parse(&column.path))
            .collect::<Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            state.ctx.check(&section_path)?;
            let row_scope = scope.with_current(row.record());
            let (kind, group) = match row {
                AggregateRow::Detail(_) => (RowKind::Detail, None),
                AggregateRow::GroupTotal { key, .. } => {
                    (RowKind::GroupTotal, Some(value_to_string(key)))
                }
                AggregateRow::GrandTotal { .. } => (RowKind::GrandTotal, None),
            };

            let mut cells = Vec::with_capacity(columns.len());
            for (column, path) in config.columns.iter().zip(&columns) {
                let value = path.resolve(&row_scope);
                let default = match (kind, value) {
                    (RowKind::Detail, None | Some(Value::Null)) => column.default_value.clone(),
                    _ => None,
                };
                let text = match default {
                    Some(text) => text,
                    None => {
                        let (text, error) = format_or_fallback(
                            value,
                            &column.format,
                            &column.format_options,
                            state.ctx,
                        );
                        if let Some(err) = error {
                            state.warn(WarningKind::Format, format!("column '{}': {err}", column.path));
                        }
                        text
                    }
                };
                cells.push(text);
            }

            out.push(TableRow { kind, group, cells });
        }

        Ok(out)
    }

    /// Child sections once per selected item, scoped to the item
    fn render_list(
        &self,
        section: &ListSection,
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<RenderBlock>> {
        let source = DataPath::parse(&section.source_path)?.resolve(scope);
        let selection = select_rows(
            collection_items(source),
            section.where_condition.as_deref(),
            &section.sort,
            scope,
            state.ctx,
            self.conditions,
            &state.section_path(),
        )?;
        for (kind, message) in selection.issues {
            state.warn(kind, message);
        }

        let mut blocks = Vec::new();
        for (i, item) in selection.rows.into_iter().enumerate() {
            state.path.push(format!("[{}]", i + 1));
            let result = self.render_sections(&section.sections, &scope.with_current(item), state);
            state.path.pop();
            blocks.extend(result?);
        }
        Ok(blocks)
    }

    /// Expand a template part in place, guarding against reference cycles
    fn render_part(
        &self,
        section: &PartSection,
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<RenderBlock>> {
        let name = section.part.as_str();
        if state.expanding.iter().any(|open| open == name) {
            let mut chain = state.expanding.clone();
            chain.push(name.to_string());
            return Err(TemplateError::PartCycle(chain.join(" -> ")));
        }

        let part = self
            .parts
            .get(name)
            .ok_or_else(|| TemplateError::PartNotFound(name.to_string()))?;

        let root = match &section.path {
            Some(path) => DataPath::parse(path)?.resolve(scope).unwrap_or(&NULL),
            None => scope.current,
        };

        state.expanding.push(name.to_string());
        state.path.push(format!("part:{name}"));
        let result = self.render_sections(&part.sections, &scope.with_current(root), state);
        state.path.pop();
        state.expanding.pop();
        result
    }

    fn bind_fields(
        &self,
        fields: &[FieldMapping],
        scope: &Scope<'_>,
        state: &mut RenderState<'_>,
    ) -> Result<Vec<FieldValue>> {
        let mut values = Vec::with_capacity(fields.len());

        for field in fields {
            if let Some(guard) = &field.condition {
                if !self.condition(guard, scope, state.ctx)? {
                    continue;
                }
            }

            let value = self.resolve_field(field, scope, state.ctx)?;
            let text = match (value, &field.default_value) {
                (None | Some(Value::Null), Some(default)) => default.clone(),
                _ => {
                    let (text, error) =
                        format_or_fallback(value, &field.format, &field.format_options, state.ctx);
                    if let Some(err) = error {
                        state.warn(WarningKind::Format, format!("field '{}': {err}", field.path));
                    }
                    text
                }
            };

            values.push(FieldValue {
                label: field.label.clone(),
                path: field.path.clone(),
                value: text,
                rich_text: matches!(field.format, FieldFormat::RichText),
            });
        }

        Ok(values)
    }

    /// Value of a field: a correlated lookup, or the path guarded by `where`
    fn resolve_field<'d>(
        &self,
        field: &FieldMapping,
        scope: &Scope<'d>,
        ctx: &RenderContext,
    ) -> Result<Option<&'d Value>> {
        let path = DataPath::parse(&field.path)?;

        let Some(lookup) = &field.lookup else {
            if let Some(filter) = &field.where_condition {
                if !self.condition(filter, scope, ctx)? {
                    return Ok(None);
                }
            }
            return Ok(path.resolve(scope));
        };

        let collection = DataPath::parse(&lookup.collection)?;
        let having = self.conditions.get_or_compile(&lookup.having)?;
        let filter = field
            .where_condition
            .as_deref()
            .map(|source| self.conditions.get_or_compile(source))
            .transpose()?;
        let evaluator = ConditionEvaluator::new(ctx);

        Ok(resolve_correlated(&collection, &path, scope, |child| {
            let child_scope = scope.with_current(child);
            evaluator.evaluate(&having, &child_scope)
                && filter
                    .as_ref()
                    .map_or(true, |expr| evaluator.evaluate(expr, &child_scope))
        }))
    }
}

/// Replace `{{Path}}` placeholders with raw value text
fn interpolate(text: &str, scope: &Scope<'_>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    for piece in split_placeholders(text) {
        match piece {
            TextPiece::Literal(literal) => out.push_str(literal),
            TextPiece::Placeholder(path) => {
                if let Some(value) = DataPath::parse(path)?.resolve(scope) {
                    out.push_str(&value_to_string(value));
                }
            }
        }
    }
    Ok(out)
}

impl Template {
    /// Validate, then render with the process-wide condition cache
    pub fn render(&self, data: &Value, options: &RenderOptions) -> Result<RenderOutput> {
        validate_template_with(self, ConditionCache::shared())?;
        TemplateRenderer::new(self).render(data, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::TextContent;
    use crate::context::CancellationToken;
    use crate::schema::{
        AggregateOp, Aggregation, ColumnDef, CurrencyMode, GroupMode, SortKey, TableConfig,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn render(template: &Template, data: &Value) -> RenderOutput {
        let cache = ConditionCache::new();
        TemplateRenderer::new(template)
            .with_condition_cache(&cache)
            .render(data, &RenderOptions::default())
            .unwrap()
    }

    fn contract() -> Value {
        json!({
            "Number": "CO-7",
            "Amount": 300,
            "Approved": true,
            "Owner": { "Name": "Acme" },
            "Contacts": [
                { "Role": "PM", "Name": "Kim", "Path": null },
                { "Role": "Signatory", "Name": "Lee", "Path": "ok.png" }
            ]
        })
    }

    #[test]
    fn test_header_and_text_interpolation() {
        let mut template = Template::new("CO");
        template
            .insert_header("title", "Change Order {{Number}}", 1)
            .insert_text("intro", "Owner: {{Owner.Name}}{{Missing}}");

        let output = render(&template, &contract());
        assert_eq!(output.blocks.len(), 2);
        assert_eq!(output.blocks[0].get_text(), Some("Change Order CO-7".to_string()));
        assert_eq!(output.blocks[1].get_text(), Some("Owner: Acme".to_string()));
    }

    #[test]
    fn test_detail_fields() {
        let mut template = Template::new("CO");
        template.insert_fields(
            "summary",
            vec![
                FieldMapping::new("Amount").with_label("Amount").with_format(FieldFormat::Currency {
                    mode: CurrencyMode::WordsLowerCase,
                    decimals: None,
                }),
                FieldMapping::new("Retainage").with_label("Retainage").with_default("N/A"),
                FieldMapping::new("Owner.Name").with_condition("Approved IsFalse"),
            ],
        );

        let output = render(&template, &contract());
        assert_eq!(
            output.blocks[0].get_text(),
            Some("Amount: three hundred dollars and zero cents\nRetainage: N/A".to_string())
        );
    }

    #[test]
    fn test_correlated_lookup_field() {
        let mut template = Template::new("CO");
        template.insert_fields(
            "signature",
            vec![
                FieldMapping::new("Name")
                    .with_lookup("Contacts", "Role Equals Signatory")
                    .with_where("Path IsNotNull"),
                FieldMapping::new("Name")
                    .with_lookup("Contacts", "Role Equals PM")
                    .with_where("Path IsNotNull")
                    .with_default("none"),
            ],
        );

        let output = render(&template, &contract());
        match &output.blocks[0] {
            RenderBlock::Paragraph(p) => {
                assert_eq!(p.fields[0].value, "Lee");
                assert_eq!(p.fields[1].value, "none");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn test_where_without_lookup_guards_value() {
        let mut template = Template::new("CO");
        template.insert_fields(
            "owner",
            vec![FieldMapping::new("Owner.Name")
                .with_where("Approved IsFalse")
                .with_default("-")],
        );
        let output = render(&template, &contract());
        assert_eq!(output.blocks[0].get_text(), Some("-".to_string()));
    }

    #[test]
    fn test_format_mismatch_warns() {
        let mut template = Template::new("CO");
        template.insert_fields(
            "amount",
            vec![FieldMapping::new("Number").with_format(FieldFormat::Number {
                pattern: "N2".to_string(),
            })],
        );
        let output = render(&template, &contract());
        assert_eq!(output.blocks[0].get_text(), Some("CO-7".to_string()));
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].kind, WarningKind::Format);
        assert_eq!(output.warnings[0].section_path, "amount");
    }

    #[test]
    fn test_table_section() {
        let mut config = TableConfig::new(
            "Lines",
            vec![
                ColumnDef::new("Type", "Type"),
                ColumnDef::new("Amount", "V").with_format(FieldFormat::Number {
                    pattern: "N0".to_string(),
                }),
            ],
        );
        config.sort = vec![SortKey::ascending("Type")];
        config.group_by = Some("Type".to_string());
        config.group_mode = GroupMode::SubTotal;
        config.aggregations = vec![Aggregation::new(AggregateOp::Sum, "V", "V")];

        let mut template = Template::new("CO");
        template.insert_table("lines", config);

        let data = json!({ "Lines": [
            { "Type": "A", "V": 1000 },
            { "Type": "B", "V": 50 },
            { "Type": "A", "V": 2000 }
        ]});
        let output = render(&template, &data);
        match &output.blocks[0] {
            RenderBlock::Table(table) => {
                let cells: Vec<Vec<&str>> = table
                    .rows
                    .iter()
                    .map(|r| r.cells.iter().map(String::as_str).collect())
                    .collect();
                assert_eq!(
                    cells,
                    vec![
                        vec!["A", "1,000"],
                        vec!["A", "2,000"],
                        vec!["A", "3,000"],
                        vec!["B", "50"],
                        vec!["B", "50"],
                    ]
                );
                assert_eq!(table.rows[2].kind, RowKind::GroupTotal);
                assert_eq!(table.rows[2].group.as_deref(), Some("A"));
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_part_cycle_is_reported() {
        let mut template = Template::new("CO");
        template.insert_part_ref("body", "A", None);
        template.add_part(
            "A",
            vec![Section::Part(PartSection {
                id: "toB".to_string(),
                part: "B".to_string(),
                path: None,
                style: None,
                visible_when: None,
            })],
        );
        template.add_part(
            "B",
            vec![Section::Part(PartSection {
                id: "toA".to_string(),
                part: "A".to_string(),
                path: None,
                style: None,
                visible_when: None,
            })],
        );

        let cache = ConditionCache::new();
        let err = TemplateRenderer::new(&template)
            .with_condition_cache(&cache)
            .render(&contract(), &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::PartCycle(chain) if chain == "A -> B -> A"));
        assert_eq!(err.section_path(), Some("body/part:A/toB/part:B/toA"));
    }

    #[test]
    fn test_missing_part() {
        let mut template = Template::new("CO");
        template.insert_part_ref("sig", "Signature", None);
        let cache = ConditionCache::new();
        let err = TemplateRenderer::new(&template)
            .with_condition_cache(&cache)
            .render(&contract(), &RenderOptions::default())
            .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::PartNotFound(_)));
        assert_eq!(err.section_path(), Some("sig"));
    }

    #[test]
    fn test_cancelled_render() {
        let mut template = Template::new("CO");
        template.insert_text("intro", "hello");
        let token = CancellationToken::new();
        token.cancel();
        let err = TemplateRenderer::new(&template)
            .render(&contract(), &RenderOptions::new().with_cancellation(token))
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.section_path(), Some("intro"));
    }

    #[test]
    fn test_cancelled_between_table_rows() {
        let template = Template::new("CO");
        let renderer = TemplateRenderer::new(&template);
        let section = TableSection {
            id: "lines".to_string(),
            table: TableConfig::new("Lines", vec![ColumnDef::new("Type", "Type")]),
            style: None,
            visible_when: None,
        };
        let data = json!({ "Lines": [{ "Type": "A" }, { "Type": "B" }] });

        let token = CancellationToken::new();
        let ctx = RenderContext::new(&RenderOptions::new().with_cancellation(token.clone())).unwrap();
        let scope = Scope::new(&data, ctx.variables());
        let output = aggregate(
            &section.table,
            data.get("Lines"),
            &scope,
            &ctx,
            renderer.conditions,
            "lines",
        )
        .unwrap();
        assert_eq!(output.rows.len(), 2);

        // rows were selected, then the caller gave up before formatting
        token.cancel();
        let mut state = RenderState {
            ctx: &ctx,
            warnings: Vec::new(),
            path: vec!["lines".to_string()],
            expanding: Vec::new(),
        };
        let err = renderer
            .table_rows(&section, &output.rows, &scope, &mut state)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.section_path(), Some("lines"));
    }

    #[test]
    fn test_locale_fallback_warning() {
        let template = Template::new("CO");
        let output = TemplateRenderer::new(&template)
            .render(&contract(), &RenderOptions::new().with_locale("tlh"))
            .unwrap();
        assert_eq!(output.warnings[0].kind, WarningKind::LocaleFallback);
    }
}
