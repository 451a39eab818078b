//! Template JSON parsing and load-time validation

use std::collections::HashSet;

use crate::condition::ConditionCache;
use crate::format::{split_placeholders, TextPiece};
use crate::path::DataPath;
use crate::schema::{FieldMapping, Section, Template};
use crate::{Result, TemplateError};

/// Parse a template from JSON string and validate it
pub fn parse_template(json: &str) -> Result<Template> {
    let template: Template =
        serde_json::from_str(json).map_err(|e| TemplateError::ParseError(e.to_string()))?;
    validate_template(&template)?;
    Ok(template)
}

/// Validate a template, compiling its conditions into the shared cache
pub fn validate_template(template: &Template) -> Result<()> {
    validate_template_with(template, ConditionCache::shared())
}

/// Validate a template, compiling its conditions into `conditions`
///
/// Checks:
/// - section ids are present and unique within the main tree and each part
/// - paths, conditions, and `{{Path}}` placeholders parse
/// - table configurations are consistent (see [`crate::TableConfig::validate`])
/// - part names are unique, referenced parts exist, and parts do not
///   reference each other in a cycle
/// - no table or list appears inside a list, directly or through a part
pub fn validate_template_with(template: &Template, conditions: &ConditionCache) -> Result<()> {
    let validator = Validator {
        template,
        conditions,
    };

    let mut names = HashSet::new();
    for part in &template.parts {
        if !names.insert(part.name.as_str()) {
            return Err(TemplateError::InvalidTemplate(format!(
                "duplicate template part '{}'",
                part.name
            )));
        }
    }

    validator.sections(&template.sections, "", &mut HashSet::new(), None)?;
    for part in &template.parts {
        let prefix = format!("part:{}", part.name);
        validator.sections(&part.sections, &prefix, &mut HashSet::new(), None)?;
    }

    let mut done = HashSet::new();
    for part in &template.parts {
        validator.part_cycles(&part.name, &mut Vec::new(), &mut done)?;
    }

    Ok(())
}

struct Validator<'t> {
    template: &'t Template,
    conditions: &'t ConditionCache,
}

impl<'t> Validator<'t> {
    fn sections(
        &self,
        sections: &[Section],
        prefix: &str,
        ids: &mut HashSet<String>,
        container: Option<&str>,
    ) -> Result<()> {
        for section in sections {
            let path = if prefix.is_empty() {
                section.id().to_string()
            } else {
                format!("{prefix}/{}", section.id())
            };
            self.section(section, &path, ids, container)
                .map_err(|e| e.in_section(&path))?;
        }
        Ok(())
    }

    fn section(
        &self,
        section: &Section,
        path: &str,
        ids: &mut HashSet<String>,
        container: Option<&str>,
    ) -> Result<()> {
        let id = section.id();
        if id.trim().is_empty() {
            return Err(TemplateError::InvalidTemplate("section id is empty".to_string()));
        }
        if !ids.insert(id.to_string()) {
            return Err(TemplateError::InvalidTemplate(format!(
                "duplicate section id '{id}'"
            )));
        }

        if let Some(list) = container {
            let nested = match section {
                Section::Table(_) | Section::List(_) => true,
                Section::Part(s) => self.contains_container(
                    self.template
                        .part(&s.part)
                        .map(|p| p.sections.as_slice())
                        .unwrap_or_default(),
                    &mut HashSet::new(),
                ),
                _ => false,
            };
            if nested {
                return Err(TemplateError::InvalidTemplate(format!(
                    "'{id}' places a table or list inside list '{list}'"
                )));
            }
        }

        if let Some(guard) = section.visible_when() {
            self.conditions.get_or_compile(guard)?;
        }

        match section {
            Section::Header(s) => {
                if let Some(title) = &s.title {
                    placeholders(title)?;
                }
                self.fields(&s.fields)?;
            }
            Section::Detail(s) => self.fields(&s.fields)?,
            Section::Text(s) => placeholders(&s.text)?,
            Section::PageBreak(_) => {}
            Section::Table(s) => {
                s.table.validate()?;
                if let Some(condition) = &s.table.where_condition {
                    self.conditions.get_or_compile(condition)?;
                }
            }
            Section::Conditional(s) => {
                self.conditions.get_or_compile(&s.condition)?;
                self.sections(&s.then_sections, path, ids, container)?;
                if let Some(sections) = &s.else_sections {
                    self.sections(sections, path, ids, container)?;
                }
            }
            Section::List(s) => {
                DataPath::parse(&s.source_path)?;
                for key in &s.sort {
                    DataPath::parse(&key.path)?;
                }
                if let Some(condition) = &s.where_condition {
                    self.conditions.get_or_compile(condition)?;
                }
                self.sections(&s.sections, path, ids, Some(s.id.as_str()))?;
            }
            Section::Part(s) => {
                if self.template.part(&s.part).is_none() {
                    return Err(TemplateError::PartNotFound(s.part.clone()));
                }
                if let Some(root) = &s.path {
                    DataPath::parse(root)?;
                }
            }
        }

        Ok(())
    }

    fn fields(&self, fields: &[FieldMapping]) -> Result<()> {
        for field in fields {
            if field.path.trim().is_empty() {
                return Err(TemplateError::InvalidTemplate(
                    "field mapping has an empty path".to_string(),
                ));
            }
            DataPath::parse(&field.path)?;

            for condition in [&field.condition, &field.where_condition].into_iter().flatten() {
                self.conditions.get_or_compile(condition)?;
            }
            if let Some(lookup) = &field.lookup {
                DataPath::parse(&lookup.collection)?;
                self.conditions.get_or_compile(&lookup.having)?;
            }
        }
        Ok(())
    }

    /// Whether sections hold a table or list, following part references
    fn contains_container(&self, sections: &'t [Section], visited: &mut HashSet<&'t str>) -> bool {
        sections.iter().any(|section| match section {
            Section::Table(_) | Section::List(_) => true,
            Section::Conditional(s) => {
                self.contains_container(&s.then_sections, visited)
                    || s
                        .else_sections
                        .as_deref()
                        .is_some_and(|sections| self.contains_container(sections, visited))
            }
            Section::Part(s) => {
                visited.insert(s.part.as_str())
                    && self
                        .template
                        .part(&s.part)
                        .is_some_and(|part| self.contains_container(&part.sections, visited))
            }
            _ => false,
        })
    }

    /// Depth-first walk of part references
    fn part_cycles(
        &self,
        name: &'t str,
        stack: &mut Vec<&'t str>,
        done: &mut HashSet<&'t str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|open| *open == name) {
            let mut chain = stack[start..].to_vec();
            chain.push(name);
            return Err(TemplateError::PartCycle(chain.join(" -> ")));
        }
        let Some(part) = self.template.part(name) else {
            return Ok(());
        };

        stack.push(name);
        let mut references = Vec::new();
        part_references(&part.sections, &mut references);
        for reference in references {
            self.part_cycles(reference, stack, done)?;
        }
        stack.pop();
        done.insert(name);
        Ok(())
    }
}

/// Names of parts referenced anywhere in a section tree
fn part_references<'s>(sections: &'s [Section], out: &mut Vec<&'s str>) {
    for section in sections {
        match section {
            Section::Part(s) => out.push(&s.part),
            Section::Conditional(s) => {
                part_references(&s.then_sections, out);
                if let Some(sections) = &s.else_sections {
                    part_references(sections, out);
                }
            }
            Section::List(s) => part_references(&s.sections, out),
            _ => {}
        }
    }
}

fn placeholders(text: &str) -> Result<()> {
    for piece in split_placeholders(text) {
        if let TextPiece::Placeholder(path) = piece {
            DataPath::parse(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GroupMode, SortKey};

    fn validate(json: &str) -> Result<Template> {
        let template: Template = serde_json::from_str(json).unwrap();
        validate_template_with(&template, &ConditionCache::new())?;
        Ok(template)
    }

    #[test]
    fn test_parse_template() {
        let json = r#"{
            "version": "2.0",
            "name": "Change Order",
            "sections": [
                { "type": "header", "id": "title", "title": "Change Order {{Number}}" },
                { "type": "detail", "id": "summary", "fields": [{ "path": "Amount" }] },
                {
                    "type": "table",
                    "id": "lines",
                    "sourcePath": "Lines",
                    "columns": [{ "path": "Type" }, { "path": "V" }],
                    "sort": [{ "path": "Type", "direction": "asc" }],
                    "groupBy": "Type",
                    "groupMode": "subTotal",
                    "aggregations": [{ "op": "sum", "sourcePath": "V", "targetPath": "V" }]
                },
                { "type": "part", "id": "sig", "part": "Signature", "path": "Owner" }
            ],
            "parts": [
                { "name": "Signature", "sections": [{ "type": "text", "id": "sig", "text": "{{Name}}" }] }
            ]
        }"#;

        let template = parse_template(json).unwrap();
        assert_eq!(template.version, "2.0");
        assert_eq!(template.sections.len(), 4);
        assert!(template.part("Signature").is_some());
        match &template.sections[2] {
            Section::Table(t) => {
                assert_eq!(t.table.group_mode, GroupMode::SubTotal);
                assert_eq!(t.table.sort, vec![SortKey::ascending("Type")]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_template(r#"{ "sections": [{ "type": "banner", "id": "x" }] }"#).unwrap_err();
        assert!(matches!(err, TemplateError::ParseError(_)));
    }

    #[test]
    fn test_duplicate_section_id() {
        let err = validate(
            r#"{ "sections": [
                { "type": "text", "id": "a", "text": "x" },
                { "type": "conditional", "id": "c", "condition": "X IsNull",
                  "then": [{ "type": "text", "id": "a", "text": "y" }] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::InvalidTemplate(_)));
        assert_eq!(err.section_path(), Some("c/a"));
    }

    #[test]
    fn test_empty_field_path() {
        let err = validate(
            r#"{ "sections": [{ "type": "detail", "id": "d", "fields": [{ "path": " " }] }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::InvalidTemplate(_)));
    }

    #[test]
    fn test_bad_condition_and_path() {
        let err = validate(
            r#"{ "sections": [{ "type": "text", "id": "t", "text": "x", "visibleWhen": "AllOf(A IsNull" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::ConditionParse { .. }));

        let err = validate(
            r#"{ "sections": [{ "type": "text", "id": "t", "text": "{{Items[}}" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::PathSyntax { .. }));
    }

    #[test]
    fn test_group_by_without_matching_sort() {
        let err = validate(
            r#"{ "sections": [{
                "type": "table", "id": "lines", "sourcePath": "Lines",
                "columns": [{ "path": "V" }],
                "groupBy": "Type", "groupMode": "summary"
            }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::TableConfig(_)));
        assert_eq!(err.section_path(), Some("lines"));
    }

    #[test]
    fn test_table_inside_list_rejected() {
        let err = validate(
            r#"{ "sections": [{
                "type": "list", "id": "orders", "sourcePath": "Orders",
                "sections": [{
                    "type": "conditional", "id": "c", "condition": "X IsNotNull",
                    "then": [{ "type": "table", "id": "t", "sourcePath": "Lines", "columns": [{ "path": "V" }] }]
                }]
            }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::InvalidTemplate(_)));
        assert_eq!(err.section_path(), Some("orders/c/t"));
    }

    #[test]
    fn test_container_through_part_rejected() {
        let err = validate(
            r#"{
                "sections": [{
                    "type": "list", "id": "orders", "sourcePath": "Orders",
                    "sections": [{ "type": "part", "id": "p", "part": "Lines" }]
                }],
                "parts": [{ "name": "Lines", "sections": [
                    { "type": "list", "id": "inner", "sourcePath": "Items", "sections": [] }
                ] }]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::InvalidTemplate(_)));
    }

    #[test]
    fn test_missing_part() {
        let err = validate(
            r#"{ "sections": [{ "type": "part", "id": "p", "part": "Nope" }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err.root_cause(), TemplateError::PartNotFound(name) if name == "Nope"));
    }

    #[test]
    fn test_part_cycle() {
        let err = validate(
            r#"{
                "sections": [{ "type": "part", "id": "p", "part": "A" }],
                "parts": [
                    { "name": "A", "sections": [{ "type": "part", "id": "b", "part": "B" }] },
                    { "name": "B", "sections": [
                        { "type": "conditional", "id": "c", "condition": "X IsNull",
                          "then": [{ "type": "part", "id": "a", "part": "A" }] }
                    ] }
                ]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::PartCycle(chain) if chain == "A -> B -> A"));
    }

    #[test]
    fn test_duplicate_part_names() {
        let err = validate(
            r#"{ "parts": [
                { "name": "A", "sections": [] },
                { "name": "A", "sections": [] }
            ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidTemplate(_)));
    }

    #[test]
    fn test_conditions_are_cached() {
        let template: Template = serde_json::from_str(
            r#"{ "sections": [{ "type": "text", "id": "t", "text": "x", "visibleWhen": "Show IsTrue" }] }"#,
        )
        .unwrap();
        let cache = ConditionCache::new();
        validate_template_with(&template, &cache).unwrap();
        assert!(cache.contains("Show IsTrue"));
    }
}
