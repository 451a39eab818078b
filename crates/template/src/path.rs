//! Path resolution into nested entity data
//!
//! A path is a dot-separated list of attribute names. Any segment may carry
//! bracketed collection indexes (`Items[2]`, `Items[Last]`, `Grid[1][2]`);
//! on an array a bare segment is read as an index too (`Items.First.Name`).
//! Indexes are 1-based. Missing attributes and out-of-range indexes resolve
//! to `None`; only malformed path strings are errors.
//!
//! The leading characters pick the root the path starts from:
//! - `Name` - the current scope (entity, table row, list item, part root)
//! - `$.Name` (or `$` alone) - the document root
//! - `@Name` - the render context (`@Now`, `@User.Name`, ...)

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TemplateError};

pub(crate) static NULL: Value = Value::Null;

/// Where a path starts resolving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRoot {
    Scope,
    Document,
    Context,
}

/// Collection index within a path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionIndex {
    /// 1-based position
    Position(usize),
    First,
    Last,
}

impl CollectionIndex {
    /// Parse `First`, `Last` (case-insensitive) or a non-negative integer
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("first") {
            Some(CollectionIndex::First)
        } else if text.eq_ignore_ascii_case("last") {
            Some(CollectionIndex::Last)
        } else if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse().ok().map(CollectionIndex::Position)
        } else {
            None
        }
    }

    fn select<'a>(&self, items: &'a [Value]) -> Option<&'a Value> {
        match *self {
            CollectionIndex::First => items.first(),
            CollectionIndex::Last => items.last(),
            CollectionIndex::Position(0) => None,
            CollectionIndex::Position(n) => items.get(n - 1),
        }
    }
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(CollectionIndex),
}

/// A parsed data path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    source: String,
    root: PathRoot,
    segments: Vec<Segment>,
}

impl DataPath {
    /// Parse a path string
    pub fn parse(path: &str) -> Result<Self> {
        let source = path.trim();
        let syntax = |message: &str| TemplateError::PathSyntax {
            path: path.to_string(),
            message: message.to_string(),
        };

        if source.is_empty() {
            return Err(syntax("path is empty"));
        }

        let (root, body) = if source == "$" {
            (PathRoot::Document, "")
        } else if let Some(rest) = source.strip_prefix("$.") {
            (PathRoot::Document, rest)
        } else if let Some(rest) = source.strip_prefix('@') {
            (PathRoot::Context, rest)
        } else {
            (PathRoot::Scope, source)
        };

        if body.is_empty() && root != PathRoot::Document {
            return Err(syntax("path is empty"));
        }

        let mut segments = Vec::new();
        if !body.is_empty() {
            for part in body.split('.') {
                parse_part(part.trim(), &mut segments).map_err(syntax)?;
            }
        }

        Ok(Self {
            source: source.to_string(),
            root,
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> PathRoot {
        self.root
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Attribute names of a scope-rooted path without indexes
    pub fn field_names(&self) -> Option<Vec<&str>> {
        if self.root != PathRoot::Scope {
            return None;
        }
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Index(_) => None,
            })
            .collect()
    }

    /// Resolve against a scope; `None` when any step is missing
    pub fn resolve<'a>(&self, scope: &Scope<'a>) -> Option<&'a Value> {
        let mut node = match self.root {
            PathRoot::Scope => scope.current,
            PathRoot::Document => scope.root,
            PathRoot::Context => scope.context,
        };

        for segment in &self.segments {
            node = match (segment, node) {
                (Segment::Field(name), Value::Object(map)) => map.get(name)?,
                (Segment::Field(name), Value::Array(items)) => {
                    CollectionIndex::parse(name)?.select(items)?
                }
                (Segment::Index(index), Value::Array(items)) => index.select(items)?,
                _ => return None,
            };
        }

        Some(node)
    }
}

/// Parse `Name`, `Name[1]`, `Name[1][Last]` or `[2]` into segments
fn parse_part(part: &str, segments: &mut Vec<Segment>) -> std::result::Result<(), &'static str> {
    let (name, mut rest) = match part.find('[') {
        Some(pos) => (part[..pos].trim(), &part[pos..]),
        None => (part, ""),
    };

    if name.contains(']') {
        return Err("unmatched ']'");
    }
    if name.is_empty() && rest.is_empty() {
        return Err("empty segment");
    }
    if !name.is_empty() {
        segments.push(Segment::Field(name.to_string()));
    }

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[').ok_or("unexpected text after ']'")?;
        let close = inner.find(']').ok_or("unmatched '['")?;
        let index = inner[..close].trim();
        if index.is_empty() {
            return Err("empty index");
        }
        if index.contains('[') {
            return Err("unmatched '['");
        }
        let index = CollectionIndex::parse(index).ok_or("index must be a number, First, or Last")?;
        segments.push(Segment::Index(index));
        rest = inner[close + 1..].trim_start();
    }

    Ok(())
}

impl FromStr for DataPath {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self> {
        DataPath::parse(s)
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Resolution roots for one point of a render
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Document root (target of `$.` paths)
    pub root: &'a Value,
    /// Current entity, row, or item (target of bare paths)
    pub current: &'a Value,
    /// Render context variables (target of `@` paths)
    pub context: &'a Value,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Value, context: &'a Value) -> Self {
        Self {
            root,
            current: root,
            context,
        }
    }

    /// Same roots with a different current entity
    pub fn with_current(self, current: &'a Value) -> Self {
        Self { current, ..self }
    }
}

/// Resolve a path string against a data root
///
/// # Examples
/// ```
/// use serde_json::json;
/// let data = json!({ "Items": [{ "Name": "a" }, { "Name": "b" }] });
/// assert_eq!(template::path::resolve("Items[Last].Name", &data).unwrap(), Some(&json!("b")));
/// assert_eq!(template::path::resolve("Items[3].Name", &data).unwrap(), None);
/// ```
pub fn resolve<'a>(path: &str, root: &'a Value) -> Result<Option<&'a Value>> {
    let path = DataPath::parse(path)?;
    Ok(path.resolve(&Scope::new(root, &NULL)))
}

/// Items of a resolved collection
///
/// Absent and null are empty; a single object is a one-item collection.
pub fn collection_items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// First child of a collection accepted by `matches`
pub fn find_correlated<'a, F>(collection: Option<&'a Value>, mut matches: F) -> Option<&'a Value>
where
    F: FnMut(&'a Value) -> bool,
{
    collection_items(collection)
        .into_iter()
        .find(|&child| matches(child))
}

/// Correlated resolution: project `target` from the first child of
/// `collection` accepted by `matches`
pub fn resolve_correlated<'a, F>(
    collection: &DataPath,
    target: &DataPath,
    scope: &Scope<'a>,
    matches: F,
) -> Option<&'a Value>
where
    F: FnMut(&'a Value) -> bool,
{
    let child = find_correlated(collection.resolve(scope), matches)?;
    target.resolve(&scope.with_current(child))
}

/// Write `value` under a field-only path, creating intermediate objects
pub(crate) fn set_path(record: &mut Map<String, Value>, names: &[&str], value: Value) {
    match names {
        [] => {}
        [last] => {
            record.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let child = record
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(map) = child {
                set_path(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn contract() -> Value {
        json!({
            "Number": "CO-7",
            "Owner": { "Name": "Acme", "Address": { "City": "Austin" } },
            "Contacts": [
                { "Role": "PM", "Name": "Kim", "Path": null },
                { "Role": "Signatory", "Name": "Lee", "Path": "ok.png" }
            ],
            "Grid": [[1, 2], [3, 4]]
        })
    }

    #[test]
    fn test_resolve_nested_leaf() {
        let data = contract();
        assert_eq!(resolve("Owner.Address.City", &data).unwrap(), Some(&json!("Austin")));
        assert_eq!(resolve("Number", &data).unwrap(), Some(&json!("CO-7")));
        assert_eq!(resolve("Owner.Missing", &data).unwrap(), None);
        assert_eq!(resolve("Number.Length", &data).unwrap(), None);
    }

    #[test]
    fn test_resolve_indexes() {
        let data = contract();
        assert_eq!(resolve("Contacts[1].Name", &data).unwrap(), Some(&json!("Kim")));
        assert_eq!(resolve("Contacts[first].Name", &data).unwrap(), Some(&json!("Kim")));
        assert_eq!(resolve("Contacts[Last].Name", &data).unwrap(), Some(&json!("Lee")));
        assert_eq!(resolve("Contacts.2.Name", &data).unwrap(), Some(&json!("Lee")));
        assert_eq!(resolve("Contacts.Last.Role", &data).unwrap(), Some(&json!("Signatory")));
        assert_eq!(resolve("Grid[2][1]", &data).unwrap(), Some(&json!(3)));
    }

    #[test]
    fn test_out_of_range_index_is_absent() {
        let data = contract();
        assert_eq!(resolve("Contacts[3].Name", &data).unwrap(), None);
        assert_eq!(resolve("Contacts[0].Name", &data).unwrap(), None);
        assert_eq!(resolve("Owner[1]", &data).unwrap(), None);
        assert_eq!(resolve("Contacts.Nope", &data).unwrap(), None);
    }

    #[test]
    fn test_null_is_present() {
        let data = contract();
        assert_eq!(resolve("Contacts[1].Path", &data).unwrap(), Some(&Value::Null));
    }

    #[test]
    fn test_malformed_paths() {
        for bad in ["", "  ", "A..B", "Items[1", "Items]", "Items[]", "Items[x]", "Items[1]x", "@"] {
            let err = DataPath::parse(bad).unwrap_err();
            assert!(
                matches!(err, TemplateError::PathSyntax { .. }),
                "expected syntax error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_roots() {
        let data = contract();
        let context = json!({ "User": { "Name": "Pat" } });
        let scope = Scope::new(&data, &context).with_current(&data["Contacts"][1]);

        let bare: DataPath = "Name".parse().unwrap();
        let doc: DataPath = "$.Number".parse().unwrap();
        let ctx: DataPath = "@User.Name".parse().unwrap();
        let whole: DataPath = "$".parse().unwrap();

        assert_eq!(bare.resolve(&scope), Some(&json!("Lee")));
        assert_eq!(doc.resolve(&scope), Some(&json!("CO-7")));
        assert_eq!(ctx.resolve(&scope), Some(&json!("Pat")));
        assert_eq!(whole.resolve(&scope), Some(&data));
        assert_eq!(doc.root(), PathRoot::Document);
        assert_eq!(doc.to_string(), "$.Number");
    }

    #[test]
    fn test_field_names() {
        let path = DataPath::parse("Totals.Amount").unwrap();
        assert_eq!(path.field_names(), Some(vec!["Totals", "Amount"]));
        assert_eq!(DataPath::parse("Items[1]").unwrap().field_names(), None);
        assert_eq!(DataPath::parse("$.Total").unwrap().field_names(), None);
    }

    #[test]
    fn test_resolve_correlated() {
        let data = contract();
        let scope = Scope::new(&data, &NULL);
        let collection = DataPath::parse("Contacts").unwrap();
        let target = DataPath::parse("Name").unwrap();

        let signatory = resolve_correlated(&collection, &target, &scope, |c| {
            c["Role"] == "Signatory" && !c["Path"].is_null()
        });
        assert_eq!(signatory, Some(&json!("Lee")));

        let nobody = resolve_correlated(&collection, &target, &scope, |c| {
            c["Role"] == "PM" && !c["Path"].is_null()
        });
        assert_eq!(nobody, None);
    }

    #[test]
    fn test_collection_items() {
        let single = json!({ "A": 1 });
        assert_eq!(collection_items(None).len(), 0);
        assert_eq!(collection_items(Some(&Value::Null)).len(), 0);
        assert_eq!(collection_items(Some(&single)).len(), 1);
        assert_eq!(collection_items(Some(&json!([1, 2, 3]))).len(), 3);
    }

    #[test]
    fn test_set_path() {
        let mut record = Map::new();
        set_path(&mut record, &["Type"], json!("A"));
        set_path(&mut record, &["Totals", "Sum"], json!(300));
        set_path(&mut record, &["Totals", "Max"], json!(200));
        assert_eq!(
            Value::Object(record),
            json!({ "Type": "A", "Totals": { "Sum": 300, "Max": 200 } })
        );
    }
}
