//! Template JSON schema types

use serde::{Deserialize, Serialize};

/// Embedded JSON Schema for template validation
/// This schema can be used by IDEs and validators for template authoring
pub const TEMPLATE_SCHEMA: &str = include_str!("../data/template-schema.json");

fn default_version() -> String {
    "1.0".to_string()
}

/// Root template structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Template display name
    #[serde(default)]
    pub name: Option<String>,

    /// Ordered section tree
    #[serde(default)]
    pub sections: Vec<Section>,

    /// Reusable named section subtrees
    #[serde(default)]
    pub parts: Vec<TemplatePart>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: default_version(),
            name: None,
            sections: Vec::new(),
            parts: Vec::new(),
        }
    }
}

impl Template {
    /// Create an empty template with a display name
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Look up a template part by name
    pub fn part(&self, name: &str) -> Option<&TemplatePart> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Append a section
    pub fn add_section(&mut self, section: Section) -> &mut Self {
        self.sections.push(section);
        self
    }

    /// Append a header section with a literal (or `{{Path}}`) title
    pub fn insert_header(&mut self, id: &str, title: &str, level: u8) -> &mut Self {
        self.add_section(Section::Header(HeaderSection {
            id: id.to_string(),
            title: Some(title.to_string()),
            level,
            fields: Vec::new(),
            style: None,
            visible_when: None,
        }))
    }

    /// Append a detail section binding the given fields
    pub fn insert_fields(&mut self, id: &str, fields: Vec<FieldMapping>) -> &mut Self {
        self.add_section(Section::Detail(DetailSection {
            id: id.to_string(),
            fields,
            style: None,
            visible_when: None,
        }))
    }

    /// Append a literal text section
    pub fn insert_text(&mut self, id: &str, text: &str) -> &mut Self {
        self.add_section(Section::Text(TextSection {
            id: id.to_string(),
            text: text.to_string(),
            style: None,
            visible_when: None,
        }))
    }

    /// Append a table section
    pub fn insert_table(&mut self, id: &str, table: TableConfig) -> &mut Self {
        self.add_section(Section::Table(TableSection {
            id: id.to_string(),
            table,
            style: None,
            visible_when: None,
        }))
    }

    /// Append a page break
    pub fn insert_page_break(&mut self, id: &str) -> &mut Self {
        self.add_section(Section::PageBreak(PageBreakSection {
            id: id.to_string(),
            style: None,
            visible_when: None,
        }))
    }

    /// Append a reference to a template part, optionally rebinding its root
    pub fn insert_part_ref(&mut self, id: &str, part: &str, path: Option<&str>) -> &mut Self {
        self.add_section(Section::Part(PartSection {
            id: id.to_string(),
            part: part.to_string(),
            path: path.map(str::to_string),
            style: None,
            visible_when: None,
        }))
    }

    /// Register a reusable template part
    pub fn add_part(&mut self, name: &str, sections: Vec<Section>) -> &mut Self {
        self.parts.push(TemplatePart {
            name: name.to_string(),
            description: None,
            sections,
        });
        self
    }
}

/// Reusable named section subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePart {
    /// Name used by `part` sections
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub sections: Vec<Section>,
}

/// Template section (tagged union)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Section {
    /// Heading with optional bound fields
    Header(HeaderSection),

    /// Label/value field list
    Detail(DetailSection),

    /// Sorted, grouped, aggregated collection
    Table(TableSection),

    /// Literal text with `{{Path}}` placeholders
    Text(TextSection),

    /// Exactly one of `then` / `else` depending on a guard
    Conditional(ConditionalSection),

    /// Page break marker
    PageBreak(PageBreakSection),

    /// Child sections repeated per collection item
    List(ListSection),

    /// Reference to a named template part
    Part(PartSection),
}

fn default_level() -> u8 {
    1
}

/// Header section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSection {
    pub id: String,

    /// Heading text, may contain `{{Path}}` placeholders
    #[serde(default)]
    pub title: Option<String>,

    /// Heading level (1 = top)
    #[serde(default = "default_level")]
    pub level: u8,

    #[serde(default)]
    pub fields: Vec<FieldMapping>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Detail section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailSection {
    pub id: String,

    pub fields: Vec<FieldMapping>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Table section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSection {
    pub id: String,

    #[serde(flatten)]
    pub table: TableConfig,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Text section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSection {
    pub id: String,

    pub text: String,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Conditional section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalSection {
    pub id: String,

    /// Guard expression (legacy or `AllOf`/`AnyOf` form)
    pub condition: String,

    #[serde(rename = "then", default)]
    pub then_sections: Vec<Section>,

    #[serde(rename = "else", default)]
    pub else_sections: Option<Vec<Section>>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Page break section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBreakSection {
    pub id: String,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// List section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSection {
    pub id: String,

    /// Path to the collection
    pub source_path: String,

    /// Item filter, evaluated with the item as scope
    #[serde(rename = "where", default)]
    pub where_condition: Option<String>,

    #[serde(default)]
    pub sort: Vec<SortKey>,

    /// Sections rendered once per item
    pub sections: Vec<Section>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Template part reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSection {
    pub id: String,

    /// Name of the referenced part
    pub part: String,

    /// Root path handed to the part (defaults to the current scope)
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub style: Option<String>,

    #[serde(default)]
    pub visible_when: Option<String>,
}

/// Binding of a data path to formatted output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Data path; with a `lookup` it is projected from the matched child
    pub path: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub format: FieldFormat,

    #[serde(default)]
    pub format_options: FormatOptions,

    /// Text used when the value is absent or null
    #[serde(default)]
    pub default_value: Option<String>,

    /// Visibility guard; a false guard omits the field
    #[serde(default, alias = "visibleWhen")]
    pub condition: Option<String>,

    /// Same-entity filter, or the candidate filter of a `lookup`
    #[serde(rename = "where", default)]
    pub where_condition: Option<String>,

    /// Correlated child-collection lookup
    #[serde(default)]
    pub lookup: Option<CorrelatedLookup>,
}

impl FieldMapping {
    /// Field bound to a path with default formatting
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            label: None,
            format: FieldFormat::default(),
            format_options: FormatOptions::default(),
            default_value: None,
            condition: None,
            where_condition: None,
            lookup: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_options(mut self, options: FormatOptions) -> Self {
        self.format_options = options;
        self
    }

    pub fn with_default(mut self, default_value: &str) -> Self {
        self.default_value = Some(default_value.to_string());
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn with_where(mut self, condition: &str) -> Self {
        self.where_condition = Some(condition.to_string());
        self
    }

    pub fn with_lookup(mut self, collection: &str, having: &str) -> Self {
        self.lookup = Some(CorrelatedLookup {
            collection: collection.to_string(),
            having: having.to_string(),
        });
        self
    }
}

/// Correlated lookup: first child of `collection` matching `having` (and
/// the mapping's `where`, when present)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedLookup {
    pub collection: String,
    pub having: String,
}

/// Closed set of value formats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldFormat {
    /// Plain text rendering of the value
    #[default]
    Attribute,

    /// Markup passed through for the emitter
    RichText,

    /// Display text substitution
    Boolean {
        #[serde(rename = "trueText", default = "default_true_text")]
        true_text: String,
        #[serde(rename = "falseText", default = "default_false_text")]
        false_text: String,
        #[serde(rename = "emptyText", default)]
        empty_text: String,
    },

    Currency {
        #[serde(default)]
        mode: CurrencyMode,
        /// Fraction digits for standard mode (locale default if unset)
        #[serde(default)]
        decimals: Option<u8>,
    },

    /// Standard (`d`, `LongDate`) or custom (`dd MMM yyyy`) date pattern
    Date {
        #[serde(default)]
        pattern: String,
    },

    /// `F#`, `N#`, `D#`, `C#`, `P#` or a `#,###.##` picture
    Number {
        #[serde(default)]
        pattern: String,
    },
}

fn default_true_text() -> String {
    "Yes".to_string()
}

fn default_false_text() -> String {
    "No".to_string()
}

/// Currency rendering mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurrencyMode {
    #[default]
    #[serde(alias = "Standard")]
    Standard,
    #[serde(alias = "WordsMixedCase")]
    WordsMixedCase,
    #[serde(alias = "WordsUpperCase")]
    WordsUpperCase,
    #[serde(alias = "WordsLowerCase")]
    WordsLowerCase,
}

/// Post-formatting adjustments
///
/// Truncation runs before the prepend/append text is added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOptions {
    #[serde(default)]
    pub prepend_text: Option<String>,

    #[serde(default)]
    pub append_text: Option<String>,

    /// Characters dropped from the start
    #[serde(default)]
    pub left_truncate: Option<usize>,

    /// Characters dropped from the end
    #[serde(default)]
    pub right_truncate: Option<usize>,
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    /// Path to the row collection
    pub source_path: String,

    pub columns: Vec<ColumnDef>,

    /// Composite sort key, applied as a stable sort
    #[serde(default)]
    pub sort: Vec<SortKey>,

    /// Row filter, evaluated with the row as scope
    #[serde(rename = "where", default)]
    pub where_condition: Option<String>,

    /// Grouping key; must be the leading sort key
    #[serde(default)]
    pub group_by: Option<String>,

    #[serde(default)]
    pub group_mode: GroupMode,

    #[serde(default)]
    pub total_mode: TotalMode,

    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

impl TableConfig {
    /// Table over a collection with the given columns and no sorting
    pub fn new(source_path: &str, columns: Vec<ColumnDef>) -> Self {
        Self {
            source_path: source_path.to_string(),
            columns,
            sort: Vec::new(),
            where_condition: None,
            group_by: None,
            group_mode: GroupMode::None,
            total_mode: TotalMode::None,
            aggregations: Vec::new(),
        }
    }
}

/// Table column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    #[serde(default)]
    pub header: Option<String>,

    /// Path into the row (or the synthetic total record)
    pub path: String,

    #[serde(default)]
    pub format: FieldFormat,

    #[serde(default)]
    pub format_options: FormatOptions,

    /// Text for detail rows whose value is absent or null
    #[serde(default)]
    pub default_value: Option<String>,

    /// Text alignment
    #[serde(default)]
    pub align: Align,
}

impl ColumnDef {
    pub fn new(header: &str, path: &str) -> Self {
        Self {
            header: Some(header.to_string()),
            path: path.to_string(),
            format: FieldFormat::default(),
            format_options: FormatOptions::default(),
            default_value: None,
            align: Align::default(),
        }
    }

    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }
}

/// Text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub path: String,

    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(path: &str) -> Self {
        Self {
            path: path.to_string(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(path: &str) -> Self {
        Self {
            path: path.to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

/// How grouped rows are emitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupMode {
    /// No grouping output
    #[default]
    None,
    /// Member rows followed by a group-total row, per group
    #[serde(alias = "SubTotal")]
    SubTotal,
    /// Group-total rows only
    #[serde(alias = "Summary")]
    Summary,
}

/// Whether a grand-total row is appended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TotalMode {
    #[default]
    None,
    #[serde(alias = "Summary")]
    Summary,
}

/// Aggregate function applied to a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    #[serde(alias = "Sum")]
    Sum,
    #[serde(alias = "Min")]
    Min,
    #[serde(alias = "Max")]
    Max,
    #[serde(alias = "Average", alias = "avg")]
    Average,
}

/// Aggregation writing `op(source_path)` under `target_path` of a total record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub op: AggregateOp,
    pub source_path: String,
    pub target_path: String,
}

impl Aggregation {
    pub fn new(op: AggregateOp, source_path: &str, target_path: &str) -> Self {
        Self {
            op,
            source_path: source_path.to_string(),
            target_path: target_path.to_string(),
        }
    }
}

impl Section {
    /// Get the section ID
    pub fn id(&self) -> &str {
        match self {
            Section::Header(s) => &s.id,
            Section::Detail(s) => &s.id,
            Section::Table(s) => &s.id,
            Section::Text(s) => &s.id,
            Section::Conditional(s) => &s.id,
            Section::PageBreak(s) => &s.id,
            Section::List(s) => &s.id,
            Section::Part(s) => &s.id,
        }
    }

    /// Get the style token if present
    pub fn style(&self) -> Option<&str> {
        match self {
            Section::Header(s) => s.style.as_deref(),
            Section::Detail(s) => s.style.as_deref(),
            Section::Table(s) => s.style.as_deref(),
            Section::Text(s) => s.style.as_deref(),
            Section::Conditional(s) => s.style.as_deref(),
            Section::PageBreak(s) => s.style.as_deref(),
            Section::List(s) => s.style.as_deref(),
            Section::Part(s) => s.style.as_deref(),
        }
    }

    /// Get the visibility guard if present
    pub fn visible_when(&self) -> Option<&str> {
        match self {
            Section::Header(s) => s.visible_when.as_deref(),
            Section::Detail(s) => s.visible_when.as_deref(),
            Section::Table(s) => s.visible_when.as_deref(),
            Section::Text(s) => s.visible_when.as_deref(),
            Section::Conditional(s) => s.visible_when.as_deref(),
            Section::PageBreak(s) => s.visible_when.as_deref(),
            Section::List(s) => s.visible_when.as_deref(),
            Section::Part(s) => s.visible_when.as_deref(),
        }
    }

    /// Whether the section repeats over a collection
    pub fn is_container(&self) -> bool {
        matches!(self, Section::Table(_) | Section::List(_))
    }

    /// Set the visibility guard
    pub fn set_visible_when(&mut self, condition: &str) {
        let guard = Some(condition.to_string());
        match self {
            Section::Header(s) => s.visible_when = guard,
            Section::Detail(s) => s.visible_when = guard,
            Section::Table(s) => s.visible_when = guard,
            Section::Text(s) => s.visible_when = guard,
            Section::Conditional(s) => s.visible_when = guard,
            Section::PageBreak(s) => s.visible_when = guard,
            Section::List(s) => s.visible_when = guard,
            Section::Part(s) => s.visible_when = guard,
        }
    }
}
