//! Render output blocks
//!
//! A render produces an ordered sequence of [`RenderBlock`]s for a document
//! emitter. Blocks hold final text only; style tokens and column alignment
//! are passed through untouched.

use serde::{Deserialize, Serialize};

use crate::context::RenderWarning;
use crate::schema::Align;

/// Content block (tagged union)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderBlock {
    Heading(HeadingBlock),
    Paragraph(ParagraphBlock),
    Table(TableBlock),
    ConditionalChoice(ConditionalBlock),
    PageBreak(PageBreakBlock),
}

impl RenderBlock {
    /// ID of the section that produced the block
    pub fn section_id(&self) -> &str {
        match self {
            RenderBlock::Heading(b) => &b.section_id,
            RenderBlock::Paragraph(b) => &b.section_id,
            RenderBlock::Table(b) => &b.section_id,
            RenderBlock::ConditionalChoice(b) => &b.section_id,
            RenderBlock::PageBreak(b) => &b.section_id,
        }
    }
}

/// Label/value pair produced by a field mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    #[serde(default)]
    pub label: Option<String>,
    pub path: String,
    pub value: String,
    /// Value carries markup for the emitter
    #[serde(default)]
    pub rich_text: bool,
}

/// Heading from a header section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingBlock {
    pub section_id: String,
    pub level: u8,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
    #[serde(default)]
    pub style: Option<String>,
}

/// Paragraph from a detail or text section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphBlock {
    pub section_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldValue>,
    #[serde(default)]
    pub style: Option<String>,
}

/// Table column header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    #[serde(default)]
    pub header: Option<String>,
    pub path: String,
    #[serde(default)]
    pub align: Align,
}

/// Row role within a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowKind {
    Detail,
    GroupTotal,
    GrandTotal,
}

/// Formatted table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub kind: RowKind,
    /// Group key text for group-total rows
    #[serde(default)]
    pub group: Option<String>,
    pub cells: Vec<String>,
}

/// Table from a table section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    pub section_id: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
    #[serde(default)]
    pub style: Option<String>,
}

/// Branch picked by a conditional section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Then,
    Else,
}

/// Blocks of the selected branch of a conditional section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBlock {
    pub section_id: String,
    pub branch: Branch,
    pub blocks: Vec<RenderBlock>,
}

/// Page break marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBreakBlock {
    pub section_id: String,
    #[serde(default)]
    pub style: Option<String>,
}

/// Result of a successful render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub blocks: Vec<RenderBlock>,
    pub warnings: Vec<RenderWarning>,
}

/// Trait for blocks that can provide their text content
pub trait TextContent {
    /// Plain text of the block, `None` for blocks without text
    fn get_text(&self) -> Option<String>;
}

fn field_lines(fields: &[FieldValue]) -> impl Iterator<Item = String> + '_ {
    fields.iter().map(|field| match &field.label {
        Some(label) => format!("{label}: {}", field.value),
        None => field.value.clone(),
    })
}

fn join_lines(lines: Vec<String>) -> Option<String> {
    (!lines.is_empty()).then(|| lines.join("\n"))
}

impl TextContent for HeadingBlock {
    fn get_text(&self) -> Option<String> {
        join_lines(self.text.iter().cloned().chain(field_lines(&self.fields)).collect())
    }
}

impl TextContent for ParagraphBlock {
    fn get_text(&self) -> Option<String> {
        join_lines(self.text.iter().cloned().chain(field_lines(&self.fields)).collect())
    }
}

impl TextContent for TableBlock {
    fn get_text(&self) -> Option<String> {
        let header: Vec<&str> = self
            .columns
            .iter()
            .map(|c| c.header.as_deref().unwrap_or_default())
            .collect();
        let mut lines = Vec::with_capacity(self.rows.len() + 1);
        if header.iter().any(|h| !h.is_empty()) {
            lines.push(header.join("\t"));
        }
        lines.extend(self.rows.iter().map(|row| row.cells.join("\t")));
        join_lines(lines)
    }
}

impl TextContent for ConditionalBlock {
    fn get_text(&self) -> Option<String> {
        join_lines(self.blocks.iter().filter_map(TextContent::get_text).collect())
    }
}

impl TextContent for RenderBlock {
    fn get_text(&self) -> Option<String> {
        match self {
            RenderBlock::Heading(b) => b.get_text(),
            RenderBlock::Paragraph(b) => b.get_text(),
            RenderBlock::Table(b) => b.get_text(),
            RenderBlock::ConditionalChoice(b) => b.get_text(),
            RenderBlock::PageBreak(_) => None,
        }
    }
}

impl TextContent for RenderOutput {
    fn get_text(&self) -> Option<String> {
        join_lines(self.blocks.iter().filter_map(TextContent::get_text).collect())
    }
}
