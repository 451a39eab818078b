//! Template Engine - data binding, conditions, and table aggregation
//!
//! This crate provides:
//! - Template JSON schema types (sections, field mappings, table configs)
//! - Template parsing and load-time validation
//! - Path resolution into nested entity data, including correlated
//!   `Having`/`Where` child lookups
//! - Condition evaluation for single-condition and `AllOf`/`AnyOf` expressions
//! - Value formatting (currency words, date and number codes, booleans)
//! - Table sorting, grouping, and aggregation
//! - Section rendering into an ordered sequence of [`RenderBlock`]s
//!
//! # Example
//!
//! ```ignore
//! use template::{parse_template, RenderOptions, TemplateRenderer};
//!
//! let template = parse_template(template_json)?;
//! let data: serde_json::Value = serde_json::from_str(data_json)?;
//! let output = TemplateRenderer::new(&template).render(&data, &RenderOptions::default())?;
//! for block in &output.blocks {
//!     emitter.write(block);
//! }
//! ```

pub mod blocks;
pub mod condition;
mod context;
pub mod format;
pub mod parser;
pub mod path;
mod renderer;
mod schema;
pub mod table;

pub use blocks::{
    Branch, ConditionalBlock, FieldValue, HeadingBlock, PageBreakBlock, ParagraphBlock,
    RenderBlock, RenderOutput, RowKind, TableBlock, TableColumn, TableRow, TextContent,
};
pub use condition::{ConditionCache, ConditionEvaluator, ConditionExpression, Operator};
pub use context::{CancellationToken, RenderContext, RenderOptions, RenderWarning, WarningKind};
pub use parser::{parse_template, validate_template};
pub use path::{DataPath, Scope};
pub use renderer::TemplateRenderer;
pub use schema::*;

// Re-export the embedded schema
pub use schema::TEMPLATE_SCHEMA;

use thiserror::Error;

/// Errors that can occur during template processing
///
/// Every variant is fatal for a render. Non-fatal issues are reported as
/// [`RenderWarning`]s on the [`RenderOutput`] instead.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to parse template: {0}")]
    ParseError(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid path '{path}': {message}")]
    PathSyntax { path: String, message: String },

    #[error("Invalid condition '{expression}': {message}")]
    ConditionParse { expression: String, message: String },

    #[error("Invalid table configuration: {0}")]
    TableConfig(String),

    #[error("Template part not found: {0}")]
    PartNotFound(String),

    #[error("Template part cycle: {0}")]
    PartCycle(String),

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Render cancelled at '{section_path}'")]
    Cancelled { section_path: String },

    #[error("Section '{section_path}': {source}")]
    Section {
        section_path: String,
        #[source]
        source: Box<TemplateError>,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TemplateError {
    /// Section path the error was raised in, if known
    pub fn section_path(&self) -> Option<&str> {
        match self {
            TemplateError::Section { section_path, .. }
            | TemplateError::Cancelled { section_path } => Some(section_path),
            _ => None,
        }
    }

    /// The underlying error without its section wrapper
    pub fn root_cause(&self) -> &TemplateError {
        match self {
            TemplateError::Section { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the render was aborted by a deadline or cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), TemplateError::Cancelled { .. })
    }

    /// Attach a section path unless the error already carries one
    pub(crate) fn in_section(self, section_path: &str) -> Self {
        match self {
            TemplateError::Section { .. } | TemplateError::Cancelled { .. } => self,
            other => TemplateError::Section {
                section_path: section_path.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;
