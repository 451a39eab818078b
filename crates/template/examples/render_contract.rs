//! Render a change-order template and print its blocks as text
//!
//! Usage: cargo run -p template --example render_contract [template.json] [data.json]
//!
//! Set `RUST_LOG=template=debug` to see render tracing.

use serde_json::{json, Value};
use std::error::Error;
use template::{parse_template, RenderOptions, TemplateRenderer, TextContent};

const TEMPLATE: &str = r#"{
    "name": "Change order",
    "sections": [
        { "type": "header", "id": "title", "title": "Change Order {{Number}}", "level": 1 },
        { "type": "detail", "id": "summary", "fields": [
            { "label": "Owner", "path": "Owner.Name" },
            { "label": "Amount", "path": "Amount", "format": { "type": "currency" } },
            { "label": "In words", "path": "Amount", "format": { "type": "currency", "mode": "wordsMixedCase" } },
            { "label": "Dated", "path": "Date", "format": { "type": "date", "pattern": "dd MMM yyyy" } }
        ] },
        {
            "type": "table",
            "id": "lines",
            "sourcePath": "Lines",
            "columns": [
                { "header": "Type", "path": "Type", "defaultValue": "-" },
                { "header": "Description", "path": "Description" },
                { "header": "Value", "path": "Value", "format": { "type": "number", "pattern": "N2" }, "align": "right" }
            ],
            "sort": [{ "path": "Type" }],
            "groupBy": "Type",
            "groupMode": "subTotal",
            "totalMode": "summary",
            "aggregations": [{ "op": "sum", "sourcePath": "Value", "targetPath": "Value" }]
        },
        {
            "type": "conditional",
            "id": "retainage",
            "condition": "Retainage IsGreaterThan 0",
            "then": [{ "type": "text", "id": "held", "text": "Retainage held: {{Retainage}}%" }],
            "else": [{ "type": "text", "id": "none", "text": "No retainage" }]
        },
        { "type": "detail", "id": "signature", "fields": [
            {
                "label": "Signed by",
                "path": "Name",
                "lookup": { "collection": "Contacts", "having": "Role Equals Signatory" },
                "where": "SignaturePath IsNotNull",
                "defaultValue": "(unsigned)"
            }
        ] }
    ]
}"#;

fn sample_data() -> Value {
    json!({
        "Number": "CO-0007",
        "Date": "2025-01-22",
        "Amount": 1250.5,
        "Retainage": 5,
        "Owner": { "Name": "Acme Holdings" },
        "Lines": [
            { "Type": "Labor", "Description": "Framing", "Value": 800 },
            { "Type": "Material", "Description": "Lumber", "Value": 350.5 },
            { "Type": "Labor", "Description": "Cleanup", "Value": 100 }
        ],
        "Contacts": [
            { "Role": "PM", "Name": "Kim", "SignaturePath": null },
            { "Role": "Signatory", "Name": "Lee", "SignaturePath": "sig/lee.png" }
        ]
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let template_json = match args.next() {
        Some(path) => std::fs::read_to_string(path)?,
        None => TEMPLATE.to_string(),
    };
    let data = match args.next() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => sample_data(),
    };

    let template = parse_template(&template_json)?;
    let output = TemplateRenderer::new(&template).render(&data, &RenderOptions::default())?;

    for block in &output.blocks {
        println!("[{}]", block.section_id());
        if let Some(text) = block.get_text() {
            println!("{text}");
        }
        println!();
    }

    for warning in &output.warnings {
        eprintln!("warning {:?} at {}: {}", warning.kind, warning.section_path, warning.message);
    }

    Ok(())
}
