use std::path::Path;

use anyhow::{Context, Result};
use roxmltree::{Document, Node};

use crate::content::{ExtractedImage, RawExtraction, Table};
use crate::ocr_engine::{OcrEngine, recognize_embedded_text};
use crate::ooxml_package::{OoxmlPackage, attribute_local, children_named, first_child_named, resolve_target};

const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// Extract body paragraphs, body tables and related images from a Word (DOCX) document.
///
/// One text entry per body paragraph, stripped, empty paragraphs included.
/// Paragraphs inside tables only appear in the table grid.
pub fn extract_docx(path: &Path, ocr: &dyn OcrEngine) -> Result<RawExtraction> {
    let mut package = OoxmlPackage::open(path)?;
    let main_part = package.main_part(DEFAULT_MAIN_PART)?;
    let xml = package.read_text(&main_part)?;

    let doc = Document::parse(&xml)
        .with_context(|| format!("Failed to parse {} in {}", main_part, path.display()))?;
    let body = first_child_named(doc.root_element(), "body")
        .with_context(|| format!("No body element in {}", main_part))?;

    let mut paragraphs = Vec::new();
    let mut tables = Vec::new();
    for child in body.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "p" => paragraphs.push(paragraph_text(child).trim().to_string()),
            "tbl" => tables.push(table_grid(child)),
            _ => {}
        }
    }

    let mut result = RawExtraction::with_text_blocks(paragraphs);
    result.tables = tables;

    for rel in package.relationships(&main_part)? {
        if !rel.is_image() {
            continue;
        }
        if rel.external {
            log::warn!("Skipping linked image {} ({}) in {}", rel.id, rel.target, path.display());
            continue;
        }
        let part = resolve_target(&main_part, &rel.target);
        let blob = package.read_bytes(&part)?;
        let ocr_text = recognize_embedded_text(ocr, &blob, &part);
        result.images.push(ExtractedImage::from_blob(&blob, ocr_text));
    }

    Ok(result)
}

/// Visible text of a paragraph: its runs, including runs inside hyperlinks
fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();
    for child in paragraph.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "r" => push_run_text(child, &mut text),
            "hyperlink" => {
                for run in children_named(child, "r") {
                    push_run_text(run, &mut text);
                }
            }
            _ => {}
        }
    }
    text
}

fn push_run_text(run: Node, out: &mut String) {
    for item in run.children().filter(Node::is_element) {
        match item.tag_name().name() {
            "t" => out.push_str(item.text().unwrap_or_default()),
            "tab" | "ptab" => out.push('\t'),
            "br" => {
                // Page and column breaks carry no text
                if matches!(attribute_local(item, "type"), None | Some("textWrapping")) {
                    out.push('\n');
                }
            }
            "cr" => out.push('\n'),
            "noBreakHyphen" => out.push('-'),
            _ => {}
        }
    }
}

/// Row-major grid of a table. A cell spanning several grid columns is repeated
/// for each of them; a vertically merged continuation cell repeats the cell above.
fn table_grid(table: Node) -> Table {
    let mut rows: Table = Vec::new();

    for row in children_named(table, "tr") {
        let mut cells = Vec::new();
        for cell in children_named(row, "tc") {
            let properties = first_child_named(cell, "tcPr");
            let span = properties
                .and_then(|props| first_child_named(props, "gridSpan"))
                .and_then(|span| attribute_local(span, "val"))
                .and_then(|val| val.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            let continues_merge = properties
                .and_then(|props| first_child_named(props, "vMerge"))
                .is_some_and(|merge| attribute_local(merge, "val").is_none_or(|val| val == "continue"));

            for _ in 0..span {
                let text = if continues_merge {
                    rows.last()
                        .and_then(|above| above.get(cells.len()))
                        .cloned()
                        .unwrap_or_default()
                } else {
                    cell_text(cell)
                };
                cells.push(text);
            }
        }
        rows.push(cells);
    }

    rows
}

fn cell_text(cell: Node) -> String {
    children_named(cell, "p")
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
