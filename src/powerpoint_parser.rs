use std::path::Path;

use anyhow::{Context, Result};
use roxmltree::{Document, Node};

use crate::content::{ExtractedImage, RawExtraction, Table};
use crate::ocr_engine::{OcrEngine, recognize_embedded_text};
use crate::ooxml_package::{
    OoxmlPackage, Relationship, attribute_local, children_named, first_child_named, resolve_target,
};

const DEFAULT_MAIN_PART: &str = "ppt/presentation.xml";

/// Vertical tab, used for line breaks inside a paragraph
const LINE_BREAK: char = '\u{b}';

/// Extract shape texts, tables and pictures from a PowerPoint (PPTX) presentation.
///
/// Slides are visited in presentation order and shapes in slide order. Every
/// text shape contributes one text entry, stripped, even when empty.
pub fn extract_powerpoint(path: &Path, ocr: &dyn OcrEngine) -> Result<RawExtraction> {
    let mut package = OoxmlPackage::open(path)?;
    let main_part = package.main_part(DEFAULT_MAIN_PART)?;

    let mut texts = Vec::new();
    let mut tables = Vec::new();
    let mut images = Vec::new();

    for slide_part in slide_parts(&mut package, &main_part)? {
        let xml = package.read_text(&slide_part)?;
        let doc = Document::parse(&xml)
            .with_context(|| format!("Failed to parse {} in {}", slide_part, path.display()))?;
        let Some(shape_tree) = first_child_named(doc.root_element(), "cSld")
            .and_then(|slide| first_child_named(slide, "spTree"))
        else {
            log::warn!("{} has no shape tree", slide_part);
            continue;
        };

        let relationships = package.relationships(&slide_part)?;

        for shape in shape_tree.children().filter(Node::is_element) {
            match shape.tag_name().name() {
                "sp" => texts.push(shape_text(shape)),
                "graphicFrame" => {
                    if let Some(table) = shape.descendants().find(|n| n.is_element() && n.tag_name().name() == "tbl") {
                        tables.push(table_rows(table));
                    }
                }
                "pic" if is_picture(shape) => {
                    let Some(blob) = picture_blob(&mut package, &slide_part, &relationships, shape)? else {
                        continue;
                    };
                    let ocr_text = recognize_embedded_text(ocr, &blob, &slide_part);
                    images.push(ExtractedImage::from_blob(&blob, ocr_text));
                }
                _ => {}
            }
        }
    }

    Ok(RawExtraction {
        tables,
        images,
        ..RawExtraction::with_text_blocks(texts)
    })
}

/// Slide parts in presentation order
fn slide_parts(package: &mut OoxmlPackage, main_part: &str) -> Result<Vec<String>> {
    let xml = package.read_text(main_part)?;
    let doc = Document::parse(&xml).with_context(|| format!("Failed to parse {}", main_part))?;

    if let Some(slide_list) = first_child_named(doc.root_element(), "sldIdLst") {
        let relationships = package.relationships(main_part)?;
        let mut parts = Vec::new();
        for slide_id in children_named(slide_list, "sldId") {
            let Some(rel_id) = relationship_id(slide_id) else {
                continue;
            };
            match relationships.iter().find(|rel| rel.id == rel_id) {
                Some(rel) => parts.push(resolve_target(main_part, &rel.target)),
                None => log::warn!("Slide relationship {} missing from {}", rel_id, main_part),
            }
        }
        return Ok(parts);
    }

    // No slide list: order slide parts by the number in their name
    let mut parts: Vec<String> = package
        .part_names()
        .into_iter()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .collect();
    parts.sort_by_key(|name| extract_slide_number(name));
    Ok(parts)
}

/// Extract slide number from slide file name
fn extract_slide_number(filename: &str) -> usize {
    // Extract number from "ppt/slides/slide1.xml" format
    if let Some(start) = filename.rfind("slide") {
        if let Some(end) = filename.rfind(".xml") {
            if start + 5 <= end {
                return filename[start + 5..end].parse().unwrap_or(0);
            }
        }
    }
    0
}

/// The relationship-namespaced `id` of a `sldId`; its plain `id` is the numeric slide id
fn relationship_id<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.attributes()
        .find(|attr| attr.name() == "id" && attr.namespace().is_some())
        .map(|attr| attr.value())
}

/// Text of a shape's text frame; a shape without a text body has empty text
fn shape_text(shape: Node) -> String {
    first_child_named(shape, "txBody")
        .map(text_frame_text)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn text_frame_text(body: Node) -> String {
    children_named(body, "p")
        .map(|paragraph| {
            let mut text = String::new();
            for item in paragraph.children().filter(Node::is_element) {
                match item.tag_name().name() {
                    "r" | "fld" => {
                        if let Some(t) = first_child_named(item, "t") {
                            text.push_str(t.text().unwrap_or_default());
                        }
                    }
                    "br" => text.push(LINE_BREAK),
                    _ => {}
                }
            }
            text
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn table_rows(table: Node) -> Table {
    children_named(table, "tr")
        .map(|row| {
            children_named(row, "tc")
                .map(|cell| {
                    first_child_named(cell, "txBody")
                        .map(text_frame_text)
                        .unwrap_or_default()
                        .trim()
                        .to_string()
                })
                .collect()
        })
        .collect()
}

/// A plain picture shape: not a picture placeholder and not a media clip
fn is_picture(pic: Node) -> bool {
    let Some(properties) = first_child_named(pic, "nvPicPr").and_then(|nv| first_child_named(nv, "nvPr")) else {
        return true;
    };
    !properties.children().filter(Node::is_element).any(|child| {
        matches!(
            child.tag_name().name(),
            "ph" | "videoFile" | "audioFile" | "quickTimeFile"
        )
    })
}

fn picture_blob(
    package: &mut OoxmlPackage,
    slide_part: &str,
    relationships: &[Relationship],
    pic: Node,
) -> Result<Option<Vec<u8>>> {
    let embed = pic
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "blip")
        .and_then(|blip| attribute_local(blip, "embed"));

    let Some(rel) = embed.and_then(|id| relationships.iter().find(|rel| rel.id == id)) else {
        log::warn!("Skipping picture without embedded image on {}", slide_part);
        return Ok(None);
    };
    if rel.external {
        log::warn!("Skipping linked picture {} ({}) on {}", rel.id, rel.target, slide_part);
        return Ok(None);
    }

    let part = resolve_target(slide_part, &rel.target);
    package.read_bytes(&part).map(Some)
}
