//! Fixture builders shared by the integration tests.
//! Every fixture is a real file produced with the same crates the service reads them with.
#![allow(dead_code)]

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use transformo_docs::{BoundingBox, DocumentProcessor, OcrEngine, OcrFragment};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Default Extension="png" ContentType="image/png"/>
</Types>"#;

const IMAGE_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// OCR engine returning the same fragments for every image
pub struct FixedOcr(pub Vec<&'static str>);

impl OcrEngine for FixedOcr {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn recognize(&self, _image: &[u8]) -> anyhow::Result<Vec<OcrFragment>> {
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let bounding_box = BoundingBox {
                    left: 10 * i as u32,
                    top: 0,
                    width: 10,
                    height: 10,
                };
                OcrFragment::new(*text, bounding_box, 0.9)
            })
            .collect())
    }
}

/// Route `log` output through the test harness; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn processor_with_ocr(fragments: Vec<&'static str>) -> DocumentProcessor {
    DocumentProcessor::new(Arc::new(FixedOcr(fragments)))
}

/// A small white PNG without any text on it
pub fn png_bytes() -> Vec<u8> {
    let image = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write fixture");
    path
}

/// Write a zip container with stored (uncompressed) entries, in the given order
pub fn write_zip(path: &Path, parts: &[(&str, &[u8])]) {
    let file = File::create(path).expect("Failed to create zip fixture");
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in parts {
        zip.start_file(*name, options).expect("Failed to start zip entry");
        zip.write_all(data).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip fixture");
}

fn package_rels(main_part: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{}"/>
</Relationships>"#,
        main_part
    )
}

fn text_run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#, text)
}

fn docx_cell(text: &str) -> String {
    format!(r#"<w:tc><w:p>{}</w:p></w:tc>"#, text_run(text))
}

/// A Word document with paragraphs "Hello" and "", a 2x2 table, one embedded
/// picture and one linked picture
pub fn write_docx(dir: &Path, name: &str) -> PathBuf {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <w:body>
    <w:p>{hello}</w:p>
    <w:p/>
    <w:tbl>
      <w:tblGrid><w:gridCol w:w="2000"/><w:gridCol w:w="2000"/></w:tblGrid>
      <w:tr>{c00}{c01}</w:tr>
      <w:tr>{c10}{c11}</w:tr>
    </w:tbl>
    <w:sectPr/>
  </w:body>
</w:document>"#,
        hello = text_run("  Hello  "),
        c00 = docx_cell("c00"),
        c01 = docx_cell("c01"),
        c10 = docx_cell("c10"),
        c11 = docx_cell(" c11 "),
    );
    let document_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId4" Type="{image}" Target="media/image1.png"/>
  <Relationship Id="rId5" Type="{image}" Target="https://example.com/logo.png" TargetMode="External"/>
</Relationships>"#,
        image = IMAGE_REL
    );
    let png = png_bytes();

    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", package_rels("word/document.xml").as_bytes()),
            ("word/document.xml", document.as_bytes()),
            ("word/_rels/document.xml.rels", document_rels.as_bytes()),
            ("word/styles.xml", br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#),
            ("word/media/image1.png", &png),
        ],
    );
    path
}

const P_NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

fn slide(shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {ns}><p:cSld><p:spTree>
  <p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>
  <p:grpSpPr/>
  {shapes}
</p:spTree></p:cSld></p:sld>"#,
        ns = P_NS,
        shapes = shapes
    )
}

fn text_shape(id: u32, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
        .collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="Text"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>"#,
        id, body
    )
}

/// A presentation whose slide list puts `slide2.xml` first.
///
/// First slide: title "Quarterly Report" and a shape without text body.
/// Second slide: body text "Revenue" / "grew", a 2x2 table and one picture.
pub fn write_pptx(dir: &Path, name: &str) -> PathBuf {
    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {}><p:sldIdLst><p:sldId id="256" r:id="rId3"/><p:sldId id="257" r:id="rId2"/></p:sldIdLst></p:presentation>"#,
        P_NS
    );
    let presentation_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
</Relationships>"#;

    let title_slide = slide(&format!(
        r#"{}<p:sp><p:nvSpPr><p:cNvPr id="3" name="Line"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/></p:sp>"#,
        text_shape(2, &["  Quarterly Report  "])
    ));

    let table = r#"<p:graphicFrame>
  <p:nvGraphicFramePr><p:cNvPr id="5" name="Table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr>
  <p:xfrm/>
  <a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl>
    <a:tr h="0"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>Region</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>Total</a:t></a:r></a:p></a:txBody></a:tc></a:tr>
    <a:tr h="0"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>North</a:t></a:r></a:p></a:txBody></a:tc><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t> 42 </a:t></a:r></a:p></a:txBody></a:tc></a:tr>
  </a:tbl></a:graphicData></a:graphic>
</p:graphicFrame>"#;
    let picture = r#"<p:pic>
  <p:nvPicPr><p:cNvPr id="6" name="Picture"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>
  <p:blipFill><a:blip r:embed="rId2"/></p:blipFill>
  <p:spPr/>
</p:pic>"#;
    let content_slide = slide(&format!("{}{}{}", text_shape(4, &["Revenue", "grew"]), table, picture));
    let content_slide_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId2" Type="{}" Target="../media/image1.png"/>
</Relationships>"#,
        IMAGE_REL
    );
    let png = png_bytes();

    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
            ("_rels/.rels", package_rels("ppt/presentation.xml").as_bytes()),
            ("ppt/presentation.xml", presentation.as_bytes()),
            ("ppt/_rels/presentation.xml.rels", presentation_rels.as_bytes()),
            ("ppt/slides/slide1.xml", content_slide.as_bytes()),
            ("ppt/slides/_rels/slide1.xml.rels", content_slide_rels.as_bytes()),
            ("ppt/slides/slide2.xml", title_slide.as_bytes()),
            ("ppt/media/image1.png", &png),
        ],
    );
    path
}

/// A two-page PDF: page 1 has the text "Hello PDF" and one 2x2 grayscale image,
/// page 2 is blank
pub fn write_pdf(dir: &Path, name: &str) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    ));

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hello PDF")]),
            Operation::new("ET", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![100.into(), 0.into(), 0.into(), 100.into(), 72.into(), 500.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("Failed to encode page content"),
    ));
    let first_page = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im1" => image_id },
        },
    });

    let blank_content = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let second_page = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => blank_content,
        "Resources" => dictionary! {},
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first_page.into(), second_page.into()],
            "Count" => 2,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).expect("Failed to save PDF fixture");
    path
}

/// A one-page PDF whose fonts and image live on the page-tree node, not the page
pub fn write_pdf_with_inherited_resources(dir: &Path, name: &str) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    ));

    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hello PDF")]),
            Operation::new("ET", vec![]),
            Operation::new("Do", vec!["Im1".into()]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("Failed to encode page content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
                "XObject" => dictionary! { "Im1" => image_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).expect("Failed to save PDF fixture");
    path
}
