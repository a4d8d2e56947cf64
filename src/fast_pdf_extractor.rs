use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::content::{ExtractedImage, RawExtraction};
use crate::ocr_engine::{OcrEngine, recognize_embedded_text};

/// Page-by-page PDF extraction: text per page plus every image XObject on the page.
/// Text backends are tried in order until one succeeds.
pub struct FastPdfExtractor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PdfBackend {
    Lopdf,
    PdfExtract, // Fallback
}

const TEXT_BACKENDS: [PdfBackend; 2] = [PdfBackend::Lopdf, PdfBackend::PdfExtract];

/// Operators that paint text
const TEXT_SHOW_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// Per-page pdf-extract output, computed on first use
struct PdfExtractPages<'a> {
    path: &'a Path,
    pages: Option<std::result::Result<Vec<String>, String>>,
}

impl<'a> PdfExtractPages<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, pages: None }
    }

    fn page(&mut self, page_num: u32) -> Result<String> {
        let path = self.path;
        let pages = self.pages.get_or_insert_with(|| {
            pdf_extract::extract_text_by_pages(path).map_err(|e| e.to_string())
        });

        match pages {
            Ok(pages) => (page_num as usize)
                .checked_sub(1)
                .and_then(|index| pages.get(index))
                .cloned()
                .with_context(|| format!("pdf-extract produced no text for page {}", page_num)),
            Err(e) => anyhow::bail!("Failed to extract text with pdf-extract: {}", e),
        }
    }
}

impl FastPdfExtractor {
    /// Extract non-empty page texts (stripped) and all page images, pages in ascending order.
    /// Images carry their page number and 1-indexed position on the page.
    pub fn extract(path: &Path, ocr: &dyn OcrEngine) -> Result<RawExtraction> {
        let doc = Document::load(path)
            .with_context(|| format!("Failed to load PDF: {}", path.display()))?;
        let mut fallback = PdfExtractPages::new(path);

        let mut texts = Vec::new();
        let mut images = Vec::new();

        for (page_num, page_id) in doc.get_pages() {
            let text = Self::page_text(&doc, page_num, page_id, &mut fallback)
                .with_context(|| format!("Failed to extract text from page {} of {}", page_num, path.display()))?;
            let text = text.trim();
            if !text.is_empty() {
                texts.push(text.to_string());
            }

            let page_images = match page_images(&doc, page_id) {
                Ok(page_images) => page_images,
                Err(e) => {
                    log::debug!("Failed to get images from page {}: {:#}", page_num, e);
                    Vec::new()
                }
            };

            for (index, samples) in page_images.iter().enumerate() {
                let blob = image_blob(samples);
                let origin = format!("page {} image {}", page_num, index + 1);
                let ocr_text = recognize_embedded_text(ocr, &blob, &origin);
                images.push(ExtractedImage::from_blob(&blob, ocr_text).on_page(page_num as usize, index + 1));
            }
        }

        let mut result = RawExtraction::with_text_blocks(texts);
        result.images = images;
        Ok(result)
    }

    fn page_text(
        doc: &Document,
        page_num: u32,
        page_id: ObjectId,
        fallback: &mut PdfExtractPages,
    ) -> Result<String> {
        for backend in TEXT_BACKENDS {
            match Self::page_text_with_backend(doc, page_num, page_id, fallback, backend) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("Backend {:?} failed on page {}: {:#}", backend, page_num, e);
                    continue;
                }
            }
        }

        anyhow::bail!("All PDF text backends failed for page {}", page_num);
    }

    fn page_text_with_backend(
        doc: &Document,
        page_num: u32,
        page_id: ObjectId,
        fallback: &mut PdfExtractPages,
        backend: PdfBackend,
    ) -> Result<String> {
        match backend {
            PdfBackend::Lopdf => lopdf_page_text(doc, page_num, page_id),
            PdfBackend::PdfExtract => fallback.page(page_num),
        }
    }
}

/// Page text from lopdf, refused when lopdf cannot decode what the page shows.
///
/// lopdf only resolves fonts from resources the page owns or references, and it
/// silently skips strings shown with an unknown font. Both cases are reported as
/// errors so the next backend gets the page.
fn lopdf_page_text(doc: &Document, page_num: u32, page_id: ObjectId) -> Result<String> {
    let text = doc
        .extract_text(&[page_num])
        .with_context(|| format!("lopdf could not extract page {}", page_num))?;
    let content = doc
        .get_and_decode_page_content(page_id)
        .with_context(|| format!("lopdf could not decode the content of page {}", page_num))?;
    let fonts = doc.get_page_fonts(page_id)?;

    let mut shows_text = false;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(Ok(font)) = operation.operands.first().map(Object::as_name) {
                    if !fonts.contains_key(font) {
                        anyhow::bail!(
                            "Font /{} on page {} is not visible to lopdf",
                            String::from_utf8_lossy(font),
                            page_num
                        );
                    }
                }
            }
            operator if TEXT_SHOW_OPERATORS.contains(&operator) => shows_text = true,
            _ => {}
        }
    }

    if shows_text && text.trim().is_empty() {
        anyhow::bail!("lopdf decoded no text on page {} although it shows text", page_num);
    }
    Ok(text)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

/// The resource dictionary in effect for a page: its own, or the nearest
/// ancestor's in the page tree
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Option<&Dictionary>> {
    let mut node = doc.get_dictionary(page_id)?;
    let mut visited = HashSet::from([page_id]);

    loop {
        if let Ok(resources) = node.get(b"Resources") {
            let resources = resolve(doc, resources)
                .and_then(Object::as_dict)
                .context("Resources is not a dictionary")?;
            return Ok(Some(resources));
        }
        let Ok(parent_id) = node.get(b"Parent").and_then(Object::as_reference) else {
            return Ok(None);
        };
        if !visited.insert(parent_id) {
            anyhow::bail!("Page tree cycle at object {:?}", parent_id);
        }
        node = doc.get_dictionary(parent_id)?;
    }
}

/// Image XObjects a page draws from, in resource order.
///
/// Images nested in Form XObjects are included. An image referenced more than
/// once is listed once.
fn page_images(doc: &Document, page_id: ObjectId) -> Result<Vec<ImageSamples<'_>>> {
    let mut images = Vec::new();
    if let Some(resources) = page_resources(doc, page_id)? {
        collect_images(doc, resources, &mut HashSet::new(), &mut images);
    }
    Ok(images)
}

fn collect_images<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    seen: &mut HashSet<ObjectId>,
    images: &mut Vec<ImageSamples<'a>>,
) {
    let Ok(xobjects) = resources
        .get(b"XObject")
        .and_then(|xobjects| resolve(doc, xobjects))
        .and_then(Object::as_dict)
    else {
        return;
    };

    for (name, value) in xobjects.iter() {
        let stream = match value {
            Object::Reference(id) => {
                if !seen.insert(*id) {
                    continue;
                }
                match doc.get_object(*id).and_then(Object::as_stream) {
                    Ok(stream) => stream,
                    Err(e) => {
                        log::debug!("Skipping XObject /{}: {}", String::from_utf8_lossy(name), e);
                        continue;
                    }
                }
            }
            Object::Stream(stream) => stream,
            _ => continue,
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => match ImageSamples::from_stream(doc, stream) {
                Ok(samples) => images.push(samples),
                Err(e) => log::debug!("Skipping image /{}: {:#}", String::from_utf8_lossy(name), e),
            },
            Ok(b"Form") => {
                // A form without its own resources uses the page's, already visited
                if let Ok(form_resources) = stream
                    .dict
                    .get(b"Resources")
                    .and_then(|resources| resolve(doc, resources))
                    .and_then(Object::as_dict)
                {
                    collect_images(doc, form_resources, seen, images);
                }
            }
            _ => {}
        }
    }
}

/// The parts of an image XObject needed to recover its encoded bytes
#[derive(Debug, Clone)]
struct ImageSamples<'a> {
    width: u32,
    height: u32,
    color_space: Option<String>,
    bits_per_component: Option<i64>,
    filters: Vec<String>,
    content: &'a [u8],
}

impl<'a> ImageSamples<'a> {
    fn from_stream(doc: &Document, stream: &'a Stream) -> Result<Self> {
        let dict = &stream.dict;
        let dimension = |key: &[u8]| -> Result<u32> {
            let value = resolve(doc, dict.get(key)?)?.as_i64()?;
            u32::try_from(value).with_context(|| format!("Invalid image dimension {}", value))
        };
        let name_of = |object: &Object| -> Option<String> {
            object.as_name().ok().map(|name| String::from_utf8_lossy(name).into_owned())
        };

        let color_space = match dict.get(b"ColorSpace").and_then(|cs| resolve(doc, cs)) {
            Ok(Object::Array(array)) => array.first().and_then(name_of),
            Ok(other) => name_of(other),
            Err(_) => None,
        };
        let filters = match dict.get(b"Filter").and_then(|filter| resolve(doc, filter)) {
            Ok(Object::Array(array)) => array.iter().filter_map(name_of).collect(),
            Ok(other) => name_of(other).into_iter().collect(),
            Err(_) => Vec::new(),
        };
        let bits_per_component = dict
            .get(b"BitsPerComponent")
            .and_then(|bits| resolve(doc, bits))
            .and_then(Object::as_i64)
            .ok();

        Ok(Self {
            width: dimension(b"Width")?,
            height: dimension(b"Height")?,
            color_space,
            bits_per_component,
            filters,
            content: &stream.content,
        })
    }
}

/// Encoded image bytes for an XObject.
///
/// JPEG and JPEG 2000 streams are already complete files. Raw 8-bit samples
/// (unfiltered or Flate) are wrapped into a PNG. Anything else is returned as stored.
fn image_blob(image: &ImageSamples) -> Vec<u8> {
    let has_filter = |name: &str| image.filters.iter().any(|f| f == name);

    if has_filter("DCTDecode") || has_filter("JPXDecode") {
        return image.content.to_vec();
    }

    if image.filters.iter().all(|f| f == "FlateDecode") {
        match samples_to_png(image) {
            Ok(png) => return png,
            Err(e) => log::debug!("Keeping raw image stream, PNG conversion failed: {:#}", e),
        }
    } else {
        log::debug!("Unsupported image filter chain {:?}, keeping raw stream", image.filters);
    }

    image.content.to_vec()
}

fn samples_to_png(image: &ImageSamples) -> Result<Vec<u8>> {
    if image.bits_per_component.is_some_and(|bits| bits != 8) {
        anyhow::bail!("{} bits per component", image.bits_per_component.unwrap_or_default());
    }

    let samples = if image.filters.is_empty() {
        image.content.to_vec()
    } else {
        let mut decompressed = Vec::new();
        ZlibDecoder::new(image.content)
            .read_to_end(&mut decompressed)
            .context("Decompression failed")?;
        decompressed
    };

    let pixels = image.width as usize * image.height as usize;
    if pixels == 0 {
        anyhow::bail!("Empty image {}x{}", image.width, image.height);
    }
    let components = match image.color_space.as_deref() {
        Some("DeviceGray" | "CalGray" | "G") => 1,
        Some("DeviceRGB" | "CalRGB" | "RGB") => 3,
        Some("DeviceCMYK" | "CMYK") => 4,
        // ICC-based and unnamed spaces: infer from the sample count
        _ => samples.len() / pixels,
    };

    let decoded = match components {
        1 => GrayImage::from_raw(image.width, image.height, samples).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(image.width, image.height, samples).map(DynamicImage::ImageRgb8),
        4 => RgbImage::from_raw(image.width, image.height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8),
        other => anyhow::bail!("Unsupported component count {}", other),
    }
    .context("Sample data does not match image dimensions")?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(png)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let k = 1.0 - f32::from(chunk[3]) / 255.0;
        for &ink in &chunk[..3] {
            rgb.push((255.0 * (1.0 - f32::from(ink) / 255.0) * k) as u8);
        }
    }
    rgb
}
