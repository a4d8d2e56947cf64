use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::content::{ExtractedImage, RawExtraction};
use crate::ocr_engine::{OcrEngine, recognize_text};

/// Return the image itself, base64-encoded, with its OCR text. No body text or tables.
pub fn extract_image_file(path: &Path, ocr: &dyn OcrEngine) -> Result<RawExtraction> {
    let blob = fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))?;
    let ocr_text = recognize_text(ocr, &blob)
        .with_context(|| format!("OCR failed for {}", path.display()))?;

    Ok(RawExtraction {
        images: vec![ExtractedImage::from_blob(&blob, ocr_text)],
        ..Default::default()
    })
}
