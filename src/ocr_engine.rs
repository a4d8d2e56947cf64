//! OCR engines shared by all extractors.
//!
//! An engine is created once at startup and shared across requests behind an `Arc`.
//! Tesseract is available with the `tesseract` feature; without it a disabled engine
//! recognizes nothing, so images are still returned with an empty `ocr_text`.

use std::sync::Arc;

use anyhow::Result;

use crate::config::ServiceConfig;

/// Axis-aligned box around a recognized fragment, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    fn union(self, other: BoundingBox) -> BoundingBox {
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.height).max(other.top + other.height);
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        BoundingBox {
            left,
            top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// One recognized piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFragment {
    pub bounding_box: BoundingBox,
    pub text: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
}

impl OcrFragment {
    pub fn new(text: impl Into<String>, bounding_box: BoundingBox, confidence: f32) -> Self {
        Self {
            bounding_box,
            text: text.into(),
            confidence,
        }
    }
}

/// Text recognition over encoded image bytes (PNG, JPEG, ...)
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recognize text fragments in reading order
    fn recognize(&self, image: &[u8]) -> Result<Vec<OcrFragment>>;
}

/// Join fragment texts with single spaces
pub fn join_fragments(fragments: &[OcrFragment]) -> String {
    fragments
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recognize an image and return its text
pub fn recognize_text(engine: &dyn OcrEngine, image: &[u8]) -> Result<String> {
    Ok(join_fragments(&engine.recognize(image)?))
}

/// Recognize an image embedded in a document.
/// Failures are logged and yield an empty string so the image record is still kept.
pub fn recognize_embedded_text(engine: &dyn OcrEngine, image: &[u8], origin: &str) -> String {
    match recognize_text(engine, image) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("OCR failed for embedded image {}: {:#}", origin, e);
            String::new()
        }
    }
}

/// Engine used when no OCR backend is compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn recognize(&self, _image: &[u8]) -> Result<Vec<OcrFragment>> {
        Ok(Vec::new())
    }
}

/// Build the process-wide OCR engine for the given configuration
pub fn build_engine(config: &ServiceConfig) -> Result<Arc<dyn OcrEngine>> {
    #[cfg(feature = "tesseract")]
    {
        let engine = tesseract::TesseractOcr::new(
            &config.ocr_languages,
            config.tessdata_path.as_deref(),
        )?;
        log::info!("OCR engine: tesseract ({})", config.ocr_languages);
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "tesseract"))]
    {
        log::warn!(
            "Built without the `tesseract` feature; OCR for '{}' is disabled and ocr_text will be empty",
            config.ocr_languages
        );
        Ok(Arc::new(DisabledOcr))
    }
}

/// Group Tesseract word-level TSV rows into line fragments.
///
/// Columns: level, page, block, paragraph, line, word, left, top, width, height, conf, text.
pub fn parse_tsv(tsv: &str) -> Vec<OcrFragment> {
    let mut fragments: Vec<OcrFragment> = Vec::new();
    let mut current_line: Option<(&str, &str, &str)> = None;
    let mut confidences: Vec<f32> = Vec::new();

    for row in tsv.lines() {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }
        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }

        let parse = |value: &str| value.trim().parse::<u32>().unwrap_or(0);
        let bounding_box = BoundingBox {
            left: parse(columns[6]),
            top: parse(columns[7]),
            width: parse(columns[8]),
            height: parse(columns[9]),
        };
        let confidence = (columns[10].trim().parse::<f32>().unwrap_or(0.0) / 100.0).clamp(0.0, 1.0);
        let line_key = (columns[2], columns[3], columns[4]);

        match fragments.last_mut() {
            Some(fragment) if current_line == Some(line_key) => {
                fragment.text.push(' ');
                fragment.text.push_str(text);
                fragment.bounding_box = fragment.bounding_box.union(bounding_box);
                confidences.push(confidence);
                fragment.confidence = confidences.iter().sum::<f32>() / confidences.len() as f32;
            }
            _ => {
                fragments.push(OcrFragment::new(text, bounding_box, confidence));
                confidences = vec![confidence];
                current_line = Some(line_key);
            }
        }
    }

    fragments
}

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result, anyhow};
    use kreuzberg_tesseract::{TessPageSegMode, TesseractAPI};

    use super::{OcrEngine, OcrFragment, parse_tsv};

    /// Fully automatic page segmentation
    const PSM_AUTO: i32 = 3;

    const TESSDATA_LOCATIONS: [&str; 7] = [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
        r#"C:\Program Files\Tesseract-OCR\tessdata"#,
        r#"C:\ProgramData\Tesseract-OCR\tessdata"#,
    ];

    /// Tesseract engine with a fixed language set.
    /// A fresh API handle is initialized per image.
    pub struct TesseractOcr {
        tessdata: String,
        languages: String,
    }

    impl TesseractOcr {
        pub fn new(languages: &str, tessdata_path: Option<&Path>) -> Result<Self> {
            if languages.trim().is_empty() {
                anyhow::bail!("OCR language list cannot be empty");
            }

            let tessdata = tessdata_path
                .map(Path::to_path_buf)
                .or_else(|| {
                    TESSDATA_LOCATIONS
                        .iter()
                        .map(PathBuf::from)
                        .find(|path| path.exists())
                })
                .unwrap_or_default();

            // A missing traineddata file crashes Tesseract instead of failing init
            if !tessdata.as_os_str().is_empty() {
                for language in languages.split('+').map(str::trim).filter(|l| !l.is_empty()) {
                    let traineddata = tessdata.join(format!("{}.traineddata", language));
                    if !traineddata.exists() {
                        anyhow::bail!(
                            "Tesseract language '{}' not found: {} does not exist",
                            language,
                            traineddata.display()
                        );
                    }
                }
            }

            Ok(Self {
                tessdata: tessdata.to_string_lossy().into_owned(),
                languages: languages.to_string(),
            })
        }

        fn api(&self) -> Result<TesseractAPI> {
            let api = TesseractAPI::new();
            api.init(&self.tessdata, &self.languages)
                .map_err(|e| anyhow!("Failed to initialize Tesseract for '{}': {}", self.languages, e))?;
            api.set_page_seg_mode(TessPageSegMode::from_int(PSM_AUTO))
                .map_err(|e| anyhow!("Failed to set page segmentation mode: {}", e))?;
            Ok(api)
        }
    }

    impl OcrEngine for TesseractOcr {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, image: &[u8]) -> Result<Vec<OcrFragment>> {
            let decoded = image::load_from_memory(image).context("Failed to decode image for OCR")?;
            let rgb = decoded.to_rgb8();
            let (width, height) = rgb.dimensions();
            let bytes_per_pixel = 3;

            let api = self.api()?;
            api.set_image(
                rgb.as_raw(),
                width as i32,
                height as i32,
                bytes_per_pixel,
                (width as i32) * bytes_per_pixel,
            )
            .map_err(|e| anyhow!("Failed to set OCR image: {}", e))?;
            api.recognize()
                .map_err(|e| anyhow!("Failed to recognize text: {}", e))?;
            let tsv = api
                .get_tsv_text(0)
                .map_err(|e| anyhow!("Failed to read OCR output: {}", e))?;

            Ok(parse_tsv(&tsv))
        }
    }
}
