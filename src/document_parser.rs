use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::ServiceConfig;
use crate::content::{ExtractionResult, RawExtraction};
use crate::docx_parser::extract_docx;
use crate::fast_pdf_extractor::FastPdfExtractor;
use crate::format_classifier::{FileFormat, classify, is_machine_readable};
use crate::image_parser::extract_image_file;
use crate::ocr_engine::{OcrEngine, build_engine};
use crate::powerpoint_parser::extract_powerpoint;
use crate::text_parser::extract_text_file;

/// A file the dispatcher refuses to process. These are outcomes, not failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("The file '{file_name}' is already machine-readable.")]
    MachineReadable { file_name: String },
    #[error("Unsupported file type.")]
    UnsupportedFormat,
}

impl Serialize for Rejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", &self.to_string())?;
        map.end()
    }
}

/// Result of dispatching one file: `{text, images, tables}` or `{error}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessOutcome {
    Extracted(ExtractionResult),
    Rejected(Rejection),
}

/// Routes files to the matching extractor.
///
/// Holds the OCR engine shared by every extractor; create one per process.
#[derive(Clone)]
pub struct DocumentProcessor {
    ocr: Arc<dyn OcrEngine>,
}

impl DocumentProcessor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(build_engine(config)?))
    }

    pub fn ocr_engine_name(&self) -> &'static str {
        self.ocr.name()
    }

    /// Validate, classify and extract a single file.
    ///
    /// The extension check runs before the file is touched. Extractor failures
    /// (corrupt or mislabelled content) are returned as errors.
    pub fn process_file(&self, file_path: &Path) -> Result<ProcessOutcome> {
        if is_machine_readable(file_path) {
            let file_name = file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.to_string_lossy().into_owned());
            log::info!("Rejected machine-readable file {}", file_name);
            return Ok(ProcessOutcome::Rejected(Rejection::MachineReadable { file_name }));
        }

        let Some(format) = classify(file_path) else {
            log::info!("Rejected unsupported file {}", file_path.display());
            return Ok(ProcessOutcome::Rejected(Rejection::UnsupportedFormat));
        };
        log::debug!("Classified {} as {}", file_path.display(), format.label());

        let result = self
            .extract(format, file_path)
            .with_context(|| format!("Failed to process {} as {}", file_path.display(), format.label()))?
            .normalize();

        log::info!(
            "Extracted {}: {} text blocks, {} images, {} tables",
            file_path.display(),
            result.text.len(),
            result.images.len(),
            result.tables.len()
        );
        Ok(ProcessOutcome::Extracted(result))
    }

    fn extract(&self, format: FileFormat, file_path: &Path) -> Result<RawExtraction> {
        let ocr = self.ocr.as_ref();
        match format {
            FileFormat::Image => extract_image_file(file_path, ocr),
            FileFormat::Text => extract_text_file(file_path),
            FileFormat::WordDocument => extract_docx(file_path, ocr),
            FileFormat::Pdf => FastPdfExtractor::extract(file_path, ocr),
            FileFormat::Presentation => extract_powerpoint(file_path, ocr),
        }
    }
}
