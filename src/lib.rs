//! TransformoDocs - turns uploaded documents into `{text, images, tables}`
//! Supports images, plain text, DOCX, PDF and PowerPoint files, with OCR on every image

pub mod config;
pub mod content;
pub mod docx_parser;
pub mod document_parser;
pub mod fast_pdf_extractor;
pub mod format_classifier;
pub mod http_handler;
pub mod image_parser;
pub mod logging;
pub mod ocr_engine;
pub mod ooxml_package;
pub mod powerpoint_parser;
pub mod text_parser;

/// Re-export the dispatcher
pub use document_parser::{DocumentProcessor, ProcessOutcome, Rejection};

/// Re-export the result model
pub use content::{ExtractedImage, ExtractionResult, RawExtraction, Table, TextBlocks};

/// Re-export format classification
pub use format_classifier::{FileFormat, classify, identify_file_format, is_machine_readable};

/// Re-export OCR engines
pub use ocr_engine::{BoundingBox, DisabledOcr, OcrEngine, OcrFragment, build_engine, join_fragments};

/// Re-export configuration and the HTTP surface
pub use config::{ConfigError, ServiceConfig};
pub use http_handler::{ApiError, UploadSettings, create_router, start_server};

/// Re-export fast PDF extraction
pub use fast_pdf_extractor::{FastPdfExtractor, PdfBackend};
