use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// A table as a row-major grid of cell texts
pub type Table = Vec<Vec<String>>;

/// An image found in a document, with the text recognized in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub base64: String,
    pub ocr_text: String,
    /// 1-indexed page number, PDF sources only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// 1-indexed position of the image on its page, PDF sources only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<usize>,
}

impl ExtractedImage {
    /// Create a record from the raw image bytes and its OCR text
    pub fn from_blob(blob: &[u8], ocr_text: String) -> Self {
        Self {
            base64: STANDARD.encode(blob),
            ocr_text,
            page: None,
            image_index: None,
        }
    }

    /// Tag the record with its page and per-page index
    pub fn on_page(mut self, page: usize, image_index: usize) -> Self {
        self.page = Some(page);
        self.image_index = Some(image_index);
        self
    }
}

/// Normalized result returned for every supported format.
///
/// All three fields are always present; `text` is never a bare string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: Vec<String>,
    pub images: Vec<ExtractedImage>,
    pub tables: Vec<Table>,
}

/// Text as produced by an extractor, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextBlocks {
    Single(String),
    Sequence(Vec<String>),
}

impl Default for TextBlocks {
    fn default() -> Self {
        TextBlocks::Sequence(Vec::new())
    }
}

impl TextBlocks {
    /// Wrap a single block into a one-element sequence
    pub fn into_sequence(self) -> Vec<String> {
        match self {
            TextBlocks::Single(text) => vec![text],
            TextBlocks::Sequence(blocks) => blocks,
        }
    }
}

/// Output of a single extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtraction {
    pub text: TextBlocks,
    pub images: Vec<ExtractedImage>,
    pub tables: Vec<Table>,
}

impl RawExtraction {
    pub fn with_text_blocks(blocks: Vec<String>) -> Self {
        Self {
            text: TextBlocks::Sequence(blocks),
            ..Default::default()
        }
    }

    /// Convert into the `{text, images, tables}` shape, wrapping a single text block
    pub fn normalize(self) -> ExtractionResult {
        ExtractionResult {
            text: self.text.into_sequence(),
            images: self.images,
            tables: self.tables,
        }
    }
}
