use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::content::{RawExtraction, TextBlocks};

/// Read a plain-text file as a single text block.
///
/// The file must be valid UTF-8. Line endings are normalized to `\n`.
pub fn extract_text_file(path: &Path) -> Result<RawExtraction> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} as UTF-8 text", path.display()))?;

    Ok(RawExtraction {
        text: TextBlocks::Single(normalize_newlines(&contents)),
        ..Default::default()
    })
}

fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}
