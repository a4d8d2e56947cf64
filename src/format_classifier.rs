use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use zip::ZipArchive;

/// Suffixes of files that are already machine-readable (source code, JSON)
const MACHINE_READABLE_SUFFIXES: [&str; 10] = [
    ".c", ".cpp", ".py", ".js", ".java", ".go", ".rb", ".php", ".swift", "json",
];

/// Number of leading bytes inspected when sniffing content
const SNIFF_LEN: u64 = 8192;

/// Document categories the dispatcher can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Image,
    Text,
    WordDocument,
    Pdf,
    Presentation,
}

impl FileFormat {
    /// Keyword matched against a format descriptor, in dispatch precedence order
    const PRECEDENCE: [(FileFormat, &'static str); 5] = [
        (FileFormat::Image, "image"),
        (FileFormat::Text, "text"),
        (FileFormat::WordDocument, "word"),
        (FileFormat::Pdf, "pdf"),
        (FileFormat::Presentation, "powerpoint"),
    ];

    /// Map a free-form format descriptor onto a category.
    ///
    /// Matching is a case-insensitive substring search; when a descriptor contains several
    /// keywords the first one in precedence order wins.
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let descriptor = descriptor.to_lowercase();
        Self::PRECEDENCE
            .iter()
            .find(|(_, keyword)| descriptor.contains(keyword))
            .map(|(format, _)| *format)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Image => "image",
            FileFormat::Text => "text",
            FileFormat::WordDocument => "word",
            FileFormat::Pdf => "pdf",
            FileFormat::Presentation => "powerpoint",
        }
    }
}

/// Check whether the file name carries a machine-readable extension.
/// Case-sensitive suffix match on the whole path, no content inspection.
pub fn is_machine_readable(file_path: &Path) -> bool {
    let name = file_path.to_string_lossy();
    MACHINE_READABLE_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

/// Describe the file's content format, ignoring its extension.
/// Returns `None` when the file cannot be read.
pub fn identify_file_format(file_path: &Path) -> Option<String> {
    match sniff_descriptor(file_path) {
        Ok(descriptor) => Some(descriptor),
        Err(e) => {
            log::debug!("Format sniffing failed for {}: {}", file_path.display(), e);
            None
        }
    }
}

/// Classify a file into a dispatch category
pub fn classify(file_path: &Path) -> Option<FileFormat> {
    identify_file_format(file_path)
        .as_deref()
        .and_then(FileFormat::from_descriptor)
}

fn sniff_descriptor(file_path: &Path) -> io::Result<String> {
    let mut head = Vec::new();
    File::open(file_path)?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)?;

    match infer::get(&head) {
        Some(kind) => describe_mime(kind.mime_type(), file_path),
        None => Ok(describe_untyped(&head).to_string()),
    }
}

/// libmagic-style descriptions of the non-image signatures `infer` recognizes.
/// Signatures missing here describe as plain `data`.
const SIGNATURE_DESCRIPTIONS: [(&str, &str); 15] = [
    ("application/pdf", "PDF document"),
    ("application/rtf", "Rich Text Format data, version 1"),
    ("application/postscript", "PostScript document text"),
    ("application/msword", "Composite Document File V2 Document, Microsoft Word"),
    ("application/vnd.ms-powerpoint", "Composite Document File V2 Document, Microsoft PowerPoint"),
    ("application/vnd.ms-excel", "Composite Document File V2 Document, Microsoft Excel"),
    ("application/x-ole-storage", "Composite Document File V2 Document"),
    ("application/vnd.oasis.opendocument.text", "OpenDocument Text"),
    ("application/vnd.oasis.opendocument.presentation", "OpenDocument Presentation"),
    ("application/vnd.oasis.opendocument.spreadsheet", "OpenDocument Spreadsheet"),
    ("application/epub+zip", "EPUB document"),
    ("application/x-mobipocket-ebook", "Mobipocket E-book"),
    ("text/html", "HTML document, ASCII text"),
    ("text/xml", "XML 1.0 document, ASCII text"),
    ("text/x-shellscript", "POSIX shell script, ASCII text executable"),
];

/// Turn a detected MIME type into a libmagic-style description
fn describe_mime(mime: &str, file_path: &Path) -> io::Result<String> {
    if let Some(subtype) = mime.strip_prefix("image/") {
        let subtype = subtype.trim_start_matches("x-").trim_end_matches("+xml");
        return Ok(format!("{} image data", subtype.to_uppercase()));
    }

    match mime {
        "application/zip"
        | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            return describe_zip_package(file_path);
        }
        _ => {}
    }

    let descriptor = SIGNATURE_DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, descriptor)| *descriptor)
        .unwrap_or_else(|| {
            log::debug!("No description for {} in {}", mime, file_path.display());
            "data"
        });
    Ok(descriptor.to_string())
}

/// Look inside a ZIP container to tell OOXML documents apart from plain archives
fn describe_zip_package(file_path: &Path) -> io::Result<String> {
    let archive = match ZipArchive::new(File::open(file_path)?) {
        Ok(archive) => archive,
        Err(e) => {
            log::debug!("ZIP signature without readable archive in {}: {}", file_path.display(), e);
            return Ok("Zip archive data".to_string());
        }
    };

    let descriptor = if archive.file_names().any(|name| name == "word/document.xml") {
        "Microsoft Word 2007+"
    } else if archive.file_names().any(|name| name == "ppt/presentation.xml") {
        "Microsoft PowerPoint 2007+"
    } else if archive.file_names().any(|name| name == "xl/workbook.xml") {
        "Microsoft Excel 2007+"
    } else {
        "Zip archive data"
    };
    Ok(descriptor.to_string())
}

/// Describe content without a known binary signature
fn describe_untyped(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return "empty";
    }
    if head.contains(&0) {
        return "data";
    }

    let valid_utf8 = match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut at the end of the sniffed window
        Err(e) => e.error_len().is_none(),
    };

    if !valid_utf8 {
        "ISO-8859 text"
    } else if head.is_ascii() {
        "ASCII text"
    } else {
        "UTF-8 Unicode text"
    }
}
