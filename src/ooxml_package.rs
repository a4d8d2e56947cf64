use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use roxmltree::Node;
use zip::ZipArchive;

const PACKAGE_RELATIONSHIPS: &str = "_rels/.rels";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// A relationship entry from a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`: the target is a URL or file outside the package
    pub external: bool,
}

impl Relationship {
    pub fn is_image(&self) -> bool {
        self.rel_type.contains("image")
    }
}

/// An opened OOXML zip container (DOCX, PPTX)
pub struct OoxmlPackage {
    archive: ZipArchive<File>,
    path: PathBuf,
}

impl OoxmlPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("Failed to read {} as ZIP archive", path.display()))?;

        Ok(Self {
            archive,
            path: path.to_path_buf(),
        })
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.archive.file_names().any(|part| part == name)
    }

    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Read a part as UTF-8 text
    pub fn read_text(&mut self, name: &str) -> Result<String> {
        let mut part = self
            .archive
            .by_name(name)
            .with_context(|| format!("Part {} not found in {}", name, self.path.display()))?;
        let mut contents = String::new();
        part.read_to_string(&mut contents)
            .with_context(|| format!("Failed to read part {}", name))?;
        Ok(contents)
    }

    pub fn read_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut part = self
            .archive
            .by_name(name)
            .with_context(|| format!("Part {} not found in {}", name, self.path.display()))?;
        let mut contents = Vec::new();
        part.read_to_end(&mut contents)
            .with_context(|| format!("Failed to read part {}", name))?;
        Ok(contents)
    }

    /// Relationships of `part` in document order. A part without a `.rels` has none.
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_part_name(part);
        if !self.has_part(&rels_name) {
            return Ok(Vec::new());
        }
        let xml = self.read_text(&rels_name)?;
        parse_relationships(&xml).with_context(|| format!("Malformed relationships part {}", rels_name))
    }

    /// Name of the main document part, as declared by the package relationships
    pub fn main_part(&mut self, fallback: &str) -> Result<String> {
        let declared = self
            .relationships("")?
            .into_iter()
            .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_REL) && !rel.external)
            .map(|rel| resolve_target("", &rel.target));

        Ok(match declared {
            Some(part) if self.has_part(&part) => part,
            _ => fallback.to_string(),
        })
    }
}

/// `.rels` part holding the relationships of `part`; `""` is the package itself
pub fn rels_part_name(part: &str) -> String {
    if part.is_empty() {
        return PACKAGE_RELATIONSHIPS.to_string();
    }
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that declares it.
///
/// Targets are relative to the source part's directory unless they start with `/`.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        if let Some((dir, _)) = source_part.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Element children of `node` with the given local name.
///
/// Names are compared without namespace so Transitional and Strict documents both match.
pub fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

pub fn first_child_named<'a, 'input>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children_named(node, name).next()
}

/// Attribute value by local name, ignoring its prefix
pub fn attribute_local<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|attr| attr.name() == name)
        .map(|attr| attr.value())
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut relationships = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                relationships.push(rel);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}
