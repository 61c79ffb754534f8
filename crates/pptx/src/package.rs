//! PPTX package I/O: ZIP parts, slide order and write-back.

use deckfill_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::xml::{local_name, XmlDocument};

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// One ZIP entry, kept with the metadata needed to write it back unchanged.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    modified: DateTime,
    unix_mode: Option<u32>,
    is_dir: bool,
}

/// An opened slide deck held fully in memory.
///
/// Cloning yields an independent copy; rendering works on such copies
/// so the source template is never modified.
#[derive(Debug, Clone)]
pub struct SlideDeck {
    parts: Vec<Part>,
    slide_paths: Vec<String>,
}

impl SlideDeck {
    /// Open a deck from a reader.
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive =
            ZipArchive::new(reader).map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let mut file = archive
                .by_index(idx)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", idx, e)))?;

            let mut data = Vec::new();
            if !file.is_dir() {
                file.read_to_end(&mut data)
                    .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", file.name(), e)))?;
            }

            parts.push(Part {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                modified: file.last_modified(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }

        let mut deck = Self {
            parts,
            slide_paths: Vec::new(),
        };
        deck.slide_paths = deck.resolve_slide_order()?;
        log::debug!("Opened deck with {} slides", deck.slide_paths.len());

        Ok(deck)
    }

    /// Open a deck from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::open(Cursor::new(bytes))
    }

    /// Number of slides in presentation order.
    pub fn slide_count(&self) -> usize {
        self.slide_paths.len()
    }

    /// Part name of the slide at a 0-based position.
    pub fn slide_path(&self, index: usize) -> Result<&str> {
        self.slide_paths
            .get(index)
            .map(String::as_str)
            .ok_or(Error::SlideNotFound {
                index,
                count: self.slide_paths.len(),
            })
    }

    /// Parse the slide at a 0-based position.
    pub fn slide_xml(&self, index: usize) -> Result<XmlDocument> {
        let path = self.slide_path(index)?;
        let data = self
            .part(path)
            .ok_or_else(|| Error::InvalidPackage(format!("Missing slide part '{}'", path)))?;
        XmlDocument::parse(data)
    }

    /// Replace the slide at a 0-based position.
    pub fn set_slide_xml(&mut self, index: usize, doc: &XmlDocument) -> Result<()> {
        let path = self.slide_path(index)?.to_string();
        let data = doc.to_bytes()?;
        let part = self
            .parts
            .iter_mut()
            .find(|p| p.name == path)
            .ok_or_else(|| Error::InvalidPackage(format!("Missing slide part '{}'", path)))?;
        part.data = data;
        Ok(())
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name && !p.is_dir)
            .map(|p| p.data.as_slice())
    }

    /// Write the package, keeping entry order, compression and timestamps
    /// so the same content always produces the same bytes.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);

        for part in &self.parts {
            let compression = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let mut options = FileOptions::default()
                .compression_method(compression)
                .last_modified_time(part.modified);
            if let Some(mode) = part.unix_mode {
                options = options.unix_permissions(mode);
            }

            if part.is_dir {
                zip.add_directory(part.name.as_str(), options)
                    .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", part.name, e)))?;
                continue;
            }

            zip.start_file(part.name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", part.name, e)))?;
            zip.write_all(&part.data)?;
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish ZIP: {}", e)))
    }

    /// Serialize the package to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Resolve slide part names in presentation order.
    ///
    /// `p:sldIdLst` in presentation.xml is authoritative; decks without it
    /// fall back to ordering slide relationships by their number.
    fn resolve_slide_order(&self) -> Result<Vec<String>> {
        let rels = self
            .part(PRESENTATION_RELS_PATH)
            .ok_or_else(|| Error::InvalidPackage(format!("Missing '{}'", PRESENTATION_RELS_PATH)))?;
        let relationships = parse_slide_relationships(rels)?;

        let listed = match self.part(PRESENTATION_PATH) {
            Some(xml) => parse_slide_id_list(xml)?,
            None => Vec::new(),
        };

        if !listed.is_empty() {
            let by_id: HashMap<&str, &str> = relationships
                .iter()
                .map(|r| (r.id.as_str(), r.target.as_str()))
                .collect();
            return listed
                .iter()
                .map(|rid| {
                    by_id
                        .get(rid.as_str())
                        .map(|target| resolve_target(target))
                        .ok_or_else(|| {
                            Error::InvalidPackage(format!("Slide relationship '{}' not found", rid))
                        })
                })
                .collect();
        }

        let mut slides: Vec<(String, Option<usize>)> = relationships
            .iter()
            .map(|r| {
                let order_num = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.target));
                (resolve_target(&r.target), order_num)
            })
            .collect();

        // Sort slides by their number
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });

        Ok(slides.into_iter().map(|(path, _)| path).collect())
    }
}

/// A slide relationship from presentation.xml.rels.
#[derive(Debug)]
struct SlideRelationship {
    id: String,
    target: String,
}

fn parse_slide_relationships(xml: &[u8]) -> Result<Vec<SlideRelationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut slides = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"Relationship" => {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                // Slide layouts and masters share the "/slide" prefix.
                if rel_type.ends_with("/slide") {
                    slides.push(SlideRelationship { id, target });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(slides)
}

/// Relationship ids of `p:sldId` entries, in presentation order.
fn parse_slide_id_list(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut ids = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"sldId" => {
                // The relationship id is the namespaced `r:id`; plain `id` is the slide id.
                let rid = e.attributes().flatten().find_map(|attr| {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    (key.contains(':') && local_name(&key) == "id")
                        .then(|| String::from_utf8_lossy(&attr.value).to_string())
                });
                if let Some(rid) = rid {
                    ids.push(rid);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing presentation: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Turn a relationship target into a package part name.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{}", target),
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
