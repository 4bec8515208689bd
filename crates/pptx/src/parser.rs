//! PPTX file parser: reads slides as ordered lists of text frames and pictures.

use deck_core::{DeckFormat, Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";

/// A deck as read from disk.
#[derive(Debug, Clone, Default)]
pub struct Deck {
    /// Slide width in EMU.
    pub slide_width: i64,
    /// Slide height in EMU.
    pub slide_height: i64,
    /// Slides in presentation order.
    pub slides: Vec<DeckSlide>,
}

/// One slide and its shapes in document order.
#[derive(Debug, Clone, Default)]
pub struct DeckSlide {
    /// 1-based slide number.
    pub number: usize,
    pub shapes: Vec<DeckShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeKind {
    #[default]
    Text,
    Picture,
}

/// A text frame or picture with its bounds in EMU.
#[derive(Debug, Clone, Default)]
pub struct DeckShape {
    pub kind: ShapeKind,
    /// Paragraphs joined with `\n`, trimmed. Empty for pictures.
    pub text: String,
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
    /// Picture data, when the blip could be resolved.
    pub image: Option<ImagePart>,
}

/// An embedded picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    /// File extension of the media part, lowercased.
    pub ext: String,
    pub data: Vec<u8>,
}

/// Parser for PPTX (Office Open XML) files.
pub struct PptxParser;

impl PptxParser {
    /// Create a new PPTX parser.
    pub fn new() -> Self {
        Self
    }

    /// Open and parse a deck file, rejecting anything that is not a PPTX package.
    pub fn open(&self, path: &Path) -> Result<Deck> {
        let mut file = File::open(path)?;
        let mut magic = [0u8; 8];
        let read = file.read(&mut magic)?;
        file.rewind()?;

        match DeckFormat::from_magic(&magic[..read]) {
            Some(DeckFormat::Pptx) => {}
            Some(DeckFormat::Ppt) => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} is a legacy binary .ppt; save it as .pptx first",
                    path.display()
                )))
            }
            None => {
                let named_like_deck = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(DeckFormat::from_extension)
                    .is_some();
                let reason = if named_like_deck {
                    "is damaged or not a presentation package"
                } else {
                    "is not a PPTX file"
                };
                return Err(Error::UnsupportedFormat(format!(
                    "{} {}",
                    path.display(),
                    reason
                )));
            }
        }

        self.parse(BufReader::new(file))
    }

    /// Parse a PPTX file from a reader.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Deck> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let presentation = self.read_file_from_archive(&mut archive, PRESENTATION_PATH)?;
        let info = parse_presentation(&presentation)?;
        let slide_order = self.get_slide_order(&mut archive, &info.slide_rel_ids)?;

        let mut deck = Deck {
            slide_width: info.width,
            slide_height: info.height,
            slides: Vec::with_capacity(slide_order.len()),
        };

        for (idx, slide_path) in slide_order.iter().enumerate() {
            let slide = self.parse_slide(&mut archive, slide_path, idx + 1)?;
            deck.slides.push(slide);
        }

        log::debug!("Read {} slides", deck.slides.len());
        Ok(deck)
    }

    /// Get the ordered list of slide part paths.
    ///
    /// `sldIdLst` decides the order; without one, slides are sorted by number.
    fn get_slide_order<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_rel_ids: &[String],
    ) -> Result<Vec<String>> {
        let rels_content = self.read_file_from_archive(archive, PRESENTATION_RELS_PATH)?;
        let rels = parse_relationships(&rels_content, "ppt")?;

        if !slide_rel_ids.is_empty() {
            let mut order = Vec::with_capacity(slide_rel_ids.len());
            for rel_id in slide_rel_ids {
                match rels.get(rel_id) {
                    Some(rel) => order.push(rel.target.clone()),
                    None => log::warn!("slide relationship {} has no target", rel_id),
                }
            }
            return Ok(order);
        }

        let mut slides: Vec<(String, Option<usize>)> = rels
            .into_iter()
            .filter(|(_, rel)| is_slide_relationship(&rel.rel_type))
            .map(|(_, rel)| {
                let number = extract_slide_number(&rel.target);
                (rel.target, number)
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

    /// Parse a single slide from the archive.
    fn parse_slide<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        slide_path: &str,
        slide_number: usize,
    ) -> Result<DeckSlide> {
        let content = self.read_file_from_archive(archive, slide_path)?;
        let raw_shapes = extract_shapes_from_xml(&content)?;

        let rels = match rels_path_for(slide_path) {
            Some(path) if has_part(archive, &path) => {
                let text = self.read_file_from_archive(archive, &path)?;
                parse_relationships(&text, parent_dir(slide_path))?
            }
            _ => HashMap::new(),
        };

        let mut shapes = Vec::with_capacity(raw_shapes.len());
        for raw in raw_shapes {
            let image = match raw.embed.as_deref() {
                Some(rel_id) => self.read_image(archive, &rels, rel_id, slide_number),
                None => None,
            };
            shapes.push(DeckShape {
                kind: raw.kind,
                text: raw.text,
                x: raw.x,
                y: raw.y,
                cx: raw.cx,
                cy: raw.cy,
                image,
            });
        }

        Ok(DeckSlide {
            number: slide_number,
            shapes,
        })
    }

    /// Resolve and read a picture; an unreadable picture is skipped with a warning.
    fn read_image<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        rels: &HashMap<String, Relationship>,
        rel_id: &str,
        slide_number: usize,
    ) -> Option<ImagePart> {
        let Some(rel) = rels.get(rel_id) else {
            log::warn!("slide {}: picture relationship {} is missing", slide_number, rel_id);
            return None;
        };

        let data = match archive.by_name(&rel.target) {
            Ok(mut file) => {
                let mut data = Vec::new();
                match file.read_to_end(&mut data) {
                    Ok(_) => data,
                    Err(e) => {
                        log::warn!("slide {}: cannot read {}: {}", slide_number, rel.target, e);
                        return None;
                    }
                }
            }
            Err(e) => {
                log::warn!("slide {}: picture {} not found: {}", slide_number, rel.target, e);
                return None;
            }
        };

        let ext = Path::new(&rel.target)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_lowercase();

        Some(ImagePart { ext, data })
    }

    /// Read a file from the ZIP archive.
    fn read_file_from_archive<R: Read + Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Result<String> {
        let mut file = archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

        Ok(content)
    }
}

impl Default for PptxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Slide size and slide order from `presentation.xml`.
#[derive(Debug, Default)]
struct PresentationInfo {
    width: i64,
    height: i64,
    slide_rel_ids: Vec<String>,
}

fn parse_presentation(xml: &str) -> Result<PresentationInfo> {
    let mut info = PresentationInfo::default();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sldId" => {
                    if let Some(id) = relationship_id(e) {
                        info.slide_rel_ids.push(id);
                    }
                }
                b"sldSz" => {
                    info.width = attr_i64(e, b"cx").unwrap_or(0);
                    info.height = attr_i64(e, b"cy").unwrap_or(0);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    if info.width <= 0 || info.height <= 0 {
        return Err(Error::PptxParseError(
            "presentation.xml has no slide size".to_string(),
        ));
    }

    Ok(info)
}

#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    /// Package path of the target part.
    target: String,
}

/// Parse a `.rels` part into `Id -> Relationship`, resolving targets against `base_dir`.
fn parse_relationships(xml: &str, base_dir: &str) -> Result<HashMap<String, Relationship>> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => {
                            rel_type = String::from_utf8_lossy(&attr.value).to_string();
                        }
                        b"Target" => {
                            target = String::from_utf8_lossy(&attr.value).to_string();
                        }
                        b"Id" => {
                            id = String::from_utf8_lossy(&attr.value).to_string();
                        }
                        b"TargetMode" => {
                            external = attr.value.as_ref() == b"External";
                        }
                        _ => {}
                    }
                }

                if !external && !id.is_empty() {
                    rels.insert(
                        id,
                        Relationship {
                            rel_type,
                            target: resolve_target(base_dir, &target),
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(rels)
}

fn has_part<R: Read + Seek>(archive: &ZipArchive<R>, path: &str) -> bool {
    archive.file_names().any(|name| name == path)
}

fn is_slide_relationship(rel_type: &str) -> bool {
    rel_type.ends_with("/slide")
}

/// Shape data straight from the slide XML, before pictures are resolved.
#[derive(Debug, Default)]
struct RawShape {
    kind: ShapeKind,
    text: String,
    x: i64,
    y: i64,
    cx: i64,
    cy: i64,
    embed: Option<String>,
}

/// Extract text frames and pictures, in document order, from slide XML.
fn extract_shapes_from_xml(xml_content: &str) -> Result<Vec<RawShape>> {
    let mut shapes = Vec::new();
    // Run text is kept verbatim; whitespace between runs is significant.
    let mut reader = Reader::from_str(xml_content);

    let mut current_shape: Option<RawShape> = None;
    let mut seen_xfrm = false;
    let mut in_xfrm = false;
    let mut in_text_body = false;
    let mut in_paragraph = false;
    let mut in_run_text = false;
    let mut paragraph_count = 0usize;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" | b"pic" => {
                        let kind = if local_name(name.as_ref()) == b"pic" {
                            ShapeKind::Picture
                        } else {
                            ShapeKind::Text
                        };
                        current_shape = Some(RawShape {
                            kind,
                            ..RawShape::default()
                        });
                        seen_xfrm = false;
                        paragraph_count = 0;
                        current_text.clear();
                    }
                    b"xfrm" if current_shape.is_some() && !seen_xfrm => {
                        in_xfrm = true;
                    }
                    b"txBody" => {
                        in_text_body = true;
                    }
                    b"p" if in_text_body => {
                        in_paragraph = true;
                        if paragraph_count > 0 {
                            current_text.push('\n');
                        }
                        paragraph_count += 1;
                    }
                    b"br" if in_paragraph => {
                        current_text.push('\n');
                    }
                    b"t" if in_paragraph => {
                        in_run_text = true;
                    }
                    b"blip" => set_embed(&mut current_shape, e),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"off" if in_xfrm => {
                        if let Some(ref mut shape) = current_shape {
                            shape.x = attr_i64(e, b"x").unwrap_or(shape.x);
                            shape.y = attr_i64(e, b"y").unwrap_or(shape.y);
                        }
                    }
                    b"ext" if in_xfrm => {
                        if let Some(ref mut shape) = current_shape {
                            shape.cx = attr_i64(e, b"cx").unwrap_or(shape.cx);
                            shape.cy = attr_i64(e, b"cy").unwrap_or(shape.cy);
                        }
                    }
                    b"p" if in_text_body => {
                        if paragraph_count > 0 {
                            current_text.push('\n');
                        }
                        paragraph_count += 1;
                    }
                    b"br" if in_paragraph => {
                        current_text.push('\n');
                    }
                    b"blip" => set_embed(&mut current_shape, e),
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_run_text {
                    let text = e.unescape().unwrap_or_default();
                    current_text.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" | b"pic" => {
                        // End of shape - save it
                        if let Some(mut shape) = current_shape.take() {
                            shape.text = current_text
                                .replace('\u{000b}', "\n")
                                .replace('\r', "\n")
                                .trim()
                                .to_string();
                            shapes.push(shape);
                        }
                        current_text.clear();
                        in_text_body = false;
                        in_paragraph = false;
                        in_run_text = false;
                        in_xfrm = false;
                    }
                    b"xfrm" if in_xfrm => {
                        in_xfrm = false;
                        seen_xfrm = true;
                    }
                    b"txBody" => {
                        in_text_body = false;
                    }
                    b"t" => {
                        in_run_text = false;
                    }
                    b"p" => {
                        in_paragraph = false;
                        in_run_text = false;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing slide: {}", e)));
            }
            _ => {}
        }
    }

    Ok(shapes)
}

fn set_embed(shape: &mut Option<RawShape>, e: &BytesStart) {
    if let Some(shape) = shape {
        for attr in e.attributes().flatten() {
            if local_name(attr.key.as_ref()) == b"embed" {
                shape.embed = Some(String::from_utf8_lossy(&attr.value).to_string());
            }
        }
    }
}

/// The namespaced `r:id` attribute, as opposed to the bare numeric `id`.
fn relationship_id(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() != b"id" && local_name(a.key.as_ref()) == b"id")
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn attr_i64(e: &BytesStart, key: &[u8]) -> Option<i64> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| String::from_utf8_lossy(&a.value).parse::<i64>().ok())
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    // Remove common extensions first
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    // Try to find digits at the end
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
fn rels_path_for(part: &str) -> Option<String> {
    let (dir, file) = part.rsplit_once('/')?;
    Some(format!("{}/_rels/{}.rels", dir, file))
}

/// Resolve a relationship target relative to the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
