//! PPTX writer: materializes slide records as PresentationML slides.
//!
//! Every slide is a blank layout with absolutely positioned text boxes and
//! pictures taken from the theme geometry. The package is kept in memory and
//! only written out by [`DeckWriter::save`].

use crate::package::{Package, SlidePart, NS_A, NS_P, NS_R, SP_TREE_HEADER};
use deck_core::theme::{cm_to_emu, TextBoxSpec};
use deck_core::{BoxGeometry, Error, Result, SlideContent, SlideRecord, ThemeDescriptor};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A box in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EmuRect {
    x: i64,
    y: i64,
    cx: i64,
    cy: i64,
}

impl From<BoxGeometry> for EmuRect {
    fn from(b: BoxGeometry) -> Self {
        Self {
            x: cm_to_emu(b.x),
            y: cm_to_emu(b.y),
            cx: cm_to_emu(b.width),
            cy: cm_to_emu(b.height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

/// Builds a PPTX deck one slide record at a time.
pub struct DeckWriter<'a> {
    theme: &'a ThemeDescriptor,
    package: Package,
    slide_rect: EmuRect,
    /// Media name per source picture; `None` records a picture that failed to load.
    media: HashMap<PathBuf, Option<String>>,
}

impl<'a> DeckWriter<'a> {
    /// Create a writer for a theme validated for rendering.
    pub fn new(theme: &'a ThemeDescriptor) -> Result<Self> {
        let size = theme.slide_size()?;
        let slide_rect = EmuRect {
            x: 0,
            y: 0,
            cx: cm_to_emu(size.width),
            cy: cm_to_emu(size.height),
        };

        Ok(Self {
            theme,
            package: Package::new(slide_rect.cx, slide_rect.cy),
            slide_rect,
            media: HashMap::new(),
        })
    }

    pub fn slide_count(&self) -> usize {
        self.package.slide_count()
    }

    /// Render one slide record and append it to the deck.
    pub fn add_slide(&mut self, record: &SlideRecord) -> Result<()> {
        let index = self.package.slide_count();
        let mut slide = SlideBuilder::new();
        let theme = self.theme;

        if let Some(background) = theme.backgrounds.for_slide(record.kind(), index) {
            if let Some(media) = self.embed(background) {
                slide.picture(&media, self.slide_rect, "Background");
            }
        }

        match &record.content {
            SlideContent::Title => self.render_title(&mut slide, record),
            SlideContent::TableOfContents { entries } => {
                self.render_list(&mut slide, record, entries, Align::Left)
            }
            SlideContent::Theme { entries } => {
                self.render_list(&mut slide, record, entries, Align::Center)
            }
            SlideContent::Content { paragraphs, image } => {
                self.render_content(&mut slide, record, paragraphs, image.as_deref())
            }
        }

        log::debug!("Slide {}: {:?} '{}'", index + 1, record.kind(), record.title);
        self.package.add_slide(slide.finish());
        Ok(())
    }

    fn render_title(&self, slide: &mut SlideBuilder, record: &SlideRecord) {
        let title = &record.geometry.title;
        slide.text_box("Title", title, &[record.title.as_str()], true, Align::Left);
    }

    /// Table of contents and theme slides: a title and one entry per line.
    fn render_list(
        &self,
        slide: &mut SlideBuilder,
        record: &SlideRecord,
        entries: &[String],
        title_align: Align,
    ) {
        slide.text_box("Title", &record.geometry.title, &[record.title.as_str()], true, title_align);

        if let Some(content) = &record.geometry.content {
            if !entries.is_empty() {
                let lines: Vec<&str> = entries.iter().map(String::as_str).collect();
                slide.text_box("Content", content, &lines, false, Align::Left);
            }
        }
    }

    fn render_content(
        &mut self,
        slide: &mut SlideBuilder,
        record: &SlideRecord,
        paragraphs: &[String],
        image: Option<&Path>,
    ) {
        if !record.title.is_empty() {
            slide.text_box("Title", &record.geometry.title, &[record.title.as_str()], true, Align::Left);
        }

        if let Some(content) = &record.geometry.content {
            if !paragraphs.is_empty() {
                slide.paragraphs_box("Content", content, paragraphs);
            }
        }

        if let Some(path) = image {
            let Some(rect) = record.geometry.image else {
                log::warn!("theme has no img_info box, skipping {}", path.display());
                return;
            };
            if let Some(media) = self.embed(path) {
                slide.picture(&media, rect.into(), "Picture");
            }
        }
    }

    /// Add a picture to the package once; failures are logged and remembered.
    fn embed(&mut self, path: &Path) -> Option<String> {
        if let Some(cached) = self.media.get(path) {
            return cached.clone();
        }

        let media = match load_image(path) {
            Ok((ext, data)) => Some(self.package.add_media(ext, data)),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };
        self.media.insert(path.to_path_buf(), media.clone());
        media
    }

    /// Consume the writer and return the in-memory package.
    pub fn into_package(self) -> Package {
        self.package
    }

    /// Write the deck to `output` through a temporary file in the same directory.
    ///
    /// Nothing exists at `output` unless the whole package was written.
    pub fn save(self, output: &Path) -> Result<()> {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let writer = BufWriter::new(tmp.as_file_mut());
            let mut writer = self.package.write(writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(output).map_err(|e| Error::IoError(e.error))?;

        log::debug!(
            "Wrote {} slides to {}",
            self.package.slide_count(),
            output.display()
        );
        Ok(())
    }
}

/// Read a picture and detect its format from the leading bytes.
fn load_image(path: &Path) -> Result<(&'static str, Vec<u8>)> {
    let data = fs::read(path)
        .map_err(|e| Error::AssetError(format!("cannot read image {}: {}", path.display(), e)))?;

    let ext = image_extension(&data).ok_or_else(|| {
        Error::AssetError(format!("unsupported image format: {}", path.display()))
    })?;
    Ok((ext, data))
}

fn image_extension(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpeg")
    } else if data.starts_with(b"GIF8") {
        Some("gif")
    } else if data.starts_with(b"BM") {
        Some("bmp")
    } else {
        None
    }
}

/// Accumulates the shape tree of one slide.
struct SlideBuilder {
    shapes: String,
    next_id: u32,
    images: Vec<(String, String)>,
}

impl SlideBuilder {
    fn new() -> Self {
        Self {
            shapes: String::with_capacity(4096),
            next_id: 2,
            images: Vec::new(),
        }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// A text box with one paragraph per entry of `lines`.
    fn text_box(&mut self, name: &str, spec: &TextBoxSpec, lines: &[&str], bold: bool, align: Align) {
        let mut body = String::new();
        for line in lines {
            paragraph_xml(&mut body, line, spec, bold, align);
        }
        self.shape(name, spec, &body);
    }

    /// A text box of body paragraphs separated by an empty paragraph.
    fn paragraphs_box(&mut self, name: &str, spec: &TextBoxSpec, paragraphs: &[String]) {
        let mut body = String::new();
        for (idx, paragraph) in paragraphs.iter().enumerate() {
            if idx > 0 {
                empty_paragraph_xml(&mut body, spec);
            }
            paragraph_xml(&mut body, paragraph, spec, false, Align::Left);
        }
        self.shape(name, spec, &body);
    }

    fn shape(&mut self, name: &str, spec: &TextBoxSpec, paragraphs: &str) {
        let id = self.shape_id();
        let rect = EmuRect::from(spec.geometry());
        let _ = write!(
            self.shapes,
            r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="{} {}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
            id, name, id
        );
        xfrm_xml(&mut self.shapes, "p:spPr", rect, r#"<a:noFill/>"#);
        self.shapes.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);
        self.shapes.push_str(paragraphs);
        self.shapes.push_str("</p:txBody></p:sp>");
    }

    fn picture(&mut self, media: &str, rect: EmuRect, name: &str) {
        let id = self.shape_id();
        let rel_id = format!("rId{}", self.images.len() + 2);
        let _ = write!(
            self.shapes,
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{}" name="{} {}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#,
            id, name, id
        );
        let _ = write!(
            self.shapes,
            r#"<p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            rel_id
        );
        xfrm_xml(&mut self.shapes, "p:spPr", rect, "");
        self.shapes.push_str("</p:pic>");
        self.images.push((rel_id, media.to_string()));
    }

    fn finish(self) -> SlidePart {
        let mut xml = String::with_capacity(self.shapes.len() + 1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        let _ = write!(
            xml,
            r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree>"#,
            NS_A, NS_R, NS_P
        );
        xml.push_str(SP_TREE_HEADER);
        xml.push_str(&self.shapes);
        xml.push_str("</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>");

        SlidePart {
            xml,
            images: self.images,
        }
    }
}

fn xfrm_xml(out: &mut String, element: &str, rect: EmuRect, fill: &str) {
    let _ = write!(
        out,
        r#"<{el}><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{fill}</{el}>"#,
        rect.x,
        rect.y,
        rect.cx,
        rect.cy,
        el = element,
        fill = fill
    );
}

/// One `<a:p>`; line breaks inside `text` become `<a:br/>`.
fn paragraph_xml(out: &mut String, text: &str, spec: &TextBoxSpec, bold: bool, align: Align) {
    out.push_str("<a:p>");
    if align == Align::Center {
        out.push_str(r#"<a:pPr algn="ctr"/>"#);
    }
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push_str("<a:br/>");
        }
        if line.is_empty() {
            continue;
        }
        out.push_str("<a:r>");
        run_properties(out, spec, bold);
        let _ = write!(out, "<a:t>{}</a:t></a:r>", escape_text(line));
    }
    let _ = write!(out, r#"<a:endParaRPr lang="en-US" sz="{}" dirty="0"/></a:p>"#, font_size(spec));
}

fn empty_paragraph_xml(out: &mut String, spec: &TextBoxSpec) {
    let _ = write!(out, r#"<a:p><a:endParaRPr lang="en-US" sz="{}" dirty="0"/></a:p>"#, font_size(spec));
}

fn run_properties(out: &mut String, spec: &TextBoxSpec, bold: bool) {
    let _ = write!(out, r#"<a:rPr lang="en-US" sz="{}""#, font_size(spec));
    if bold {
        out.push_str(r#" b="1""#);
    }
    let font = escape_text(&spec.font_name);
    let _ = write!(
        out,
        r#" dirty="0"><a:latin typeface="{f}"/><a:ea typeface="{f}"/><a:cs typeface="{f}"/></a:rPr>"#,
        f = font
    );
}

/// Font size in hundredths of a point.
fn font_size(spec: &TextBoxSpec) -> i64 {
    (spec.font_size * 100.0).round() as i64
}

/// Escape text for XML, dropping control characters XML 1.0 cannot carry.
fn escape_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t'))
        .collect();
    quick_xml::escape::escape(cleaned.as_str()).into_owned()
}
