//! Structure recovery from a rendered deck.
//!
//! Slides are classified by where their first text frame sits relative to
//! the theme geometry, then reassembled into heading Markdown.

use crate::parser::{Deck, DeckShape, ImagePart, ShapeKind};
use deck_core::theme::{cm_to_emu, emu_to_cm};
use deck_core::{BoxGeometry, Result, SlideKind, ThemeDescriptor, TABLE_OF_CONTENTS_LABEL};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest offset, per axis, between a title frame and the theme slide title box.
pub const DEFAULT_TITLE_TOLERANCE_CM: f64 = 1.0;

/// Largest deviation from the slide bounds for a picture to count as background.
pub const DEFAULT_BACKGROUND_TOLERANCE_CM: f64 = 0.25;

/// Alt text of image links written into recovered Markdown.
const IMAGE_ALT_TEXT: &str = "inserted_image";

/// Options for reading a deck back.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub title_tolerance_cm: f64,
    pub background_tolerance_cm: f64,
    /// Title of slides to drop as tables of contents.
    pub toc_label: String,
    /// Merge chunked continuation slides into the preceding content slide.
    pub merge_continuations: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            title_tolerance_cm: DEFAULT_TITLE_TOLERANCE_CM,
            background_tolerance_cm: DEFAULT_BACKGROUND_TOLERANCE_CM,
            toc_label: TABLE_OF_CONTENTS_LABEL.to_string(),
            merge_continuations: true,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title_tolerance(mut self, cm: f64) -> Self {
        self.title_tolerance_cm = cm;
        self
    }

    pub fn with_background_tolerance(mut self, cm: f64) -> Self {
        self.background_tolerance_cm = cm;
        self
    }

    pub fn with_toc_label(mut self, label: impl Into<String>) -> Self {
        self.toc_label = label.into();
        self
    }

    pub fn with_merge_continuations(mut self, merge: bool) -> Self {
        self.merge_continuations = merge;
        self
    }
}

/// A picture pulled out of a slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// 1-based number of the slide the picture came from.
    pub slide_number: usize,
    /// 1-based position among the kept pictures of that slide.
    pub index: usize,
    pub part: ImagePart,
    /// Where the picture was written, once it was.
    pub path: Option<PathBuf>,
}

impl ExtractedImage {
    pub fn file_name(&self) -> String {
        format!("slide{}_img{}.{}", self.slide_number, self.index, self.part.ext)
    }
}

/// A classified slide.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSlide {
    pub kind: SlideKind,
    pub title: String,
    /// Texts after the title, newline-joined.
    pub content: String,
    pub images: Vec<ExtractedImage>,
}

/// Classifies the slides of a deck against a theme.
pub struct DeckExtractor<'a> {
    theme: &'a ThemeDescriptor,
    options: &'a ExtractOptions,
}

impl<'a> DeckExtractor<'a> {
    pub fn new(theme: &'a ThemeDescriptor, options: &'a ExtractOptions) -> Self {
        Self { theme, options }
    }

    /// Classify every slide. Tables of contents are dropped; pictures are kept
    /// only when `with_images` is set.
    pub fn extract(&self, deck: &Deck, with_images: bool) -> Result<Vec<ExtractedSlide>> {
        let theme_title = self.theme.title_box(SlideKind::Theme)?.geometry();
        let mut slides: Vec<ExtractedSlide> = Vec::with_capacity(deck.slides.len());

        for (idx, slide) in deck.slides.iter().enumerate() {
            let texts: Vec<&DeckShape> = slide
                .shapes
                .iter()
                .filter(|s| s.kind == ShapeKind::Text && !s.text.is_empty())
                .collect();

            let images = if with_images {
                self.pictures(deck, &slide.shapes, slide.number)
            } else {
                Vec::new()
            };

            let Some((first, rest)) = texts.split_first() else {
                log::debug!("slide {} has no text", slide.number);
                if idx == 0 {
                    slides.push(ExtractedSlide {
                        kind: SlideKind::Title,
                        title: String::new(),
                        content: String::new(),
                        images,
                    });
                } else if let Some(previous) = slides.last_mut() {
                    previous.images.extend(images);
                }
                continue;
            };

            if idx == 0 {
                slides.push(ExtractedSlide {
                    kind: SlideKind::Title,
                    title: first.text.clone(),
                    content: join_texts(rest),
                    images,
                });
                continue;
            }

            if first.text == self.options.toc_label {
                log::debug!("slide {} skipped as table of contents", slide.number);
                continue;
            }

            if shape_geometry(first).origin_near(&theme_title, self.options.title_tolerance_cm) {
                slides.push(ExtractedSlide {
                    kind: SlideKind::Theme,
                    title: first.text.clone(),
                    content: join_texts(rest),
                    images,
                });
                continue;
            }

            if self.options.merge_continuations && self.is_continuation(first) {
                if let Some(previous) = slides.last_mut().filter(|s| s.kind == SlideKind::Content) {
                    let text = join_texts(&texts);
                    if previous.content.is_empty() {
                        previous.content = text;
                    } else {
                        previous.content.push_str("\n\n");
                        previous.content.push_str(&text);
                    }
                    previous.images.extend(images);
                    log::debug!("slide {} merged into previous content slide", slide.number);
                    continue;
                }
            }

            slides.push(ExtractedSlide {
                kind: SlideKind::Content,
                title: first.text.clone(),
                content: join_texts(rest),
                images,
            });
        }

        Ok(slides)
    }

    /// Whether a slide's first text sits in the content box rather than the title box.
    fn is_continuation(&self, first: &DeckShape) -> bool {
        let Some(page) = self.theme.page(SlideKind::Content) else {
            return false;
        };
        let Some(content) = page.content_info.as_ref() else {
            return false;
        };

        let tolerance = self.options.title_tolerance_cm;
        let position = shape_geometry(first);
        position.origin_near(&content.geometry(), tolerance)
            && !position.origin_near(&page.title_info.geometry(), tolerance)
    }

    fn pictures(&self, deck: &Deck, shapes: &[DeckShape], slide_number: usize) -> Vec<ExtractedImage> {
        let tolerance = cm_to_emu(self.options.background_tolerance_cm);
        let mut images = Vec::new();

        for shape in shapes.iter().filter(|s| s.kind == ShapeKind::Picture) {
            if is_background(shape, deck.slide_width, deck.slide_height, tolerance) {
                continue;
            }
            if let Some(part) = &shape.image {
                images.push(ExtractedImage {
                    slide_number,
                    index: images.len() + 1,
                    part: part.clone(),
                    path: None,
                });
            }
        }

        images
    }
}

/// A picture covering the whole slide, within `tolerance` EMU on every edge.
pub fn is_background(shape: &DeckShape, slide_width: i64, slide_height: i64, tolerance: i64) -> bool {
    shape.x.abs() <= tolerance
        && shape.y.abs() <= tolerance
        && (shape.cx - slide_width).abs() <= tolerance
        && (shape.cy - slide_height).abs() <= tolerance
}

fn shape_geometry(shape: &DeckShape) -> BoxGeometry {
    BoxGeometry::new(
        emu_to_cm(shape.x),
        emu_to_cm(shape.y),
        emu_to_cm(shape.cx),
        emu_to_cm(shape.cy),
    )
}

fn join_texts(shapes: &[&DeckShape]) -> String {
    shapes
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write every buffered picture into `dir` and record where it went.
pub fn write_images(slides: &mut [ExtractedSlide], dir: &Path) -> Result<()> {
    let count: usize = slides.iter().map(|s| s.images.len()).sum();
    if count == 0 {
        return Ok(());
    }

    fs::create_dir_all(dir)?;
    let dir = std::path::absolute(dir)?;

    for image in slides.iter_mut().flat_map(|s| s.images.iter_mut()) {
        let path = dir.join(image.file_name());
        fs::write(&path, &image.part.data)?;
        image.path = Some(path);
    }

    log::debug!("Wrote {} images to {}", count, dir.display());
    Ok(())
}

/// Reassemble heading Markdown from classified slides.
///
/// Only images that were written out are linked.
pub fn to_markdown(slides: &[ExtractedSlide]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let last = slides.len().saturating_sub(1);

    for (idx, slide) in slides.iter().enumerate() {
        let title = slide.title.trim();
        match slide.kind {
            SlideKind::Title => lines.push(format!("{}\n", heading(1, title))),
            SlideKind::Theme => {
                lines.push(format!("{}\n", heading(2, title)));
                continue;
            }
            _ => {
                lines.push(format!("{}\n", heading(3, title)));
                let content = slide.content.trim();
                if !content.is_empty() {
                    lines.push(content.to_string());
                }
                for image in &slide.images {
                    if let Some(path) = &image.path {
                        lines.push(format!("![{}]({})", IMAGE_ALT_TEXT, path.display()));
                    }
                }
            }
        }

        if slide.kind != SlideKind::Title && idx != last {
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// An ATX heading; an empty title leaves just the marker.
fn heading(level: usize, title: &str) -> String {
    let marker = "#".repeat(level);
    if title.is_empty() {
        marker
    } else {
        format!("{} {}", marker, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DeckSlide;
    use deck_core::ThemeUsage;

    const THEME: &str = r#"{
        "theme_page": {"title_info": {"pos_x": 6.0, "pos_y": 6.0, "width": 20, "height": 2, "font_size": 32, "font_name": "Arial"}},
        "main_page": {"title_info": {"pos_x": 0.76, "pos_y": 0.76, "width": 22, "height": 2, "font_size": 26, "font_name": "Arial"},
                      "content_info": {"pos_x": 2.54, "pos_y": 4.12, "width": 12, "height": 9, "font_size": 14, "font_name": "Arial"}}
    }"#;

    const WIDTH: i64 = 9_144_000;
    const HEIGHT: i64 = 5_144_400;

    fn theme() -> ThemeDescriptor {
        ThemeDescriptor::from_json_str(THEME, Path::new("/nonexistent-theme"), ThemeUsage::Extract)
            .unwrap()
    }

    fn text(text: &str, x_cm: f64, y_cm: f64) -> DeckShape {
        DeckShape {
            kind: ShapeKind::Text,
            text: text.to_string(),
            x: cm_to_emu(x_cm),
            y: cm_to_emu(y_cm),
            cx: cm_to_emu(10.0),
            cy: cm_to_emu(2.0),
            image: None,
        }
    }

    fn picture(x: i64, y: i64, cx: i64, cy: i64) -> DeckShape {
        DeckShape {
            kind: ShapeKind::Picture,
            text: String::new(),
            x,
            y,
            cx,
            cy,
            image: Some(ImagePart {
                ext: "png".to_string(),
                data: vec![1, 2, 3],
            }),
        }
    }

    fn deck(slides: Vec<Vec<DeckShape>>) -> Deck {
        Deck {
            slide_width: WIDTH,
            slide_height: HEIGHT,
            slides: slides
                .into_iter()
                .enumerate()
                .map(|(idx, shapes)| DeckSlide {
                    number: idx + 1,
                    shapes,
                })
                .collect(),
        }
    }

    fn extract(deck: &Deck, options: &ExtractOptions) -> Vec<ExtractedSlide> {
        let theme = theme();
        DeckExtractor::new(&theme, options).extract(deck, true).unwrap()
    }

    #[test]
    fn test_title_within_tolerance_is_theme() {
        let options = ExtractOptions::default();
        let slides = extract(
            &deck(vec![
                vec![text("Deck", 3.0, 5.0)],
                vec![text("Exactly one off", 7.0, 7.0)],
                vec![text("Just beyond", 7.01, 6.0)],
            ]),
            &options,
        );

        assert_eq!(slides[1].kind, SlideKind::Theme);
        assert_eq!(slides[2].kind, SlideKind::Content);
    }

    #[test]
    fn test_background_detection() {
        let tolerance = cm_to_emu(DEFAULT_BACKGROUND_TOLERANCE_CM);
        assert_eq!(tolerance, 90_000);

        assert!(is_background(&picture(0, 0, WIDTH, HEIGHT), WIDTH, HEIGHT, tolerance));
        assert!(is_background(&picture(-50_000, 80_000, WIDTH + 10, HEIGHT - 90_000), WIDTH, HEIGHT, tolerance));
        assert!(!is_background(&picture(cm_to_emu(5.0), 0, WIDTH, HEIGHT), WIDTH, HEIGHT, tolerance));
        assert!(!is_background(&picture(0, 0, WIDTH / 2, HEIGHT), WIDTH, HEIGHT, tolerance));
    }

    #[test]
    fn test_background_pictures_are_dropped() {
        let options = ExtractOptions::default();
        let slides = extract(
            &deck(vec![
                vec![text("Deck", 3.0, 5.0)],
                vec![
                    picture(0, 0, WIDTH, HEIGHT),
                    text("Paper", 0.76, 0.76),
                    picture(cm_to_emu(15.0), cm_to_emu(4.0), cm_to_emu(9.0), cm_to_emu(6.0)),
                ],
            ]),
            &options,
        );

        assert_eq!(slides[1].images.len(), 1);
        assert_eq!(slides[1].images[0].file_name(), "slide2_img1.png");
    }

    #[test]
    fn test_table_of_contents_is_skipped() {
        let options = ExtractOptions::default();
        let slides = extract(
            &deck(vec![
                vec![text("Deck", 3.0, 5.0)],
                vec![text(TABLE_OF_CONTENTS_LABEL, 0.76, 0.76), text("ML", 2.0, 4.0)],
                vec![text("ML", 6.0, 6.0)],
            ]),
            &options,
        );

        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].title, "ML");
    }

    #[test]
    fn test_title_slide_without_text_is_kept() {
        let options = ExtractOptions::default();
        let slides = extract(
            &deck(vec![
                vec![picture(0, 0, WIDTH, HEIGHT)],
                vec![text("ML", 6.0, 6.0)],
                vec![text("P1", 0.76, 0.76), text("method: M1", 2.54, 4.12)],
            ]),
            &options,
        );

        assert_eq!(slides.len(), 3);
        assert_eq!(slides[0].kind, SlideKind::Title);
        assert_eq!(slides[0].title, "");
        assert_eq!(to_markdown(&slides), "#\n\n## ML\n\n### P1\n\nmethod: M1");
    }

    #[test]
    fn test_continuation_is_merged() {
        let options = ExtractOptions::default();
        let input = deck(vec![
            vec![text("Deck", 3.0, 5.0)],
            vec![text("Paper", 0.76, 0.76), text("first part", 2.54, 4.12)],
            vec![text("second part", 2.54, 4.12)],
        ]);

        let slides = extract(&input, &options);
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[1].content, "first part\n\nsecond part");

        let unmerged = extract(&input, &options.clone().with_merge_continuations(false));
        assert_eq!(unmerged.len(), 3);
        assert_eq!(unmerged[2].title, "second part");
    }

    #[test]
    fn test_to_markdown_layout() {
        let slides = vec![
            ExtractedSlide {
                kind: SlideKind::Title,
                title: "T".to_string(),
                content: String::new(),
                images: Vec::new(),
            },
            ExtractedSlide {
                kind: SlideKind::Theme,
                title: "ML".to_string(),
                content: "P1".to_string(),
                images: Vec::new(),
            },
            ExtractedSlide {
                kind: SlideKind::Content,
                title: "P1".to_string(),
                content: "content summary: S1\nmethod: M1".to_string(),
                images: vec![ExtractedImage {
                    slide_number: 3,
                    index: 1,
                    part: ImagePart {
                        ext: "png".to_string(),
                        data: Vec::new(),
                    },
                    path: Some(PathBuf::from("/out/slide3_img1.png")),
                }],
            },
            ExtractedSlide {
                kind: SlideKind::Content,
                title: "P2".to_string(),
                content: String::new(),
                images: Vec::new(),
            },
        ];

        assert_eq!(
            to_markdown(&slides),
            "# T\n\n## ML\n\n### P1\n\ncontent summary: S1\nmethod: M1\n![inserted_image](/out/slide3_img1.png)\n\n### P2\n"
        );
    }

    #[test]
    fn test_write_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut slides = vec![ExtractedSlide {
            kind: SlideKind::Content,
            title: "P".to_string(),
            content: String::new(),
            images: vec![ExtractedImage {
                slide_number: 4,
                index: 2,
                part: ImagePart {
                    ext: "jpeg".to_string(),
                    data: vec![0xFF, 0xD8, 0xFF],
                },
                path: None,
            }],
        }];

        write_images(&mut slides, &dir.path().join("imgs")).unwrap();
        let path = slides[0].images[0].path.clone().unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("slide4_img2.jpeg"));
        assert_eq!(fs::read(path).unwrap(), vec![0xFF, 0xD8, 0xFF]);
    }
}
