//! Slide planning: walks a heading tree and emits typed slide records.
//!
//! Records are handed to a sink as soon as they are produced; the deck writer
//! consumes them one by one and nothing is written until the walk finishes.

use crate::chunk::{chunk_paragraphs, DEFAULT_CHUNK_BUDGET};
use crate::error::Result;
use crate::images::{ImageCatalog, DEFAULT_IMAGE_MATCH_DISTANCE};
use crate::theme::{TextBoxSpec, ThemeDescriptor};
use crate::types::{BoxGeometry, HeadingNode, SlideKind};
use std::path::PathBuf;

/// Title of the table-of-contents slide, also used to recognize it when reading a deck.
pub const TABLE_OF_CONTENTS_LABEL: &str = "Table of Contents";

/// Options for turning a tree into slides.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Character budget of one content slide.
    pub chunk_budget: usize,
    /// Largest edit distance between an image label and a heading title.
    pub image_match_distance: usize,
    /// Also start a PDF export once the deck is written.
    pub export_pdf: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            chunk_budget: DEFAULT_CHUNK_BUDGET,
            image_match_distance: DEFAULT_IMAGE_MATCH_DISTANCE,
            export_pdf: false,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget.max(1);
        self
    }

    pub fn with_image_match_distance(mut self, distance: usize) -> Self {
        self.image_match_distance = distance;
        self
    }

    pub fn with_export_pdf(mut self, export: bool) -> Self {
        self.export_pdf = export;
        self
    }
}

/// Boxes and fonts of one slide, resolved from the theme for its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideGeometry {
    pub title: TextBoxSpec,
    pub content: Option<TextBoxSpec>,
    pub image: Option<BoxGeometry>,
}

/// What a slide shows, by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideContent {
    Title,
    TableOfContents { entries: Vec<String> },
    Theme { entries: Vec<String> },
    /// Paragraphs of one chunk and the illustration chosen for the heading.
    Content {
        paragraphs: Vec<String>,
        image: Option<PathBuf>,
    },
}

/// A slide ready to be materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRecord {
    /// Empty on continuation slides of a chunked body.
    pub title: String,
    pub content: SlideContent,
    pub geometry: SlideGeometry,
}

impl SlideContent {
    pub fn kind(&self) -> SlideKind {
        match self {
            SlideContent::Title => SlideKind::Title,
            SlideContent::TableOfContents { .. } => SlideKind::TableOfContents,
            SlideContent::Theme { .. } => SlideKind::Theme,
            SlideContent::Content { .. } => SlideKind::Content,
        }
    }
}

impl SlideRecord {
    pub fn kind(&self) -> SlideKind {
        self.content.kind()
    }
}

/// Walks a heading tree in pre-order and produces slide records.
pub struct SlidePlanner<'a> {
    theme: &'a ThemeDescriptor,
    images: &'a ImageCatalog,
    options: &'a RenderOptions,
}

impl<'a> SlidePlanner<'a> {
    pub fn new(
        theme: &'a ThemeDescriptor,
        images: &'a ImageCatalog,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            theme,
            images,
            options,
        }
    }

    /// Emit the title slide, then the slides of every node in pre-order.
    pub fn plan<F>(&self, tree: &HeadingNode, sink: &mut F) -> Result<()>
    where
        F: FnMut(SlideRecord) -> Result<()>,
    {
        sink(self.record(tree.title.clone(), SlideContent::Title)?)?;
        self.visit(tree, sink)
    }

    fn visit<F>(&self, node: &HeadingNode, sink: &mut F) -> Result<()>
    where
        F: FnMut(SlideRecord) -> Result<()>,
    {
        match node.level {
            // A document with body text of its own gets content slides instead.
            1 if !node.has_body() => {
                let entries = node.child_titles();
                sink(self.record(
                    TABLE_OF_CONTENTS_LABEL.to_string(),
                    SlideContent::TableOfContents { entries },
                )?)?;
            }
            2 => {
                let entries = node.child_titles();
                sink(self.record(node.title.clone(), SlideContent::Theme { entries })?)?;
            }
            _ => {}
        }

        if node.has_body() {
            self.emit_body(node, sink)?;
        } else if node.level >= 3 {
            let image = self.image_for(node);
            sink(self.record(
                node.title.clone(),
                SlideContent::Content {
                    paragraphs: Vec::new(),
                    image,
                },
            )?)?;
        }

        for child in &node.children {
            self.visit(child, sink)?;
        }

        Ok(())
    }

    /// One content slide per chunk; only the first repeats the heading title.
    fn emit_body<F>(&self, node: &HeadingNode, sink: &mut F) -> Result<()>
    where
        F: FnMut(SlideRecord) -> Result<()>,
    {
        let image = self.image_for(node);
        let chunks = chunk_paragraphs(&node.body, self.options.chunk_budget);
        log::debug!("'{}' split into {} content slide(s)", node.title, chunks.len());

        for (idx, chunk) in chunks.iter().enumerate() {
            let title = if idx == 0 {
                node.title.clone()
            } else {
                String::new()
            };
            let paragraphs = chunk.paragraphs.iter().map(|p| p.to_string()).collect();
            sink(self.record(
                title,
                SlideContent::Content {
                    paragraphs,
                    image: image.clone(),
                },
            )?)?;
        }

        Ok(())
    }

    fn image_for(&self, node: &HeadingNode) -> Option<PathBuf> {
        self.images
            .best_match(&node.title, self.options.image_match_distance)
            .map(|entry| entry.path.clone())
    }

    fn record(&self, title: String, content: SlideContent) -> Result<SlideRecord> {
        let kind = content.kind();
        Ok(SlideRecord {
            title,
            content,
            geometry: self.geometry(kind)?,
        })
    }

    /// Resolve the boxes of a slide kind from the theme.
    pub fn geometry(&self, kind: SlideKind) -> Result<SlideGeometry> {
        let content = match kind {
            SlideKind::Title => None,
            _ => Some(self.theme.content_box(kind)?.clone()),
        };
        let image = match kind {
            SlideKind::Content => self.theme.image_box(kind),
            _ => None,
        };
        Ok(SlideGeometry {
            title: self.theme.title_box(kind)?.clone(),
            content,
            image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown;
    use crate::theme::tests::sample_theme;
    use crate::theme::ThemeUsage;

    fn plan(tree: &HeadingNode, images: &ImageCatalog, options: &RenderOptions) -> Vec<SlideRecord> {
        let theme = sample_theme(ThemeUsage::Render);
        let planner = SlidePlanner::new(&theme, images, options);
        let mut slides = Vec::new();
        planner
            .plan(tree, &mut |record| {
                slides.push(record);
                Ok(())
            })
            .unwrap();
        slides
    }

    fn kinds(slides: &[SlideRecord]) -> Vec<SlideKind> {
        slides.iter().map(SlideRecord::kind).collect()
    }

    #[test]
    fn test_oversized_paper_renders_four_slides() {
        let tree = HeadingNode::new(1, "Survey").with_child(
            HeadingNode::new(2, "Vision").with_child(HeadingNode::new(3, "ViT").with_body("x".repeat(300))),
        );
        let slides = plan(&tree, &ImageCatalog::new(), &RenderOptions::new());

        assert_eq!(
            kinds(&slides),
            vec![
                SlideKind::Title,
                SlideKind::TableOfContents,
                SlideKind::Theme,
                SlideKind::Content
            ]
        );
        assert_eq!(slides[0].title, "Survey");
        assert_eq!(slides[1].title, TABLE_OF_CONTENTS_LABEL);
        assert_eq!(
            slides[1].content,
            SlideContent::TableOfContents {
                entries: vec!["Vision".to_string()]
            }
        );
        assert_eq!(slides[2].title, "Vision");
        assert_eq!(slides[3].title, "ViT");
        match &slides[3].content {
            SlideContent::Content { paragraphs, .. } => assert_eq!(paragraphs[0].len(), 300),
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_continuation_slides_have_empty_titles() {
        let body = format!("{}\n\n{}\n\n{}", "a".repeat(150), "b".repeat(150), "c".repeat(20));
        let tree = HeadingNode::new(1, "T")
            .with_child(HeadingNode::new(2, "A").with_child(HeadingNode::new(3, "P").with_body(body)));
        let slides = plan(&tree, &ImageCatalog::new(), &RenderOptions::new());

        let titles: Vec<&str> = slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["T", TABLE_OF_CONTENTS_LABEL, "A", "P", ""]);
    }

    #[test]
    fn test_pre_order_follows_document_order() {
        let md = "# T\n## Zeta\n### Z1\nz\n## Alpha\n### A1\na\n### A0\nb";
        let slides = plan(&markdown::parse(md), &ImageCatalog::new(), &RenderOptions::new());
        let titles: Vec<&str> = slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["T", TABLE_OF_CONTENTS_LABEL, "Zeta", "Z1", "Alpha", "A1", "A0"]
        );
    }

    #[test]
    fn test_root_with_body_gets_content_slides() {
        let tree = HeadingNode::new(1, "Notes").with_body("loose text");
        let slides = plan(&tree, &ImageCatalog::new(), &RenderOptions::new());
        assert_eq!(kinds(&slides), vec![SlideKind::Title, SlideKind::Content]);
        assert_eq!(slides[1].title, "Notes");
    }

    #[test]
    fn test_paper_without_body_still_gets_a_slide() {
        let tree = HeadingNode::new(1, "T")
            .with_child(HeadingNode::new(2, "A").with_child(HeadingNode::new(3, "Empty")));
        let slides = plan(&tree, &ImageCatalog::new(), &RenderOptions::new());
        assert_eq!(slides.last().unwrap().title, "Empty");
        assert_eq!(
            slides.last().unwrap().content,
            SlideContent::Content {
                paragraphs: Vec::new(),
                image: None
            }
        );
    }

    #[test]
    fn test_content_slides_pick_matching_image() {
        let mut images = ImageCatalog::new();
        images.push("other.png", "Unrelated");
        images.push("vit.png", "ViT.");

        let tree = HeadingNode::new(1, "T")
            .with_child(HeadingNode::new(2, "A").with_child(HeadingNode::new(3, "ViT").with_body("text")));
        let slides = plan(&tree, &images, &RenderOptions::new());

        match &slides[3].content {
            SlideContent::Content { image, .. } => assert_eq!(image.as_deref(), Some(std::path::Path::new("vit.png"))),
            other => panic!("unexpected content {:?}", other),
        }
        assert!(slides[3].geometry.image.is_some());
        assert!(slides[2].geometry.image.is_none());
    }

    #[test]
    fn test_geometry_follows_kind() {
        let tree = HeadingNode::new(1, "T")
            .with_child(HeadingNode::new(2, "A").with_child(HeadingNode::new(3, "P").with_body("text")));
        let slides = plan(&tree, &ImageCatalog::new(), &RenderOptions::new());

        assert!(slides[0].geometry.content.is_none());
        assert_eq!(slides[0].geometry.title.pos_y, 5.44);
        assert_eq!(slides[2].geometry.title.pos_y, 5.0);
        assert_eq!(slides[3].geometry.title.font_size, 26.0);
    }

    #[test]
    fn test_budget_option() {
        let body = "one\n\ntwo\n\nthree";
        let tree = HeadingNode::new(1, "T")
            .with_child(HeadingNode::new(2, "A").with_child(HeadingNode::new(3, "P").with_body(body)));
        let options = RenderOptions::new().with_chunk_budget(4);
        let slides = plan(&tree, &ImageCatalog::new(), &options);
        assert_eq!(slides.len(), 3 + 3);
    }
}
