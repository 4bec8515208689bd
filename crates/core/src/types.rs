//! Domain types shared by the Markdown, schema and deck sides of the pipeline.

use serde::{Deserialize, Serialize};

/// A heading in the document tree.
///
/// Level 1 is the document title, level 2 a theme and level 3 a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingNode {
    /// Heading level (1..=3).
    pub level: u8,

    /// Heading text without the `#` marker.
    pub title: String,

    /// Raw body text. Paragraphs are separated by a single blank line.
    pub body: String,

    /// Child headings, exactly one level deeper.
    pub children: Vec<HeadingNode>,

    /// Image references found in the body as Markdown image links.
    pub images: Vec<String>,
}

impl HeadingNode {
    /// Create an empty heading at the given level.
    pub fn new(level: u8, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: String::new(),
            children: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Builder: set the body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder: append a child heading.
    pub fn with_child(mut self, child: HeadingNode) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the node carries body text.
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }

    /// Titles of the immediate children, in order.
    pub fn child_titles(&self) -> Vec<String> {
        self.children.iter().map(|c| c.title.clone()).collect()
    }

    /// Visit this node and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a HeadingNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// The kind of a slide, which selects its layout in the theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlideKind {
    /// The deck's opening slide.
    Title,
    /// Lists the themes of the document.
    TableOfContents,
    /// Opens a theme section.
    Theme,
    /// Carries a paper's text.
    Content,
}

impl SlideKind {
    /// Every slide kind, in rendering order.
    pub const ALL: [SlideKind; 4] = [
        SlideKind::Title,
        SlideKind::TableOfContents,
        SlideKind::Theme,
        SlideKind::Content,
    ];

    /// The key of this kind's page in the theme descriptor file.
    pub fn page_key(self) -> &'static str {
        match self {
            Self::Title => "first_page",
            Self::TableOfContents => "catalog_page",
            Self::Theme => "theme_page",
            Self::Content => "main_page",
        }
    }
}

/// A box on the slide, in centimeters from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxGeometry {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the top-left corner of `self` is within `tolerance` of `other`'s on both axes.
    pub fn origin_near(&self, other: &BoxGeometry, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// The format of a deck file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeckFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary), recognized only to be rejected.
    Ppt,
}

impl DeckFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            "ppt" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_pre_order() {
        let tree = HeadingNode::new(1, "root")
            .with_child(HeadingNode::new(2, "a").with_child(HeadingNode::new(3, "a1")))
            .with_child(HeadingNode::new(2, "b"));

        let mut seen = Vec::new();
        tree.walk(&mut |n| seen.push(n.title.as_str()));
        assert_eq!(seen, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_origin_near() {
        let a = BoxGeometry::new(1.0, 2.0, 10.0, 3.0);
        assert!(a.origin_near(&BoxGeometry::new(1.9, 1.1, 0.0, 0.0), 1.0));
        assert!(!a.origin_near(&BoxGeometry::new(2.5, 2.0, 10.0, 3.0), 1.0));
    }

    #[test]
    fn test_format_from_magic() {
        assert_eq!(
            DeckFormat::from_magic(&[0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0]),
            Some(DeckFormat::Pptx)
        );
        assert_eq!(
            DeckFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(DeckFormat::Ppt)
        );
        assert_eq!(DeckFormat::from_magic(b"# T"), None);
        assert_eq!(DeckFormat::from_extension("PPTX"), Some(DeckFormat::Pptx));
    }
}
