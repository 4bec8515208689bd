//! Markdown heading-tree parser.
//!
//! `#`, `##` and `###` at the start of a line open document, theme and paper
//! headings. Everything else is body text of the nearest preceding heading.
//! The parser is a single pass over the lines and never fails: malformed
//! nesting is logged and the offending heading (with its body) is skipped.

use crate::types::HeadingNode;
use regex::Regex;
use std::sync::LazyLock;

/// Matches a level 1-3 heading; `####` and deeper are body text.
static HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,3})(?:[ \t]+(.*?))?[ \t]*$").unwrap());

/// Matches a line that consists of a single Markdown image link.
static IMAGE_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\[[^\]]*\]\(\s*([^)\s]+)\s*\)$").unwrap());

/// Parse Markdown text into a heading tree rooted at a single level-1 node.
pub fn parse(text: &str) -> HeadingNode {
    let mut builder = TreeBuilder::new();
    for (idx, line) in text.lines().enumerate() {
        builder.push_line(idx + 1, line);
    }
    builder.finish()
}

/// Where new body text currently goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Root,
    Theme,
    Paper,
}

struct TreeBuilder {
    root: HeadingNode,
    cursor: Cursor,
    seen_heading: bool,
    /// Set while the body of an ignored heading is being dropped.
    skipping: bool,
    paragraphs: Vec<String>,
    current: Vec<String>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            root: HeadingNode::new(1, ""),
            cursor: Cursor::Root,
            seen_heading: false,
            skipping: false,
            paragraphs: Vec::new(),
            current: Vec::new(),
        }
    }

    fn push_line(&mut self, line_no: usize, line: &str) {
        let trimmed = line.trim_start();

        if let Some(caps) = HEADING_REGEX.captures(trimmed) {
            let level = caps[1].len() as u8;
            let title = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            self.open_heading(line_no, level, title);
            return;
        }

        if self.skipping {
            return;
        }

        if trimmed.is_empty() {
            self.close_paragraph();
            return;
        }

        if let Some(caps) = IMAGE_LINK_REGEX.captures(trimmed.trim_end()) {
            let path = caps[1].to_string();
            if let Some(node) = self.current_node() {
                node.images.push(path);
            }
            return;
        }

        self.current.push(line.trim_end().to_string());
    }

    fn open_heading(&mut self, line_no: usize, level: u8, title: &str) {
        self.flush_body();

        match level {
            1 => {
                if self.seen_heading {
                    log::warn!(
                        "line {}: ignoring extra document heading '{}'",
                        line_no,
                        title
                    );
                    self.skipping = true;
                    return;
                }
                self.root.title = title.to_string();
                self.cursor = Cursor::Root;
            }
            2 => {
                self.root.children.push(HeadingNode::new(2, title));
                self.cursor = Cursor::Theme;
            }
            _ => match self.root.children.last_mut() {
                Some(theme) => {
                    theme.children.push(HeadingNode::new(3, title));
                    self.cursor = Cursor::Paper;
                }
                None => {
                    log::warn!(
                        "line {}: ignoring paper heading '{}' outside of any theme",
                        line_no,
                        title
                    );
                    self.seen_heading = true;
                    self.skipping = true;
                    return;
                }
            },
        }

        self.seen_heading = true;
        self.skipping = false;
    }

    fn close_paragraph(&mut self) {
        if !self.current.is_empty() {
            self.paragraphs.push(self.current.join("\n"));
            self.current.clear();
        }
    }

    /// Move the buffered body into the node under the cursor.
    fn flush_body(&mut self) {
        self.close_paragraph();
        if self.paragraphs.is_empty() {
            return;
        }
        let body = std::mem::take(&mut self.paragraphs).join("\n\n");
        if self.skipping {
            return;
        }
        if let Some(node) = self.current_node() {
            if node.body.is_empty() {
                node.body = body;
            } else {
                node.body.push_str("\n\n");
                node.body.push_str(&body);
            }
        }
    }

    fn current_node(&mut self) -> Option<&mut HeadingNode> {
        match self.cursor {
            Cursor::Root => Some(&mut self.root),
            Cursor::Theme => self.root.children.last_mut(),
            Cursor::Paper => self
                .root
                .children
                .last_mut()
                .and_then(|theme| theme.children.last_mut()),
        }
    }

    fn finish(mut self) -> HeadingNode {
        self.flush_body();
        self.root
    }
}
