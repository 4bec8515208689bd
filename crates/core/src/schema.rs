//! The five-section summary schema and its Markdown convention.
//!
//! ```text
//! # <title>
//!
//! ## <theme name>
//!
//! ### <paper name>
//!
//! content summary: ...
//! method: ...
//! ```

use crate::markdown;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// A summary of several papers grouped by theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDocument {
    #[serde(default = "default_title")]
    pub title: String,

    /// Themes in document order.
    #[serde(default, with = "theme_map")]
    pub themes: Vec<ThemeSection>,
}

fn default_title() -> String {
    "Untitled Presentation".to_string()
}

fn default_paper_name() -> String {
    "Unnamed Paper".to_string()
}

impl SummaryDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            themes: Vec::new(),
        }
    }

    /// Append papers to a theme, creating the theme at the end if it is new.
    pub fn add_papers(&mut self, theme: &str, papers: impl IntoIterator<Item = PaperEntry>) {
        match self.themes.iter_mut().find(|t| t.name == theme) {
            Some(section) => section.papers.extend(papers),
            None => self.themes.push(ThemeSection {
                name: theme.to_string(),
                papers: papers.into_iter().collect(),
            }),
        }
    }

    /// Parse a document from JSON text.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialize the document as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// One theme and its papers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSection {
    pub name: String,
    pub papers: Vec<PaperEntry>,
}

/// A single summarized paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperEntry {
    #[serde(default = "default_paper_name")]
    pub paper_name: String,

    #[serde(default)]
    pub summary: PaperSummary,
}

impl PaperEntry {
    pub fn new(paper_name: impl Into<String>) -> Self {
        Self {
            paper_name: paper_name.into(),
            summary: PaperSummary::default(),
        }
    }

    /// Builder: set one summary section.
    pub fn with_section(mut self, key: SectionKey, text: impl Into<String>) -> Self {
        self.summary.set(key, text.into());
        self
    }
}

/// The five recognized summary sections. Unknown keys are dropped on input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limitations_and_future_work: Option<String>,
}

impl PaperSummary {
    pub fn get(&self, key: SectionKey) -> Option<&str> {
        match key {
            SectionKey::ContentSummary => self.content_summary.as_deref(),
            SectionKey::Contribution => self.contribution.as_deref(),
            SectionKey::Method => self.method.as_deref(),
            SectionKey::Comparison => self.comparison.as_deref(),
            SectionKey::LimitationsAndFutureWork => self.limitations_and_future_work.as_deref(),
        }
    }

    pub fn set(&mut self, key: SectionKey, text: String) {
        let slot = match key {
            SectionKey::ContentSummary => &mut self.content_summary,
            SectionKey::Contribution => &mut self.contribution,
            SectionKey::Method => &mut self.method,
            SectionKey::Comparison => &mut self.comparison,
            SectionKey::LimitationsAndFutureWork => &mut self.limitations_and_future_work,
        };
        *slot = Some(text);
    }
}

/// A summary section, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKey {
    ContentSummary,
    Contribution,
    Method,
    Comparison,
    LimitationsAndFutureWork,
}

impl SectionKey {
    pub const ALL: [SectionKey; 5] = [
        SectionKey::ContentSummary,
        SectionKey::Contribution,
        SectionKey::Method,
        SectionKey::Comparison,
        SectionKey::LimitationsAndFutureWork,
    ];

    /// The JSON key.
    pub fn key(self) -> &'static str {
        match self {
            Self::ContentSummary => "content_summary",
            Self::Contribution => "contribution",
            Self::Method => "method",
            Self::Comparison => "comparison",
            Self::LimitationsAndFutureWork => "limitations_and_future_work",
        }
    }

    /// The label used in Markdown section lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::ContentSummary => "content summary",
            Self::Contribution => "contribution",
            Self::Method => "method",
            Self::Comparison => "comparison",
            Self::LimitationsAndFutureWork => "limitations and future work",
        }
    }

    /// Match a `<label>: <text>` line case-insensitively, returning the key and trimmed text.
    pub fn match_line(line: &str) -> Option<(SectionKey, &str)> {
        Self::ALL.into_iter().find_map(|key| {
            let label = key.label();
            let prefix_len = label.len();
            if line.len() <= prefix_len || !line.is_char_boundary(prefix_len) {
                return None;
            }
            let (head, rest) = line.split_at(prefix_len);
            if head.eq_ignore_ascii_case(label) {
                rest.strip_prefix(':').map(|text| (key, text.trim()))
            } else {
                None
            }
        })
    }
}

/// Render a summary document as Markdown.
pub fn to_markdown(doc: &SummaryDocument) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("# {}\n", doc.title));

    for theme in &doc.themes {
        lines.push(format!("## {}\n", theme.name));
        for paper in &theme.papers {
            lines.push(format!("### {}\n", paper.paper_name));
            for key in SectionKey::ALL {
                if let Some(text) = paper.summary.get(key) {
                    lines.push(format!("{}: {}", key.label(), text.trim()));
                }
            }
            // Blank line after each paper
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

/// Parse Markdown written in the summary convention back into a document.
///
/// Only lines of the form `<label>: <text>` under a paper heading are kept.
pub fn to_schema(markdown_text: &str) -> SummaryDocument {
    let tree = markdown::parse(markdown_text);
    let mut doc = SummaryDocument::new(tree.title.clone());

    for theme in &tree.children {
        let papers = theme.children.iter().map(|paper| {
            let mut entry = PaperEntry::new(paper.title.clone());
            for line in paper.body.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match SectionKey::match_line(line) {
                    Some((key, text)) => entry.summary.set(key, text.to_string()),
                    None => log::debug!(
                        "dropping unrecognized line under '{}': {}",
                        paper.title,
                        line
                    ),
                }
            }
            entry
        });

        // A repeated theme heading restarts that theme's paper list.
        match doc.themes.iter_mut().find(|t| t.name == theme.title) {
            Some(section) => section.papers = papers.collect(),
            None => doc.themes.push(ThemeSection {
                name: theme.title.clone(),
                papers: papers.collect(),
            }),
        }
    }

    doc
}

/// Deserialize a JSON object into `(key, value)` pairs, keeping file order.
pub(crate) fn deserialize_ordered_map<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedMapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a JSON object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
}

/// Serde adapter keeping `themes` an ordered JSON object.
mod theme_map {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(themes: &Vec<ThemeSection>, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(themes.len()))?;
        for theme in themes {
            map.serialize_entry(&theme.name, &theme.papers)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ThemeSection>, D::Error> {
        let entries = deserialize_ordered_map::<D, Vec<PaperEntry>>(d)?;
        let mut themes: Vec<ThemeSection> = Vec::with_capacity(entries.len());
        for (name, papers) in entries {
            // Duplicate keys: the last value wins, at the first position.
            match themes.iter_mut().find(|t| t.name == name) {
                Some(section) => section.papers = papers,
                None => themes.push(ThemeSection { name, papers }),
            }
        }
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{"title":"T","themes":{"ML":[{"paper_name":"P1","summary":{"content_summary":"S1","method":"M1"}}]}}"#;

    fn sample() -> SummaryDocument {
        let mut doc = SummaryDocument::new("Survey");
        doc.add_papers(
            "Vision",
            vec![
                PaperEntry::new("ViT")
                    .with_section(SectionKey::ContentSummary, "Patches as tokens.")
                    .with_section(SectionKey::LimitationsAndFutureWork, "Needs data."),
                PaperEntry::new("Swin").with_section(SectionKey::Method, "Shifted windows."),
            ],
        );
        doc.add_papers(
            "Language",
            vec![PaperEntry::new("BERT")
                .with_section(SectionKey::Contribution, "Bidirectional pretraining.")
                .with_section(SectionKey::Comparison, "Beats GPT on GLUE.")],
        );
        doc
    }

    #[test]
    fn test_example_to_markdown() {
        let doc = SummaryDocument::from_json(EXAMPLE).unwrap();
        let md = to_markdown(&doc);
        assert_eq!(
            md,
            "# T\n\n## ML\n\n### P1\n\ncontent summary: S1\nmethod: M1\n"
        );

        let lines: Vec<&str> = md.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(
            lines,
            vec!["# T", "## ML", "### P1", "content summary: S1", "method: M1"]
        );
    }

    #[test]
    fn test_example_round_trip() {
        let doc = SummaryDocument::from_json(EXAMPLE).unwrap();
        let back = to_schema(&to_markdown(&doc));
        assert_eq!(back, doc);

        let json: serde_json::Value = serde_json::from_str(&back.to_json_pretty().unwrap()).unwrap();
        let expected: serde_json::Value = serde_json::from_str(EXAMPLE).unwrap();
        assert_eq!(json, expected);
    }

    #[test]
    fn test_round_trip_keeps_theme_and_paper_order() {
        let doc = sample();
        let back = to_schema(&to_markdown(&doc));
        assert_eq!(back, doc);
        assert_eq!(back.themes[0].name, "Vision");
        assert_eq!(back.themes[1].name, "Language");
    }

    #[test]
    fn test_text_is_trimmed() {
        let mut doc = SummaryDocument::new("T");
        doc.add_papers(
            "A",
            vec![PaperEntry::new("P").with_section(SectionKey::Method, "  padded  ")],
        );
        let back = to_schema(&to_markdown(&doc));
        assert_eq!(back.themes[0].papers[0].summary.method.as_deref(), Some("padded"));
    }

    #[test]
    fn test_json_keeps_theme_order_and_drops_unknown_keys() {
        let json = r#"{"title":"T","themes":{"zeta":[],"alpha":[{"paper_name":"P","summary":{"method":"m","novelty":"x"}}]}}"#;
        let doc = SummaryDocument::from_json(json).unwrap();
        assert_eq!(doc.themes[0].name, "zeta");
        assert_eq!(doc.themes[1].name, "alpha");
        assert_eq!(doc.themes[1].papers[0].summary.method.as_deref(), Some("m"));

        let out = doc.to_json_pretty().unwrap();
        assert!(!out.contains("novelty"));
        assert!(out.find("zeta").unwrap() < out.find("alpha").unwrap());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let doc = SummaryDocument::from_json(r#"{"themes":{"A":[{"summary":{}}]}}"#).unwrap();
        assert_eq!(doc.title, "Untitled Presentation");
        assert_eq!(doc.themes[0].papers[0].paper_name, "Unnamed Paper");
    }

    #[test]
    fn test_labels_match_case_insensitively() {
        let md = "# T\n## A\n### P\nContent Summary: cs\nLIMITATIONS AND FUTURE WORK:  lf \nnotes: dropped\nmethod without colon";
        let doc = to_schema(md);
        let summary = &doc.themes[0].papers[0].summary;
        assert_eq!(summary.content_summary.as_deref(), Some("cs"));
        assert_eq!(summary.limitations_and_future_work.as_deref(), Some("lf"));
        assert_eq!(summary.method, None);
        assert_eq!(summary.contribution, None);
    }

    #[test]
    fn test_output_key_order_is_fixed() {
        let md = "# T\n## A\n### P\nmethod: m\ncontent summary: c";
        let doc = to_schema(md);
        let out = to_markdown(&doc);
        assert!(out.find("content summary: c").unwrap() < out.find("method: m").unwrap());
    }

    #[test]
    fn test_match_line_handles_non_ascii() {
        assert_eq!(SectionKey::match_line("méthode: x"), None);
        assert_eq!(
            SectionKey::match_line("method:结果"),
            Some((SectionKey::Method, "结果"))
        );
    }

    #[test]
    fn test_repeated_theme_restarts_papers() {
        let doc = to_schema("# T\n## A\n### P1\n## B\n## A\n### P2");
        assert_eq!(doc.themes.len(), 2);
        assert_eq!(doc.themes[0].name, "A");
        assert_eq!(doc.themes[0].papers.len(), 1);
        assert_eq!(doc.themes[0].papers[0].paper_name, "P2");
    }
}
