//! Illustration catalog and title-based image selection.

use crate::error::Result;
use crate::schema::deserialize_ordered_map;
use crate::types::HeadingNode;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Largest edit distance at which a label still matches a heading title.
pub const DEFAULT_IMAGE_MATCH_DISTANCE: usize = 2;

/// An illustration and the heading title it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub label: String,
}

/// Ordered collection of candidate illustrations.
///
/// Order matters: when several labels are equally close to a title the
/// earliest entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCatalog {
    entries: Vec<ImageEntry>,
}

impl ImageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, label: impl Into<String>) {
        self.entries.push(ImageEntry {
            path: path.into(),
            label: label.into(),
        });
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse an image map `{"<image path>": "<label>", ...}`, keeping file order.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Append the images referenced inside the tree, labelled with their heading title.
    pub fn extend_from_tree(&mut self, tree: &HeadingNode) {
        tree.walk(&mut |node| {
            for image in &node.images {
                self.push(image, node.title.clone());
            }
        });
    }

    /// The entry whose label is closest to `title`, if within `max_distance`.
    pub fn best_match(&self, title: &str, max_distance: usize) -> Option<&ImageEntry> {
        let title = normalize_label(title);
        let mut best: Option<(usize, &ImageEntry)> = None;

        for entry in &self.entries {
            let distance = edit_distance(&normalize_label(&entry.label), &title);
            if distance > max_distance {
                continue;
            }
            // Strictly smaller only, so ties keep the earlier entry.
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, entry));
            }
        }

        best.map(|(_, entry)| entry)
    }
}

impl<'de> Deserialize<'de> for ImageCatalog {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let entries = deserialize_ordered_map::<D, String>(d)?
            .into_iter()
            .map(|(path, label)| ImageEntry {
                path: PathBuf::from(path),
                label,
            })
            .collect();
        Ok(Self { entries })
    }
}

fn normalize_label(text: &str) -> String {
    text.trim().nfc().collect()
}

/// Levenshtein distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
