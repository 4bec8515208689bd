//! Greedy paragraph chunking under a character budget.

/// Default character budget for one content slide.
pub const DEFAULT_CHUNK_BUDGET: usize = 200;

/// A run of whole paragraphs that fits one content box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk<'a> {
    /// Paragraphs in source order.
    pub paragraphs: Vec<&'a str>,
    /// Sum of the paragraph lengths in characters.
    pub len: usize,
}

impl ContentChunk<'_> {
    /// The chunk as text, paragraphs separated by a blank line.
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }
}

/// Split text into paragraphs at blank lines, dropping empty ones.
pub fn paragraphs(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut end = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        if blank {
            if let Some(s) = start.take() {
                out.push(text[s..end].trim());
            }
        } else {
            if start.is_none() {
                start = Some(offset);
            }
            end = offset + line.len();
        }
        offset += line.len();
    }
    if let Some(s) = start {
        out.push(text[s..end].trim());
    }

    out
}

/// Split `text` into chunks whose paragraph lengths stay under `budget`.
///
/// A paragraph is added to the current chunk while the accumulated length plus
/// its own stays strictly below the budget. A paragraph that does not fit
/// closes the chunk and starts the next one, so an oversized paragraph always
/// ends up alone and is never split.
pub fn chunk_paragraphs(text: &str, budget: usize) -> Vec<ContentChunk<'_>> {
    let mut chunks = Vec::new();
    let mut current = ContentChunk {
        paragraphs: Vec::new(),
        len: 0,
    };

    for paragraph in paragraphs(text) {
        let len = paragraph.chars().count();
        if !current.paragraphs.is_empty() && current.len + len >= budget {
            chunks.push(std::mem::replace(
                &mut current,
                ContentChunk {
                    paragraphs: Vec::new(),
                    len: 0,
                },
            ));
        }
        current.paragraphs.push(paragraph);
        current.len += len;
    }

    if !current.paragraphs.is_empty() {
        chunks.push(current);
    }

    chunks
}
