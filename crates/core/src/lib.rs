//! Core domain types for summary decks: the Markdown heading tree, the
//! five-section summary schema, content chunking, theme descriptors and
//! slide planning.

pub mod chunk;
pub mod error;
pub mod images;
pub mod markdown;
pub mod schema;
pub mod slide;
pub mod theme;
pub mod types;

pub use chunk::{chunk_paragraphs, ContentChunk, DEFAULT_CHUNK_BUDGET};
pub use error::{Error, Result};
pub use images::{ImageCatalog, ImageEntry};
pub use schema::{PaperEntry, PaperSummary, SectionKey, SummaryDocument, ThemeSection};
pub use slide::{
    RenderOptions, SlideContent, SlideGeometry, SlidePlanner, SlideRecord, TABLE_OF_CONTENTS_LABEL,
};
pub use theme::{ThemeDescriptor, ThemeLocator, ThemeUsage};
pub use types::{BoxGeometry, DeckFormat, HeadingNode, SlideKind};
