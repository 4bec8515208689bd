//! PPTX (Office Open XML) backend for summary decks.
//!
//! Writes slide records produced by `deck-core` into a .pptx package, reads
//! decks back as ordered shapes, and recovers heading Markdown from them.

pub mod convert;
pub mod extract;
pub mod package;
pub mod parser;
pub mod writer;

pub use convert::{
    deck_to_markdown, deck_to_schema, export_pdf, markdown_to_deck, markdown_to_schema,
    schema_to_deck, schema_to_markdown,
};
pub use extract::{DeckExtractor, ExtractOptions, ExtractedImage, ExtractedSlide};
pub use parser::{Deck, DeckShape, DeckSlide, PptxParser};
pub use writer::DeckWriter;
