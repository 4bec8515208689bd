//! Conversions between summary JSON, heading Markdown and PPTX decks.

use crate::extract::{self, DeckExtractor, ExtractOptions};
use crate::parser::PptxParser;
use crate::writer::DeckWriter;
use deck_core::{
    markdown, schema, ImageCatalog, RenderOptions, Result, SlidePlanner, SummaryDocument,
    ThemeDescriptor, ThemeUsage,
};
use std::path::Path;
use std::process::{Command, Stdio};

/// Render Markdown into a deck at `output`; returns the number of slides.
///
/// Images linked from the Markdown are added to `images`, labelled with the
/// title of the heading they appear under.
pub fn markdown_to_deck(
    markdown_text: &str,
    theme: &ThemeDescriptor,
    images: &ImageCatalog,
    output: &Path,
    options: &RenderOptions,
) -> Result<usize> {
    theme.validate(ThemeUsage::Render)?;

    let tree = markdown::parse(markdown_text);
    let mut catalog = images.clone();
    catalog.extend_from_tree(&tree);

    let planner = SlidePlanner::new(theme, &catalog, options);
    let mut writer = DeckWriter::new(theme)?;
    planner.plan(&tree, &mut |record| writer.add_slide(&record))?;

    let count = writer.slide_count();
    writer.save(output)?;
    log::info!("Created {} with {} slides", output.display(), count);

    if options.export_pdf {
        export_pdf(output);
    }

    Ok(count)
}

/// Recover heading Markdown from a deck.
///
/// With `image_dir`, non-background pictures are written there and linked.
pub fn deck_to_markdown(
    deck: &Path,
    theme: &ThemeDescriptor,
    image_dir: Option<&Path>,
    options: &ExtractOptions,
) -> Result<String> {
    theme.validate(ThemeUsage::Extract)?;

    let parsed = PptxParser::new().open(deck)?;
    let mut slides = DeckExtractor::new(theme, options).extract(&parsed, image_dir.is_some())?;

    if let Some(dir) = image_dir {
        extract::write_images(&mut slides, dir)?;
    }

    Ok(extract::to_markdown(&slides))
}

/// Render a summary document into a deck; returns the number of slides.
pub fn schema_to_deck(
    doc: &SummaryDocument,
    theme: &ThemeDescriptor,
    images: &ImageCatalog,
    output: &Path,
    options: &RenderOptions,
) -> Result<usize> {
    markdown_to_deck(&schema_to_markdown(doc), theme, images, output, options)
}

/// Recover a summary document from a deck.
pub fn deck_to_schema(
    deck: &Path,
    theme: &ThemeDescriptor,
    options: &ExtractOptions,
) -> Result<SummaryDocument> {
    let markdown_text = deck_to_markdown(deck, theme, None, options)?;
    Ok(markdown_to_schema(&markdown_text))
}

pub fn schema_to_markdown(doc: &SummaryDocument) -> String {
    schema::to_markdown(doc)
}

pub fn markdown_to_schema(markdown_text: &str) -> SummaryDocument {
    schema::to_schema(markdown_text)
}

/// Start a headless LibreOffice conversion of `deck` to PDF next to it.
///
/// The process is not waited for; failing to start it is only logged.
pub fn export_pdf(deck: &Path) {
    let outdir = match deck.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let spawned = Command::new("soffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(outdir)
        .arg(deck)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(child) => log::debug!("PDF export of {} started (pid {})", deck.display(), child.id()),
        Err(e) => log::warn!("PDF export of {} could not start: {}", deck.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{Error, PaperEntry, SectionKey};
    use std::fs;
    use tempfile::TempDir;

    const THEME: &str = r#"{
        "slide_size": {"width": 25.4, "height": 14.29},
        "first_page": {"title_info": {"pos_x": 2.81, "pos_y": 5.44, "width": 20, "height": 3, "font_size": 40, "font_name": "Georgia"}},
        "catalog_page": {"title_info": {"pos_x": 1.0, "pos_y": 1.0, "width": 20, "height": 2, "font_size": 28, "font_name": "Georgia"}},
        "theme_page": {"title_info": {"pos_x": 6.0, "pos_y": 6.0, "width": 14, "height": 2, "font_size": 32, "font_name": "Georgia"},
                       "content_info": {"pos_x": 6.0, "pos_y": 9.0, "width": 14, "height": 3, "font_size": 16, "font_name": "Georgia"}},
        "main_page": {"title_info": {"pos_x": 0.76, "pos_y": 0.76, "width": 22, "height": 2, "font_size": 26, "font_name": "Times New Roman"},
                      "content_info": {"pos_x": 2.54, "pos_y": 4.12, "width": 12, "height": 9, "font_size": 14, "font_name": "Times New Roman"},
                      "img_info": {"pos_x": 15.0, "pos_y": 4.12, "width": 9, "height": 6}}
    }"#;

    const PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn theme_dir(with_background: bool) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mode.json"), THEME).unwrap();
        if with_background {
            fs::create_dir(dir.path().join("img")).unwrap();
            fs::write(dir.path().join("img").join("bg.png"), PNG).unwrap();
        }
        dir
    }

    fn sample_doc() -> SummaryDocument {
        let mut doc = SummaryDocument::new("T");
        doc.add_papers(
            "ML",
            [PaperEntry::new("P1")
                .with_section(SectionKey::ContentSummary, "S1")
                .with_section(SectionKey::Method, "M1")],
        );
        doc
    }

    #[test]
    fn test_schema_deck_round_trip() {
        let themes = theme_dir(true);
        let out = tempfile::tempdir().unwrap();
        let deck = out.path().join("deck.pptx");

        let render = ThemeDescriptor::load(themes.path(), ThemeUsage::Render).unwrap();
        let count = schema_to_deck(
            &sample_doc(),
            &render,
            &ImageCatalog::new(),
            &deck,
            &RenderOptions::default(),
        )
        .unwrap();
        // title, table of contents, theme, paper
        assert_eq!(count, 4);

        let extract = ThemeDescriptor::load(themes.path(), ThemeUsage::Extract).unwrap();
        let doc = deck_to_schema(&deck, &extract, &ExtractOptions::default()).unwrap();
        assert_eq!(doc, sample_doc());
    }

    #[test]
    fn test_chunked_body_is_merged_back() {
        let themes = theme_dir(false);
        let out = tempfile::tempdir().unwrap();
        let deck = out.path().join("deck.pptx");
        let theme = ThemeDescriptor::load(themes.path(), ThemeUsage::Render).unwrap();

        let first = "a".repeat(150);
        let second = "b".repeat(150);
        let markdown_text = format!("# T\n\n## ML\n\n### P\n\n{}\n\n{}\n", first, second);

        let count = markdown_to_deck(
            &markdown_text,
            &theme,
            &ImageCatalog::new(),
            &deck,
            &RenderOptions::default(),
        )
        .unwrap();
        assert_eq!(count, 5);

        let recovered = deck_to_markdown(&deck, &theme, None, &ExtractOptions::default()).unwrap();
        assert_eq!(
            recovered,
            format!("# T\n\n## ML\n\n### P\n\n{}\n\n{}", first, second)
        );
    }

    #[test]
    fn test_images_survive_round_trip_and_backgrounds_do_not() {
        let themes = theme_dir(true);
        let out = tempfile::tempdir().unwrap();
        let figure = out.path().join("figure.png");
        fs::write(&figure, PNG).unwrap();
        let deck = out.path().join("deck.pptx");
        let theme = ThemeDescriptor::load(themes.path(), ThemeUsage::Render).unwrap();

        let markdown_text = format!(
            "# T\n\n## ML\n\n### P1\n\ncontent summary: S1\n![figure]({})\n",
            figure.display()
        );
        markdown_to_deck(
            &markdown_text,
            &theme,
            &ImageCatalog::new(),
            &deck,
            &RenderOptions::default(),
        )
        .unwrap();

        let images = out.path().join("images");
        let recovered =
            deck_to_markdown(&deck, &theme, Some(&images), &ExtractOptions::default()).unwrap();

        let written = images.join("slide4_img1.png");
        assert!(written.is_file());
        assert!(!images.join("slide4_img2.png").exists());
        assert!(recovered.contains(&format!("![inserted_image]({})", written.display())));
    }

    #[test]
    fn test_untitled_document_keeps_its_themes() {
        let themes = theme_dir(true);
        let out = tempfile::tempdir().unwrap();
        let deck = out.path().join("deck.pptx");
        let theme = ThemeDescriptor::load(themes.path(), ThemeUsage::Render).unwrap();

        markdown_to_deck(
            "## ML\n\n### P1\n\nmethod: M1\n",
            &theme,
            &ImageCatalog::new(),
            &deck,
            &RenderOptions::default(),
        )
        .unwrap();

        let recovered = deck_to_markdown(&deck, &theme, None, &ExtractOptions::default()).unwrap();
        assert_eq!(recovered, "#\n\n## ML\n\n### P1\n\nmethod: M1");

        let mut expected = SummaryDocument::new("");
        expected.add_papers(
            "ML",
            [PaperEntry::new("P1").with_section(SectionKey::Method, "M1")],
        );
        assert_eq!(markdown_to_schema(&recovered), expected);
        assert_eq!(deck_to_schema(&deck, &theme, &ExtractOptions::default()).unwrap(), expected);
    }

    #[test]
    fn test_incomplete_theme_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("deck.pptx");
        let theme = ThemeDescriptor::from_json_str(
            r#"{"theme_page": {"title_info": {"pos_x": 1, "pos_y": 1, "width": 1, "height": 1, "font_size": 10, "font_name": "A"}}}"#,
            dir.path(),
            ThemeUsage::Extract,
        )
        .unwrap();

        let result = schema_to_deck(
            &sample_doc(),
            &theme,
            &ImageCatalog::new(),
            &deck,
            &RenderOptions::default(),
        );
        assert!(matches!(result, Err(Error::ConfigError(_))));
        assert!(!deck.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_legacy_ppt_is_rejected() {
        let themes = theme_dir(false);
        let dir = tempfile::tempdir().unwrap();
        let deck = dir.path().join("old.ppt");
        fs::write(&deck, [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0]).unwrap();
        let theme = ThemeDescriptor::load(themes.path(), ThemeUsage::Extract).unwrap();

        let result = deck_to_markdown(&deck, &theme, None, &ExtractOptions::default());
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn test_schema_markdown_example() {
        let doc = SummaryDocument::from_json(
            r#"{"title":"T","themes":{"ML":[{"paper_name":"P1","summary":{"content_summary":"S1","method":"M1"}}]}}"#,
        )
        .unwrap();
        let markdown_text = schema_to_markdown(&doc);
        assert!(markdown_text.contains("# T"));
        assert!(markdown_text.contains("## ML"));
        assert!(markdown_text.contains("### P1"));
        assert!(markdown_text.contains("content summary: S1"));
        assert!(markdown_text.contains("method: M1"));
        assert_eq!(markdown_to_schema(&markdown_text), doc);
    }
}
