//! CLI tool for converting between summary JSON, heading Markdown and PPTX decks.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deck_core::{
    ImageCatalog, RenderOptions, SummaryDocument, ThemeDescriptor, ThemeLocator, ThemeUsage,
    DEFAULT_CHUNK_BUDGET,
};
use deck_pptx::ExtractOptions;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Convert paper summaries between JSON, Markdown and slide decks.
#[derive(Parser, Debug)]
#[command(name = "deckconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render heading Markdown into a deck
    Md2deck {
        /// Input Markdown file
        input: PathBuf,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Recover heading Markdown from a deck
    Deck2md {
        /// Input deck (.pptx)
        input: PathBuf,

        #[command(flatten)]
        theme: ThemeArgs,

        /// Directory to write slide pictures to; pictures are linked from the Markdown
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Output Markdown file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a summary JSON document into a deck
    Json2deck {
        /// Input summary JSON
        input: PathBuf,

        #[command(flatten)]
        render: RenderArgs,

        /// Also save the intermediate Markdown here
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// Recover a summary JSON document from a deck
    Deck2json {
        /// Input deck (.pptx)
        input: PathBuf,

        #[command(flatten)]
        theme: ThemeArgs,

        /// Directory to write slide pictures to
        #[arg(long)]
        image_dir: Option<PathBuf>,

        /// Also save the intermediate Markdown here
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a summary JSON document to heading Markdown
    Json2md {
        /// Input summary JSON
        input: PathBuf,

        /// Output Markdown file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert heading Markdown to a summary JSON document
    Md2json {
        /// Input Markdown file
        input: PathBuf,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ThemeArgs {
    /// Theme directory, mode.json file, or theme name under --themes-dir
    #[arg(short, long)]
    theme: String,

    /// Directory holding one sub-directory per theme
    #[arg(long)]
    themes_dir: Option<PathBuf>,
}

impl ThemeArgs {
    fn load(&self, usage: ThemeUsage) -> Result<ThemeDescriptor> {
        let mut locator = ThemeLocator::new();
        if let Some(dir) = &self.themes_dir {
            locator = locator.with_themes_dir(dir);
        }
        locator
            .load(&self.theme, usage)
            .with_context(|| format!("Failed to load theme '{}'", self.theme))
    }
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    theme: ThemeArgs,

    /// Image map JSON: {"<image path>": "<heading title>", ...}
    #[arg(long)]
    images: Option<PathBuf>,

    /// Character budget of one content slide
    #[arg(long, default_value_t = DEFAULT_CHUNK_BUDGET)]
    budget: usize,

    /// Also export a PDF next to the deck (requires LibreOffice)
    #[arg(long)]
    pdf: bool,

    /// Output deck (.pptx)
    #[arg(short, long)]
    output: PathBuf,
}

impl RenderArgs {
    fn options(&self) -> RenderOptions {
        RenderOptions::new()
            .with_chunk_budget(self.budget)
            .with_export_pdf(self.pdf)
    }

    fn images(&self) -> Result<ImageCatalog> {
        match &self.images {
            Some(path) => ImageCatalog::load(path)
                .with_context(|| format!("Failed to load image map {}", path.display())),
            None => Ok(ImageCatalog::new()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match &cli.command {
        Command::Md2deck { input, render } => {
            log::debug!("Rendering Markdown {} to deck", input.display());
            let markdown = read_input(input)?;
            let theme = render.theme.load(ThemeUsage::Render)?;
            let count = deck_pptx::markdown_to_deck(
                &markdown,
                &theme,
                &render.images()?,
                &render.output,
                &render.options(),
            )
            .with_context(|| format!("Failed to render {}", input.display()))?;
            report(cli.verbose, &render.output, count);
        }
        Command::Deck2md {
            input,
            theme,
            image_dir,
            output,
        } => {
            log::debug!("Extracting Markdown from deck {}", input.display());
            let theme = theme.load(ThemeUsage::Extract)?;
            let markdown = deck_pptx::deck_to_markdown(
                input,
                &theme,
                image_dir.as_deref(),
                &ExtractOptions::default(),
            )
            .with_context(|| format!("Failed to read {}", input.display()))?;
            emit(output.as_deref(), &markdown)?;
        }
        Command::Json2deck {
            input,
            render,
            markdown,
        } => {
            log::debug!("Rendering summary JSON {} to deck", input.display());
            let doc = read_document(input)?;
            let theme = render.theme.load(ThemeUsage::Render)?;
            let text = deck_pptx::schema_to_markdown(&doc);
            if let Some(path) = markdown {
                write_output(path, &text)?;
            }
            let count = deck_pptx::markdown_to_deck(
                &text,
                &theme,
                &render.images()?,
                &render.output,
                &render.options(),
            )
            .with_context(|| format!("Failed to render {}", input.display()))?;
            report(cli.verbose, &render.output, count);
        }
        Command::Deck2json {
            input,
            theme,
            image_dir,
            markdown,
            output,
        } => {
            log::debug!("Extracting summary JSON from deck {}", input.display());
            let theme = theme.load(ThemeUsage::Extract)?;
            let options = ExtractOptions::default();
            let doc = if markdown.is_none() && image_dir.is_none() {
                deck_pptx::deck_to_schema(input, &theme, &options)
                    .with_context(|| format!("Failed to read {}", input.display()))?
            } else {
                let text = deck_pptx::deck_to_markdown(input, &theme, image_dir.as_deref(), &options)
                    .with_context(|| format!("Failed to read {}", input.display()))?;
                if let Some(path) = markdown {
                    write_output(path, &text)?;
                }
                deck_pptx::markdown_to_schema(&text)
            };
            emit(output.as_deref(), &to_json(&doc)?)?;
        }
        Command::Json2md { input, output } => {
            log::debug!("Converting summary JSON {} to Markdown", input.display());
            let doc = read_document(input)?;
            emit(output.as_deref(), &deck_pptx::schema_to_markdown(&doc))?;
        }
        Command::Md2json { input, output } => {
            log::debug!("Converting Markdown {} to summary JSON", input.display());
            let markdown = read_input(input)?;
            let doc = deck_pptx::markdown_to_schema(&markdown);
            emit(output.as_deref(), &to_json(&doc)?)?;
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_document(path: &Path) -> Result<SummaryDocument> {
    let text = read_input(path)?;
    SummaryDocument::from_json(&text)
        .with_context(|| format!("Failed to parse summary JSON {}", path.display()))
}

fn to_json(doc: &SummaryDocument) -> Result<String> {
    let mut json = doc.to_json_pretty().context("Failed to serialize summary")?;
    json.push('\n');
    Ok(json)
}

fn report(verbose: bool, output: &Path, slides: usize) {
    if verbose {
        eprintln!("Written {} slides to: {}", slides, output.display());
    }
}

/// Write to `output`, or print to stdout when no path is given.
fn emit(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => write_output(path, content),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
