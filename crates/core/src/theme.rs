//! Theme descriptors: per-slide-kind layout geometry and fonts.
//!
//! A theme is a directory holding `mode.json` and, optionally, background
//! pictures (`title.png`/`title.jpg` for the title slide, `img/*` for the
//! rest). All positions in `mode.json` are centimeters, font sizes points.

use crate::error::{Error, Result};
use crate::types::{BoxGeometry, SlideKind};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the descriptor file inside a theme directory.
pub const THEME_FILE_NAME: &str = "mode.json";

/// English Metric Units per centimeter.
pub const EMU_PER_CM: f64 = 360_000.0;

/// Picture extensions accepted as theme backgrounds.
const BACKGROUND_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Convert centimeters to EMU.
pub fn cm_to_emu(cm: f64) -> i64 {
    (cm * EMU_PER_CM).round() as i64
}

/// Convert EMU to centimeters.
pub fn emu_to_cm(emu: i64) -> f64 {
    emu as f64 / EMU_PER_CM
}

/// What a conversion needs from the theme; decides which fields are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeUsage {
    /// Building a deck: every slide kind must be fully described.
    Render,
    /// Reading a deck: only the theme slide's title box is needed.
    Extract,
}

/// Slide dimensions in centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SlideSize {
    #[serde(deserialize_with = "number_or_string")]
    pub width: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub height: f64,
}

/// A text box with its font.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextBoxSpec {
    #[serde(deserialize_with = "number_or_string")]
    pub pos_x: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub pos_y: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub width: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub height: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub font_size: f64,
    pub font_name: String,
}

impl TextBoxSpec {
    pub fn geometry(&self) -> BoxGeometry {
        BoxGeometry::new(self.pos_x, self.pos_y, self.width, self.height)
    }
}

/// A picture box.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ImageBoxSpec {
    #[serde(deserialize_with = "number_or_string")]
    pub pos_x: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub pos_y: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub width: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub height: f64,
}

impl ImageBoxSpec {
    pub fn geometry(&self) -> BoxGeometry {
        BoxGeometry::new(self.pos_x, self.pos_y, self.width, self.height)
    }
}

/// Layout of one slide kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageLayout {
    pub title_info: TextBoxSpec,
    #[serde(default)]
    pub content_info: Option<TextBoxSpec>,
    #[serde(default)]
    pub img_info: Option<ImageBoxSpec>,
}

#[derive(Debug, Deserialize)]
struct ThemeFile {
    #[serde(default)]
    slide_size: Option<SlideSize>,
    #[serde(default)]
    first_page: Option<PageLayout>,
    #[serde(default)]
    catalog_page: Option<PageLayout>,
    #[serde(default)]
    theme_page: Option<PageLayout>,
    #[serde(default)]
    main_page: Option<PageLayout>,
}

/// Background pictures shipped with a theme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeBackgrounds {
    /// Background of the title slide.
    pub title: Option<PathBuf>,
    /// Backgrounds for all other slides, in file name order.
    pub pages: Vec<PathBuf>,
}

impl ThemeBackgrounds {
    /// List the backgrounds of a theme directory. Missing files are not an error.
    pub fn scan(dir: &Path) -> Self {
        let title = ["title.jpg", "title.png"]
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file());

        let mut pages: Vec<PathBuf> = match fs::read_dir(dir.join("img")) {
            Ok(entries) => entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file() && has_background_extension(p))
                .collect(),
            Err(_) => Vec::new(),
        };
        pages.sort();

        Self { title, pages }
    }

    /// Background for a slide; title slides prefer the dedicated title picture.
    pub fn for_slide(&self, kind: SlideKind, slide_index: usize) -> Option<&Path> {
        if kind == SlideKind::Title {
            if let Some(title) = &self.title {
                return Some(title.as_path());
            }
        }
        if self.pages.is_empty() {
            return None;
        }
        Some(self.pages[slide_index % self.pages.len()].as_path())
    }
}

fn has_background_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BACKGROUND_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A loaded, validated theme.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeDescriptor {
    /// Directory the descriptor was loaded from.
    pub dir: PathBuf,
    slide_size: Option<SlideSize>,
    first_page: Option<PageLayout>,
    catalog_page: Option<PageLayout>,
    theme_page: Option<PageLayout>,
    main_page: Option<PageLayout>,
    pub backgrounds: ThemeBackgrounds,
}

impl ThemeDescriptor {
    /// Load a theme from a directory containing `mode.json`, or from the file itself.
    ///
    /// Everything `usage` needs is checked here, before any output exists.
    pub fn load(path: impl AsRef<Path>, usage: ThemeUsage) -> Result<Self> {
        let path = path.as_ref();
        let (file, dir) = if path.is_dir() {
            (path.join(THEME_FILE_NAME), path.to_path_buf())
        } else {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (path.to_path_buf(), dir)
        };

        let text = fs::read_to_string(&file).map_err(|e| {
            Error::config(format!(
                "cannot read theme descriptor {}: {}",
                file.display(),
                e
            ))
        })?;

        let theme = Self::from_json_str(&text, &dir, usage)?;
        log::debug!("Loaded theme from {}", file.display());
        Ok(theme)
    }

    /// Build a theme from descriptor JSON; backgrounds are looked up in `dir`.
    pub fn from_json_str(text: &str, dir: &Path, usage: ThemeUsage) -> Result<Self> {
        let raw: ThemeFile = serde_json::from_str(text)
            .map_err(|e| Error::config(format!("malformed theme descriptor: {}", e)))?;

        let theme = Self {
            dir: dir.to_path_buf(),
            slide_size: raw.slide_size,
            first_page: raw.first_page,
            catalog_page: raw.catalog_page,
            theme_page: raw.theme_page,
            main_page: raw.main_page,
            backgrounds: ThemeBackgrounds::scan(dir),
        };
        theme.validate(usage)?;
        Ok(theme)
    }

    /// Check that everything `usage` needs is present.
    pub fn validate(&self, usage: ThemeUsage) -> Result<()> {
        match usage {
            ThemeUsage::Render => {
                self.slide_size()?;
                for kind in SlideKind::ALL {
                    self.title_box(kind)?;
                    if kind != SlideKind::Title {
                        self.content_box(kind)?;
                    }
                }
            }
            ThemeUsage::Extract => {
                self.title_box(SlideKind::Theme)?;
            }
        }
        Ok(())
    }

    pub fn slide_size(&self) -> Result<SlideSize> {
        self.slide_size
            .ok_or_else(|| Error::config("theme descriptor has no slide_size"))
    }

    /// The page layout for a slide kind, if the theme declares one.
    pub fn page(&self, kind: SlideKind) -> Option<&PageLayout> {
        match kind {
            SlideKind::Title => self.first_page.as_ref(),
            SlideKind::TableOfContents => self.catalog_page.as_ref(),
            SlideKind::Theme => self.theme_page.as_ref(),
            SlideKind::Content => self.main_page.as_ref(),
        }
    }

    fn require_page(&self, kind: SlideKind) -> Result<&PageLayout> {
        self.page(kind).ok_or_else(|| {
            Error::config(format!(
                "theme descriptor has no '{}' section",
                kind.page_key()
            ))
        })
    }

    pub fn title_box(&self, kind: SlideKind) -> Result<&TextBoxSpec> {
        Ok(&self.require_page(kind)?.title_info)
    }

    /// The content box; a table of contents without its own falls back to `main_page`.
    pub fn content_box(&self, kind: SlideKind) -> Result<&TextBoxSpec> {
        let own = self
            .page(kind)
            .and_then(|p| p.content_info.as_ref());
        let fallback = || {
            if kind == SlideKind::TableOfContents {
                self.main_page.as_ref().and_then(|p| p.content_info.as_ref())
            } else {
                None
            }
        };
        own.or_else(fallback).ok_or_else(|| {
            Error::config(format!(
                "theme descriptor '{}' has no content_info",
                kind.page_key()
            ))
        })
    }

    pub fn image_box(&self, kind: SlideKind) -> Option<BoxGeometry> {
        self.page(kind)
            .and_then(|p| p.img_info.as_ref())
            .map(ImageBoxSpec::geometry)
    }
}

/// Resolves theme identifiers to descriptor locations.
#[derive(Debug, Clone, Default)]
pub struct ThemeLocator {
    themes_dir: Option<PathBuf>,
}

impl ThemeLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve bare identifiers relative to a directory of themes.
    pub fn with_themes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.themes_dir = Some(dir.into());
        self
    }

    /// Resolve an identifier: an existing directory or file is used as is,
    /// anything else is looked up as `<themes_dir>/<id>/mode.json`.
    pub fn resolve(&self, id: &str) -> Result<PathBuf> {
        let path = Path::new(id);
        if path.is_dir() {
            return Ok(path.join(THEME_FILE_NAME));
        }
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        match &self.themes_dir {
            Some(root) => Ok(root.join(id).join(THEME_FILE_NAME)),
            None => Err(Error::config(format!("theme '{}' not found", id))),
        }
    }

    pub fn load(&self, id: &str, usage: ThemeUsage) -> Result<ThemeDescriptor> {
        ThemeDescriptor::load(self.resolve(id)?, usage)
    }
}

/// Accept `12.5` as well as `"12.5"`.
fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(d)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
