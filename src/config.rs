//! Site configuration loaded from `site.toml` in the source root.
//!
//! Every field has a default so a bare content tree builds without any
//! configuration file. The file is read once at startup and handed down the
//! pipeline by reference; nothing reloads it mid-run.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid site.toml: {0}")]
    Toml(#[from] toml::de::Error),
}

/// How article URLs mirror the source tree.
///
/// `Simple` flattens everything: series members live at
/// `<series-slug>/<stem>.html` and standalone articles at `<stem>.html`.
/// `Recursive` keeps the full (underscore-stripped) directory chain in the
/// URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathLayout {
    #[default]
    Simple,
    Recursive,
}

/// A menu entry declared in configuration rather than in an article header.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuEntry {
    /// Slash-separated placement, e.g. `"About/Contact"`.
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    pub enabled: bool,
    /// Newest-first item cap for `index.rss`.
    pub items: usize,
}

impl Default for RssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            items: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output container formats, in `<source>` declaration order.
    pub formats: Vec<String>,
    /// Tallest rendition to produce, capped further by the source's native
    /// height.
    pub max_rendition: u32,
    /// Timestamp (seconds) of the poster frame.
    pub poster_second: f64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            formats: vec!["mp4".to_string()],
            max_rendition: 1080,
            poster_second: 1.0,
        }
    }
}

/// Site configuration, deserialized from `<source>/site.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    /// Absolute site URL, no trailing slash (`https://example.org`).
    pub url: String,
    pub language: String,
    /// Widths (px) generated for banner images, also the `srcset` ladder for
    /// in-article images.
    pub banner_widths: Vec<u32>,
    /// JPEG quality for scaled images, 1-100.
    pub image_quality: u8,
    pub layout: PathLayout,
    /// Articles per front page before pagination kicks in.
    pub front_page_size: usize,
    pub rss: RssConfig,
    pub video: VideoConfig,
    pub menu: Vec<MenuEntry>,
    /// External syntax highlighter command; `{}` is replaced with the
    /// language tag. Absent = fenced code renders as plain `<pre><code>`.
    pub highlighter: Option<String>,
    /// Render worker count. 0 = one per available core.
    pub workers: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Example Site".to_string(),
            url: "https://example.org".to_string(),
            language: "en".to_string(),
            banner_widths: vec![1920, 1280, 800, 480],
            image_quality: 85,
            layout: PathLayout::default(),
            front_page_size: 16,
            rss: RssConfig::default(),
            video: VideoConfig::default(),
            menu: Vec::new(),
            highlighter: None,
            workers: 0,
        }
    }
}

impl SiteConfig {
    /// Worker count with the `0 = auto` policy applied.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        }
    }

    /// Site URL with any trailing slash stripped, for safe joining.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Load `site.toml` from the source root, falling back to defaults when the
/// file does not exist.
pub fn load_config(source: &Path) -> Result<SiteConfig, ConfigError> {
    let path = source.join("site.toml");
    if !path.exists() {
        return Ok(SiteConfig::default());
    }
    let text = fs::read_to_string(&path)?;
    Ok(toml::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();

        assert_eq!(config.name, "Example Site");
        assert_eq!(config.layout, PathLayout::Simple);
        assert!(config.rss.enabled);
        assert_eq!(config.video.max_rendition, 1080);
    }

    #[test]
    fn partial_file_keeps_defaults_for_rest() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("site.toml"),
            r#"
name = "Field Notes"
url = "https://notes.example/"
layout = "recursive"

[rss]
items = 5
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.name, "Field Notes");
        assert_eq!(config.layout, PathLayout::Recursive);
        assert_eq!(config.rss.items, 5);
        assert!(config.rss.enabled);
        assert_eq!(config.image_quality, 85);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = SiteConfig {
            url: "https://notes.example/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "https://notes.example");
    }

    #[test]
    fn invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("site.toml"), "name = [broken").unwrap();

        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn explicit_worker_count_wins() {
        let config = SiteConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(config.effective_workers(), 3);
    }

    #[test]
    fn menu_entries_deserialized() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("site.toml"),
            r#"
[[menu]]
path = "About/Contact"
url = "contact.html"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.menu.len(), 1);
        assert_eq!(config.menu[0].path, "About/Contact");
    }
}
