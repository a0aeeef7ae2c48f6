//! The typed content graph the scanner produces and every later stage reads.
//!
//! Ownership is flat: [`ContentGraph`] owns every [`Article`] and [`Series`]
//! in two arenas, and cross-references are index newtypes ([`ArticleId`],
//! [`SeriesId`]) rather than shared pointers. A member article holds its
//! series id; the series holds its member ids. Neither side can dangle while
//! the graph lives, and there is no reference cycle to manage.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::SystemTime;

/// Node flavor from the `type:` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Regular dated article. Listed, tagged, syndicated.
    #[default]
    Article,
    /// Standalone page (about, imprint). Rendered and mapped, but excluded
    /// from the front page, tag indexes, and the feed.
    Info,
    /// Cover page: the front cover at the root, a series cover inside a
    /// series directory.
    Index,
}

/// Header fields the scanner filled in because the source omitted them.
/// Consulted by the post-render backfill pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MissingFields {
    pub uuid: bool,
    pub published: bool,
    pub updated: bool,
}

impl MissingFields {
    pub fn any(&self) -> bool {
        self.uuid || self.published || self.updated
    }
}

/// Parsed header metadata for one node.
///
/// `published`/`updated` are `None` only between header parse and the
/// scanner's mtime fallback; every node in a finished graph carries both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub uuid: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    /// Slash-separated menu placement (`"Guides/Networking"`).
    pub menu: Option<String>,
    /// Template name override; the node kind picks the default.
    pub template: Option<String>,
    pub kind: NodeKind,
    /// Banner image path relative to the source root (`images/foo.jpg`).
    pub banner: Option<String>,
    pub banner_credits: Option<String>,
    pub comments: bool,
    /// Explicit ordering inside a series.
    pub part: Option<u32>,
    pub sitemap_priority: Option<String>,
    pub sitemap_changefreq: Option<String>,
    /// `published: false` marks a draft.
    pub is_published: bool,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Node disappears from the published set after this instant.
    pub expires: Option<DateTime<Utc>>,
    /// Site-relative output URL. Unset until the publish aggregator assigns
    /// it; exactly one assignment per run.
    pub relative_url: Option<String>,
    pub missing: MissingFields,
}

impl Metadata {
    pub fn new() -> Self {
        Self {
            comments: true,
            is_published: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArticleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesId(pub usize);

/// A single content file.
#[derive(Debug, Clone)]
pub struct Article {
    pub meta: Metadata,
    /// Markdown body, header block already stripped.
    pub body: String,
    pub source: PathBuf,
    pub mtime: SystemTime,
    /// File stem, the URL leaf.
    pub slug: String,
    /// Underscore-stripped directory names from the content root down to the
    /// file, series directory included. Drives recursive-layout URLs.
    pub dir_chain: Vec<String>,
    pub series: Option<SeriesId>,
    /// True for a series cover (`index.md` or `type: index`).
    pub is_cover: bool,
}

/// A directory of articles published as one unit.
#[derive(Debug, Clone)]
pub struct Series {
    /// Adopted from the cover article where one exists, otherwise derived
    /// from the directory name.
    pub meta: Metadata,
    pub dir_name: String,
    pub slug: String,
    pub articles: Vec<ArticleId>,
    pub cover: Option<ArticleId>,
    /// `.conf` files found in the series directory, kept for template
    /// overrides.
    pub config_files: Vec<PathBuf>,
}

/// Everything the scanner discovered, before publish filtering.
#[derive(Debug, Default)]
pub struct ContentGraph {
    pub articles: Vec<Article>,
    pub series: Vec<Series>,
    /// Root `index.md`, when present.
    pub front_cover: Option<ArticleId>,
}

impl ContentGraph {
    pub fn article(&self, id: ArticleId) -> &Article {
        &self.articles[id.0]
    }

    pub fn series_node(&self, id: SeriesId) -> &Series {
        &self.series[id.0]
    }

    pub fn push_article(&mut self, article: Article) -> ArticleId {
        self.articles.push(article);
        ArticleId(self.articles.len() - 1)
    }

    pub fn push_series(&mut self, series: Series) -> SeriesId {
        self.series.push(series);
        SeriesId(self.series.len() - 1)
    }
}
