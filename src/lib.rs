//! # stanza
//!
//! A static site generator for articles and article series. Your filesystem
//! is the data source: markdown files under `articles/` become pages,
//! directories become series, and a `---`-delimited header block on each
//! file carries the metadata.
//!
//! # Architecture: Scan → Publish → Render → Commit
//!
//! ```text
//! 1. Scan      articles/   →  ContentGraph     (filesystem → typed graph)
//! 2. Publish   graph       →  Publication      (drafts out, URLs and tags in)
//! 3. Render    publication →  staging TempDir  (pages, sitemap, RSS, assets)
//! 4. Commit    staging     →  destination      (delete-then-copy swap)
//! ```
//!
//! The stages are separated so each is testable on its own: the scanner
//! never writes, the aggregator is a pure function over the graph, and the
//! renderer only ever touches the staging tree — a failed run leaves the
//! destination exactly as it was.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1 — walks `articles/`, builds the content graph |
//! | [`publish`] | Stage 2 — publish filtering, series pruning, tags, menu, URLs |
//! | [`render`] | Stage 3 — concurrent page rendering with fault isolation |
//! | [`write`] | Stage 4 — staging tree, static copies, destination commit |
//! | [`header`] | `---` header-block parsing, serialization, source backfill |
//! | [`model`] | `ContentGraph`, `Article`, `Series`, `Metadata` |
//! | [`config`] | `site.toml` loading and defaults |
//! | [`menu`] | menu tree folded from header and config declarations |
//! | [`template`] | `{{name}}` macro engine with embedded default templates |
//! | [`markdown`] | pulldown-cmark rendering with media-aware rewriting |
//! | [`assets`] | mtime-keyed derived assets: scaled images, video renditions |
//! | [`sitemap`] | `sitemap.xml` and `robots.txt` |
//! | [`feed`] | RSS 2.0 feed |
//!
//! # Design Decisions
//!
//! ## Derived assets live in the source tree
//!
//! Scaled images (`images/_scale_800/...`) and video renditions
//! (`video/_mp4/..._p720.mp4`) are written next to their sources and reused
//! whenever they are newer than them. Pages are cheap to re-render every
//! run; transcodes are not. Keying the cache on (path, mtime) keeps the
//! freshness check to two stat calls per asset.
//!
//! ## `{{name}}` templates, nothing more
//!
//! Templates are literal substitution with no conditionals or loops;
//! optional sections are assembled from `if-*` sub-templates by the render
//! stage. What a template can produce is exactly what you can read in it.
//!
//! ## Failures are counted, not propagated
//!
//! One article with a broken template override should not take down the
//! other ninety-nine pages. Render tasks log their failure, the run
//! finishes, and [`render::RunSummary`] reports the count; callers that
//! need all-or-nothing check `is_clean()` before deploying.

pub mod assets;
pub mod config;
pub mod feed;
pub mod header;
pub mod markdown;
pub mod menu;
pub mod model;
pub mod publish;
pub mod render;
pub mod scan;
pub mod sitemap;
pub mod template;
pub mod write;

use crate::assets::ToolQueue;
use crate::assets::image::ImageRsCodec;
use crate::render::{RenderContext, RunSummary};
use crate::template::TemplateSet;
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Scan error: {0}")]
    Scan(#[from] scan::ScanError),
    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),
    #[error("Write error: {0}")]
    Write(#[from] write::WriteError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Include drafts and future-dated nodes; never backfill sources.
    pub preview: bool,
    /// Override the configured worker count.
    pub jobs: Option<usize>,
    /// Persist the staging tree for inspection instead of deleting it.
    pub keep_staging: bool,
}

/// Run the full pipeline: scan, aggregate, render, backfill, commit.
pub fn build(options: &BuildOptions) -> Result<RunSummary, BuildError> {
    let mut config = config::load_config(&options.source)?;
    if let Some(jobs) = options.jobs {
        config.workers = jobs;
    }
    let templates = TemplateSet::load(&options.source)?;

    let graph = scan::scan(&options.source)?;
    info!(
        articles = graph.articles.len(),
        series = graph.series.len(),
        "content tree scanned"
    );

    let publication = publish::aggregate(graph, &config, Utc::now(), options.preview);

    let staging = write::Staging::new()?;
    let codec = ImageRsCodec;
    let queue = ToolQueue::new();
    let ctx = RenderContext {
        source: &options.source,
        staging: staging.path(),
        config: &config,
        templates: &templates,
        publication: &publication,
        codec: &codec,
        queue: &queue,
    };
    let summary = render::render_site(&ctx)?;

    // Static trees go in after rendering so freshly derived assets are
    // part of the copy.
    write::copy_static_dirs(&options.source, staging.path())?;

    if !options.preview {
        backfill_sources(&publication);
    }

    write::commit(staging.path(), &options.destination)?;
    if options.keep_staging {
        let kept = staging.keep();
        info!(path = %kept.display(), "staging tree kept");
    }
    Ok(summary)
}

/// Write scanner-invented `uuid`/`published`/`updated` values back into the
/// source headers. Failures are warnings; the artifact is already built.
fn backfill_sources(publication: &publish::Publication) {
    for article in &publication.graph.articles {
        if !article.meta.missing.any() {
            continue;
        }
        if let Err(e) = header::backfill_header(&article.source, &article.meta) {
            warn!(path = %article.source.display(), error = %e, "header backfill failed");
        }
    }
}
