//! Content tree scanning.
//!
//! Stage 1 of the build. Walks `<source>/articles/` and produces the
//! [`ContentGraph`] every later stage consumes.
//!
//! ## Directory structure
//!
//! ```text
//! articles/                        # Content root
//! ├── index.md                     # Front cover (optional)
//! ├── about.md                     # Standalone article
//! ├── _drafts/                     # Underscore = transparent grouping dir
//! │   └── notes.md                 #   scanned as if it sat one level up
//! └── raven_facts/                 # Any other directory = a series
//!     ├── index.md                 # Series cover
//!     ├── series.conf              # Kept for template overrides
//!     ├── one.md
//!     └── two.md
//! ```
//!
//! ## Rules
//!
//! - A series directory may not contain another series directory.
//! - `index.md` (or `type: index`) is the front cover at the root, the
//!   series cover inside a series, and a structural error anywhere else.
//! - `.conf` files only mean something in series scope; elsewhere they are
//!   warned about and skipped.
//! - Directory entries are visited in sorted order so ids are deterministic.
//!
//! Each recursion level receives its own snapshot of the ancestor directory
//! list (canonicalized); revisiting an ancestor, e.g. through a symlink,
//! is a structural error rather than an infinite walk.

use crate::header::{self, HeaderError};
use crate::model::{Article, ArticleId, ContentGraph, Metadata, NodeKind, Series};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{}: {source}", path.display())]
    Header {
        path: PathBuf,
        source: HeaderError,
    },
    #[error("Content root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Series inside a series: {}", .0.display())]
    NestedSeries(PathBuf),
    #[error("Directory cycle at {}", .0.display())]
    DirectoryLoop(PathBuf),
    #[error("Cover file outside root or series scope: {}", .0.display())]
    IndexOutsideScope(PathBuf),
}

/// Directory names where articles live, relative to the source root.
pub const CONTENT_DIR: &str = "articles";

/// Per-level traversal snapshot. Cloned (never mutated in place) before each
/// descent, so sibling branches can never observe each other's state.
#[derive(Debug, Clone, Default)]
struct Ancestry {
    /// Canonicalized ancestor directories, for cycle detection.
    dirs: Vec<PathBuf>,
    /// Underscore-stripped directory names from the content root down,
    /// feeding recursive-layout URLs.
    chain: Vec<String>,
}

impl Ancestry {
    fn descend(&self, canonical: PathBuf, name: &str) -> Self {
        let mut next = self.clone();
        next.dirs.push(canonical);
        next.chain.push(name.trim_start_matches('_').to_string());
        next
    }
}

/// Accumulates one series directory while its subtree is scanned.
struct SeriesScope {
    dir_name: String,
    articles: Vec<ArticleId>,
    cover: Option<ArticleId>,
    config_files: Vec<PathBuf>,
}

/// Scan the content tree under `<source>/articles/`.
pub fn scan(source: &Path) -> Result<ContentGraph, ScanError> {
    let root = source.join(CONTENT_DIR);
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root));
    }

    let mut graph = ContentGraph::default();
    let canonical = fs::canonicalize(&root)?;
    let ancestry = Ancestry {
        dirs: vec![canonical],
        chain: Vec::new(),
    };
    scan_dir(&root, ancestry, &mut graph, &mut None, true)?;
    Ok(graph)
}

fn scan_dir(
    dir: &Path,
    ancestry: Ancestry,
    graph: &mut ContentGraph,
    scope: &mut Option<SeriesScope>,
    at_root: bool,
) -> Result<(), ScanError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| !n.to_string_lossy().starts_with('.'))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            let name = entry
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let canonical = fs::canonicalize(&entry)?;
            if ancestry.dirs.contains(&canonical) {
                return Err(ScanError::DirectoryLoop(entry));
            }
            let child_ancestry = ancestry.descend(canonical, &name);

            if name.starts_with('_') {
                // Transparent grouping dir: same scope, one chain level.
                scan_dir(&entry, child_ancestry, graph, scope, false)?;
            } else if scope.is_some() {
                return Err(ScanError::NestedSeries(entry));
            } else {
                let mut series_scope = Some(SeriesScope {
                    dir_name: name.clone(),
                    articles: Vec::new(),
                    cover: None,
                    config_files: Vec::new(),
                });
                scan_dir(&entry, child_ancestry, graph, &mut series_scope, false)?;
                finalize_series(graph, series_scope.take());
            }
        } else {
            scan_file(&entry, &ancestry, graph, scope, at_root)?;
        }
    }
    Ok(())
}

fn scan_file(
    path: &Path,
    ancestry: &Ancestry,
    graph: &mut ContentGraph,
    scope: &mut Option<SeriesScope>,
    at_root: bool,
) -> Result<(), ScanError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "md" => {}
        "conf" => {
            match scope {
                Some(s) => s.config_files.push(path.to_path_buf()),
                None => warn!(path = %path.display(), "config file outside series scope, ignored"),
            }
            return Ok(());
        }
        _ => {
            warn!(path = %path.display(), "skipping file with unrecognized extension");
            return Ok(());
        }
    }

    let (mut meta, body) = header::parse_file(path).map_err(|source| match source {
        HeaderError::Io(e) => ScanError::Io(e),
        source => ScanError::Header {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let slug = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mtime = fs::metadata(path)?.modified()?;

    if meta.title.is_empty() {
        meta.title = title_from_stem(&slug);
    }
    let file_date: DateTime<Utc> = mtime.into();
    if meta.published.is_none() && meta.is_published {
        meta.published = Some(file_date);
    }
    if meta.updated.is_none() {
        meta.updated = Some(file_date);
    }

    let is_cover = slug == "index" || meta.kind == NodeKind::Index;
    if is_cover {
        meta.kind = NodeKind::Index;
        if scope.is_none() && !at_root {
            return Err(ScanError::IndexOutsideScope(path.to_path_buf()));
        }
    }

    let id = graph.push_article(Article {
        meta,
        body,
        source: path.to_path_buf(),
        mtime,
        slug,
        dir_chain: ancestry.chain.clone(),
        series: None,
        is_cover,
    });

    match scope {
        Some(s) => {
            if is_cover {
                if s.cover.is_some() {
                    warn!(path = %path.display(), "duplicate series cover, keeping the first");
                } else {
                    s.cover = Some(id);
                }
            } else {
                s.articles.push(id);
            }
        }
        None if is_cover => graph.front_cover = Some(id),
        None => {}
    }
    Ok(())
}

/// Close out a finished series directory: adopt the cover's descriptive
/// metadata (or derive it from the directory name) and wire member ids.
fn finalize_series(graph: &mut ContentGraph, scope: Option<SeriesScope>) {
    let Some(scope) = scope else { return };

    let meta = match scope.cover {
        Some(cover_id) => {
            let cover = graph.article(cover_id);
            let mut meta = cover.meta.clone();
            meta.kind = NodeKind::Index;
            meta
        }
        None => {
            let mut meta = Metadata::new();
            meta.uuid = uuid::Uuid::new_v4().to_string();
            meta.title = title_from_stem(&scope.dir_name);
            meta.kind = NodeKind::Index;
            meta
        }
    };

    let slug = scope.dir_name.clone();
    let series_id = graph.push_series(Series {
        meta,
        dir_name: scope.dir_name,
        slug,
        articles: scope.articles.clone(),
        cover: scope.cover,
        config_files: scope.config_files,
    });

    for id in scope.articles.iter().chain(scope.cover.iter()) {
        graph.articles[id.0].series = Some(series_id);
    }
}

/// `raven_facts` → `Raven facts`.
fn title_from_stem(stem: &str) -> String {
    let spaced = stem.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
