//! Concurrent render orchestration.
//!
//! One task per front page, publishable article, series, and non-empty tag.
//! Tasks run on a dedicated rayon pool sized from configuration; the
//! `par_iter` fan-in is the completion barrier. A failing task is logged
//! and counted, never propagated — one broken article must not take the
//! other ninety-nine pages down. The caller inspects [`RunSummary`] to
//! decide whether the run was clean.
//!
//! Sitemap and feed entries are appended from worker threads behind
//! mutexes and only read after the barrier; `sitemap.xml`, `robots.txt`
//! and `index.rss` are written single-threaded afterwards.

use crate::assets::ToolQueue;
use crate::assets::image::{ImageCodec, prepare_image, srcset};
use crate::config::SiteConfig;
use crate::feed::{self, FeedEntry};
use crate::markdown::{Renderer, escape_attr, escape_text};
use crate::menu::{Menu, MenuNode};
use crate::model::{ArticleId, Metadata, NodeKind, SeriesId};
use crate::publish::{NodeRef, Publication};
use crate::sitemap::{Sitemap, SitemapEntry, robots_txt};
use crate::template::{Vars, expand};
use crate::template::TemplateSet;
use crate::write::{WriteError, write_page};
use chrono::{DateTime, Utc};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Write error: {0}")]
    Write(#[from] WriteError),
    #[error("Worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("No such template: {0}")]
    MissingTemplate(String),
}

/// Outcome of a render run. Failed tasks do not abort the run; this is how
/// callers find out about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub rendered: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pages rendered, {} failed", self.rendered, self.failed)
    }
}

/// Everything a render task needs, shared immutably across workers.
pub struct RenderContext<'a> {
    pub source: &'a Path,
    pub staging: &'a Path,
    pub config: &'a SiteConfig,
    pub templates: &'a TemplateSet,
    pub publication: &'a Publication,
    pub codec: &'a dyn ImageCodec,
    pub queue: &'a ToolQueue,
}

#[derive(Debug, Clone)]
enum RenderTask {
    FrontPage(usize),
    Article(ArticleId),
    Series(SeriesId),
    Tag(String),
}

/// Render every page into the staging tree, then the post-barrier outputs.
pub fn render_site(ctx: &RenderContext) -> Result<RunSummary, RenderError> {
    let publication = ctx.publication;
    let page_size = ctx.config.front_page_size.max(1);
    let front_pages = publication.front.len().div_ceil(page_size).max(1);

    let mut tasks: Vec<RenderTask> = (0..front_pages).map(RenderTask::FrontPage).collect();
    for node in &publication.front {
        if let NodeRef::Article(id) = node {
            tasks.push(RenderTask::Article(*id));
        }
    }
    for sid in &publication.series {
        tasks.push(RenderTask::Series(*sid));
        for id in &publication.graph.series_node(*sid).articles {
            tasks.push(RenderTask::Article(*id));
        }
    }
    tasks.extend(publication.infos.iter().copied().map(RenderTask::Article));
    tasks.extend(publication.tags.keys().cloned().map(RenderTask::Tag));

    let pool = ThreadPoolBuilder::new()
        .num_threads(ctx.config.effective_workers())
        .build()?;

    let sitemap = Mutex::new(Sitemap::new());
    let feed_entries: Mutex<Vec<FeedEntry>> = Mutex::new(Vec::new());
    let rendered = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    pool.install(|| {
        tasks.par_iter().for_each(|task| {
            let result = match task {
                RenderTask::FrontPage(number) => render_front_page(ctx, *number, &sitemap),
                RenderTask::Article(id) => render_article(ctx, *id, &sitemap, &feed_entries),
                RenderTask::Series(sid) => render_series(ctx, *sid, &sitemap),
                RenderTask::Tag(key) => render_tag(ctx, key, &sitemap),
            };
            match result {
                Ok(()) => {
                    rendered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(task = ?task, error = %e, "render task failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    });

    // Fan-in has completed; the collectors are ours again.
    let sitemap = sitemap.into_inner().unwrap_or_else(|e| e.into_inner());
    write_page(ctx.staging, "sitemap.xml", &sitemap.to_xml())?;
    write_page(ctx.staging, "robots.txt", &robots_txt(ctx.config.base_url()))?;
    if ctx.config.rss.enabled {
        let entries = feed_entries.into_inner().unwrap_or_else(|e| e.into_inner());
        write_page(ctx.staging, "index.rss", &feed::to_rss(ctx.config, entries))?;
    }

    let summary = RunSummary {
        rendered: rendered.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    };
    info!(%summary, "render complete");
    Ok(summary)
}

fn renderer<'a>(ctx: &'a RenderContext) -> Renderer<'a> {
    Renderer {
        root: ctx.source,
        codec: ctx.codec,
        queue: ctx.queue,
        config: ctx.config,
    }
}

fn base_vars(ctx: &RenderContext) -> Vars {
    let mut vars = Vars::new();
    vars.insert("site-name".to_string(), ctx.config.name.clone());
    vars.insert("site-url".to_string(), ctx.config.base_url().to_string());
    vars.insert("lang".to_string(), ctx.config.language.clone());
    vars.insert("menu".to_string(), menu_html(&ctx.publication.menu));
    vars
}

fn menu_html(menu: &Menu) -> String {
    fn items(nodes: &[MenuNode], out: &mut String) {
        out.push_str("<ul>");
        for node in nodes {
            out.push_str("<li>");
            if node.url.is_empty() {
                out.push_str(&format!("<span>{}</span>", escape_text(&node.name)));
            } else {
                out.push_str(&format!(
                    r#"<a href="{}">{}</a>"#,
                    escape_attr(&node.url),
                    escape_text(&node.name)
                ));
            }
            if !node.children.is_empty() {
                items(&node.children, out);
            }
            out.push_str("</li>");
        }
        out.push_str("</ul>");
    }

    if menu.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    items(&menu.roots, &mut out);
    out
}

fn format_day(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn banner_html(ctx: &RenderContext, meta: &Metadata) -> String {
    let Some(banner) = &meta.banner else {
        return String::new();
    };
    match prepare_image(
        ctx.codec,
        ctx.source,
        banner,
        &ctx.config.banner_widths,
        ctx.config.image_quality,
    ) {
        Ok(renditions) => {
            let mut vars = Vars::new();
            if let Some(smallest) = renditions.last() {
                vars.insert("banner-src".to_string(), smallest.rel.clone());
            }
            vars.insert("banner-srcset".to_string(), srcset(&renditions));
            vars.insert("title".to_string(), escape_attr(&meta.title));
            vars.insert(
                "banner-credits".to_string(),
                meta.banner_credits.clone().unwrap_or_default(),
            );
            ctx.templates.expand_partial("if-banner", &vars)
        }
        Err(e) => {
            warn!(banner = %banner, error = %e, "banner preparation failed, omitting");
            String::new()
        }
    }
}

fn authors_html(ctx: &RenderContext, meta: &Metadata) -> String {
    if meta.authors.is_empty() {
        return String::new();
    }
    let mut vars = Vars::new();
    vars.insert("authors".to_string(), escape_text(&meta.authors.join(", ")));
    ctx.templates.expand_partial("if-authors", &vars)
}

/// One listing entry, shared by front pages, series pages, and tag pages.
fn summary_html(ctx: &RenderContext, meta: &Metadata) -> String {
    let mut vars = Vars::new();
    vars.insert(
        "url".to_string(),
        meta.relative_url.clone().unwrap_or_default(),
    );
    vars.insert("title".to_string(), escape_text(&meta.title));
    vars.insert("date".to_string(), format_day(meta.published));
    vars.insert(
        "abstract".to_string(),
        escape_text(meta.abstract_text.as_deref().unwrap_or_default()),
    );
    vars.insert("if-authors".to_string(), authors_html(ctx, meta));
    vars.insert("if-banner".to_string(), banner_html(ctx, meta));
    ctx.templates.expand_partial("summary", &vars)
}

fn node_meta<'a>(ctx: &'a RenderContext, node: &NodeRef) -> &'a Metadata {
    match node {
        NodeRef::Article(id) => &ctx.publication.graph.article(*id).meta,
        NodeRef::Series(sid) => &ctx.publication.graph.series_node(*sid).meta,
    }
}

fn absolute_url(ctx: &RenderContext, rel: &str) -> String {
    format!("{}/{}", ctx.config.base_url(), rel)
}

fn map_entry(ctx: &RenderContext, meta: &Metadata, rel: &str) -> SitemapEntry {
    SitemapEntry {
        url: absolute_url(ctx, rel),
        lastmod: meta.updated.or(meta.published),
        priority: meta.sitemap_priority.clone(),
        changefreq: meta.sitemap_changefreq.clone(),
    }
}

fn lookup_template<'a>(
    ctx: &'a RenderContext,
    meta: &Metadata,
    default: &str,
) -> Result<&'a str, RenderError> {
    let name = meta.template.as_deref().unwrap_or(default);
    ctx.templates
        .get(name)
        .ok_or_else(|| RenderError::MissingTemplate(name.to_string()))
}

fn tag_links(ctx: &RenderContext, meta: &Metadata) -> String {
    meta.tags
        .iter()
        .filter_map(|tag| {
            let info = ctx.publication.tags.get(&tag.to_lowercase())?;
            Some(format!(
                r#"<a href="_tags/{}.html">{}</a>"#,
                escape_attr(&info.slug),
                escape_text(tag)
            ))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Prev/next/up navigation for a series member.
fn nav_html(ctx: &RenderContext, id: ArticleId) -> String {
    let graph = &ctx.publication.graph;
    let article = graph.article(id);
    let Some(sid) = article.series else {
        return String::new();
    };
    if article.is_cover {
        return String::new();
    }
    let series = graph.series_node(sid);
    let Some(pos) = series.articles.iter().position(|a| *a == id) else {
        return String::new();
    };

    let anchor = |meta: &Metadata, class: &str| -> String {
        match &meta.relative_url {
            Some(url) => format!(
                r#"<a class="{class}" href="{}">{}</a>"#,
                escape_attr(url),
                escape_text(&meta.title)
            ),
            None => String::new(),
        }
    };

    let mut vars = Vars::new();
    if pos > 0 {
        vars.insert(
            "prev".to_string(),
            anchor(&graph.article(series.articles[pos - 1]).meta, "prev"),
        );
    }
    if pos + 1 < series.articles.len() {
        vars.insert(
            "next".to_string(),
            anchor(&graph.article(series.articles[pos + 1]).meta, "next"),
        );
    }
    vars.insert("up".to_string(), anchor(&series.meta, "up"));
    ctx.templates.expand_partial("if-nav", &vars)
}

fn render_article(
    ctx: &RenderContext,
    id: ArticleId,
    sitemap: &Mutex<Sitemap>,
    feed_entries: &Mutex<Vec<FeedEntry>>,
) -> Result<(), RenderError> {
    let article = ctx.publication.graph.article(id);
    let meta = &article.meta;
    let Some(rel) = meta.relative_url.clone() else {
        return Ok(());
    };

    let content = renderer(ctx).render(&article.body);
    let mut vars = base_vars(ctx);
    vars.insert("title".to_string(), escape_text(&meta.title));
    vars.insert(
        "abstract".to_string(),
        escape_text(meta.abstract_text.as_deref().unwrap_or_default()),
    );
    vars.insert("date".to_string(), format_day(meta.published));
    vars.insert("content".to_string(), content);
    vars.insert("tag-links".to_string(), tag_links(ctx, meta));
    // Hook for site templates that embed a comments widget.
    vars.insert("comments-enabled".to_string(), meta.comments.to_string());
    vars.insert("if-authors".to_string(), authors_html(ctx, meta));
    vars.insert("if-banner".to_string(), banner_html(ctx, meta));
    vars.insert("if-nav".to_string(), nav_html(ctx, id));

    let template = lookup_template(ctx, meta, "article")?;
    write_page(ctx.staging, &rel, &expand(template, &vars))?;

    sitemap
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(map_entry(ctx, meta, &rel));

    if meta.kind == NodeKind::Article && !article.is_cover {
        feed_entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FeedEntry {
                title: meta.title.clone(),
                url: absolute_url(ctx, &rel),
                uuid: meta.uuid.clone(),
                description: meta.abstract_text.clone().unwrap_or_default(),
                published: meta.published.unwrap_or(DateTime::UNIX_EPOCH),
            });
    }
    Ok(())
}

fn render_series(
    ctx: &RenderContext,
    sid: SeriesId,
    sitemap: &Mutex<Sitemap>,
) -> Result<(), RenderError> {
    let graph = &ctx.publication.graph;
    let series = graph.series_node(sid);
    let meta = &series.meta;
    let Some(rel) = meta.relative_url.clone() else {
        return Ok(());
    };

    let summaries: String = series
        .articles
        .iter()
        .map(|id| summary_html(ctx, &graph.article(*id).meta))
        .collect();
    let content = series
        .cover
        .map(|id| renderer(ctx).render(&graph.article(id).body))
        .unwrap_or_default();

    let mut vars = base_vars(ctx);
    vars.insert("title".to_string(), escape_text(&meta.title));
    vars.insert(
        "abstract".to_string(),
        escape_text(meta.abstract_text.as_deref().unwrap_or_default()),
    );
    vars.insert("content".to_string(), content);
    vars.insert("if-banner".to_string(), banner_html(ctx, meta));
    vars.insert("summaries".to_string(), summaries);

    let template = lookup_template(ctx, meta, "series")?;
    write_page(ctx.staging, &rel, &expand(template, &vars))?;

    sitemap
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(map_entry(ctx, meta, &rel));
    Ok(())
}

fn render_front_page(
    ctx: &RenderContext,
    number: usize,
    sitemap: &Mutex<Sitemap>,
) -> Result<(), RenderError> {
    let publication = ctx.publication;
    let page_size = ctx.config.front_page_size.max(1);
    let start = number * page_size;
    let end = (start + page_size).min(publication.front.len());
    let slice = publication.front.get(start..end).unwrap_or_default();

    let summaries: String = slice
        .iter()
        .map(|node| summary_html(ctx, node_meta(ctx, node)))
        .collect();

    let mut vars = base_vars(ctx);
    vars.insert("summaries".to_string(), summaries);

    // The front cover contributes its body and banner to the first page.
    if number == 0
        && let Some(cover_id) = publication.graph.front_cover
    {
        let cover = publication.graph.article(cover_id);
        vars.insert("abstract".to_string(), renderer(ctx).render(&cover.body));
        vars.insert("if-banner".to_string(), banner_html(ctx, &cover.meta));
    }

    let mut pager_vars = Vars::new();
    if number > 0 {
        let newer = if number == 1 {
            "index.html".to_string()
        } else {
            format!("index_p{}.html", number - 1)
        };
        pager_vars.insert(
            "newer".to_string(),
            format!(r#"<a class="newer" href="{newer}">Newer</a>"#),
        );
    }
    if end < publication.front.len() {
        pager_vars.insert(
            "older".to_string(),
            format!(
                r#"<a class="older" href="index_p{}.html">Older</a>"#,
                number + 1
            ),
        );
    }
    if !pager_vars.is_empty() {
        vars.insert(
            "if-pager".to_string(),
            ctx.templates.expand_partial("if-pager", &pager_vars),
        );
    }

    let template = ctx
        .templates
        .get("frontpage")
        .ok_or_else(|| RenderError::MissingTemplate("frontpage".to_string()))?;
    let rel = if number == 0 {
        "index.html".to_string()
    } else {
        format!("index_p{number}.html")
    };
    write_page(ctx.staging, &rel, &expand(template, &vars))?;

    let newest = publication
        .front
        .first()
        .and_then(|n| node_meta(ctx, n).updated);
    sitemap
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(SitemapEntry {
            url: absolute_url(ctx, &rel),
            lastmod: newest,
            priority: None,
            changefreq: None,
        });
    Ok(())
}

fn render_tag(
    ctx: &RenderContext,
    key: &str,
    sitemap: &Mutex<Sitemap>,
) -> Result<(), RenderError> {
    let Some(info) = ctx.publication.tags.get(key) else {
        return Ok(());
    };
    let graph = &ctx.publication.graph;

    let mut nodes = info.nodes.clone();
    nodes.sort_by(|a, b| {
        graph
            .article(*b)
            .meta
            .published
            .cmp(&graph.article(*a).meta.published)
    });
    let summaries: String = nodes
        .iter()
        .map(|id| summary_html(ctx, &graph.article(*id).meta))
        .collect();

    let mut vars = base_vars(ctx);
    vars.insert("tag".to_string(), escape_text(&info.display));
    vars.insert("summaries".to_string(), summaries);

    let template = ctx
        .templates
        .get("tags")
        .ok_or_else(|| RenderError::MissingTemplate("tags".to_string()))?;
    let rel = format!("_tags/{}.html", info.slug);
    write_page(ctx.staging, &rel, &expand(template, &vars))?;

    sitemap
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(SitemapEntry {
            url: absolute_url(ctx, &rel),
            lastmod: None,
            priority: None,
            changefreq: None,
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::image::tests::MockCodec;
    use crate::model::{Article, ContentGraph};
    use crate::publish;
    use chrono::TimeZone;
    use std::fs;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn meta(title: &str, day: u32) -> Metadata {
        let mut m = Metadata::new();
        m.uuid = format!("uuid-{title}");
        m.title = title.to_string();
        m.published = Some(date(day));
        m.updated = Some(date(day));
        m
    }

    fn article(slug: &str, meta: Metadata, body: &str) -> Article {
        Article {
            meta,
            body: body.to_string(),
            source: PathBuf::from(format!("{slug}.md")),
            mtime: SystemTime::UNIX_EPOCH,
            slug: slug.to_string(),
            dir_chain: Vec::new(),
            series: None,
            is_cover: false,
        }
    }

    struct Fixture {
        _source: TempDir,
        source_path: PathBuf,
        staging: TempDir,
        config: SiteConfig,
        templates: TemplateSet,
        publication: Publication,
        codec: MockCodec,
        queue: ToolQueue,
    }

    impl Fixture {
        fn new(graph: ContentGraph, config: SiteConfig) -> Self {
            let source = TempDir::new().unwrap();
            let templates = TemplateSet::load(source.path()).unwrap();
            let publication = publish::aggregate(graph, &config, date(20), false);
            Self {
                source_path: source.path().to_path_buf(),
                _source: source,
                staging: TempDir::new().unwrap(),
                config,
                templates,
                publication,
                codec: MockCodec::new((4000, 3000)),
                queue: ToolQueue::new(),
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                source: &self.source_path,
                staging: self.staging.path(),
                config: &self.config,
                templates: &self.templates,
                publication: &self.publication,
                codec: &self.codec,
                queue: &self.queue,
            }
        }

        fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.staging.path().join(rel)).unwrap()
        }
    }

    fn two_article_graph() -> ContentGraph {
        let mut graph = ContentGraph::default();
        let mut a = meta("Alpha", 3);
        a.tags = vec!["Birds".to_string()];
        a.abstract_text = Some("about alpha".to_string());
        graph.push_article(article("alpha", a, "# Alpha\n\nbody"));
        graph.push_article(article("beta", meta("Beta", 8), "beta body"));
        graph
    }

    #[test]
    fn full_render_produces_expected_tree() {
        let fixture = Fixture::new(two_article_graph(), SiteConfig::default());
        let summary = render_site(&fixture.ctx()).unwrap();

        assert!(summary.is_clean());
        // 1 front page + 2 articles + 1 tag page
        assert_eq!(summary.rendered, 4);
        assert!(fixture.staging.path().join("index.html").is_file());
        assert!(fixture.staging.path().join("alpha.html").is_file());
        assert!(fixture.staging.path().join("_tags/birds.html").is_file());
        assert!(fixture.staging.path().join("sitemap.xml").is_file());
        assert!(fixture.staging.path().join("robots.txt").is_file());
        assert!(fixture.staging.path().join("index.rss").is_file());
    }

    #[test]
    fn front_page_lists_newest_first() {
        let fixture = Fixture::new(two_article_graph(), SiteConfig::default());
        render_site(&fixture.ctx()).unwrap();

        let html = fixture.read("index.html");
        let beta = html.find("Beta").unwrap();
        let alpha = html.find("Alpha").unwrap();
        assert!(beta < alpha);
    }

    #[test]
    fn article_page_contains_rendered_body_and_tags() {
        let fixture = Fixture::new(two_article_graph(), SiteConfig::default());
        render_site(&fixture.ctx()).unwrap();

        let html = fixture.read("alpha.html");
        assert!(html.contains("<h1>Alpha</h1>"));
        assert!(html.contains(r#"<a href="_tags/birds.html">Birds</a>"#));
    }

    #[test]
    fn pagination_splits_and_links() {
        let mut graph = ContentGraph::default();
        for i in 1..=5 {
            graph.push_article(article(
                &format!("a{i}"),
                meta(&format!("A{i}"), i as u32),
                "body",
            ));
        }
        let config = SiteConfig {
            front_page_size: 2,
            ..Default::default()
        };
        let fixture = Fixture::new(graph, config);
        render_site(&fixture.ctx()).unwrap();

        assert!(fixture.staging.path().join("index.html").is_file());
        assert!(fixture.staging.path().join("index_p1.html").is_file());
        assert!(fixture.staging.path().join("index_p2.html").is_file());
        assert!(!fixture.staging.path().join("index_p3.html").exists());

        let first = fixture.read("index.html");
        assert!(first.contains("index_p1.html"));
        assert!(!first.contains("Newer"));

        let middle = fixture.read("index_p1.html");
        assert!(middle.contains("index.html"));
        assert!(middle.contains("index_p2.html"));
    }

    #[test]
    fn rss_disabled_skips_feed() {
        let config = SiteConfig {
            rss: crate::config::RssConfig {
                enabled: false,
                items: 10,
            },
            ..Default::default()
        };
        let fixture = Fixture::new(two_article_graph(), config);
        render_site(&fixture.ctx()).unwrap();
        assert!(!fixture.staging.path().join("index.rss").exists());
    }

    #[test]
    fn feed_contains_articles_with_absolute_urls() {
        let fixture = Fixture::new(two_article_graph(), SiteConfig::default());
        render_site(&fixture.ctx()).unwrap();

        let rss = fixture.read("index.rss");
        assert!(rss.contains("<link>https://example.org/alpha.html</link>"));
        assert!(rss.contains("<guid isPermaLink=\"false\">uuid-alpha</guid>"));
    }

    #[test]
    fn sitemap_covers_every_page_once() {
        let fixture = Fixture::new(two_article_graph(), SiteConfig::default());
        render_site(&fixture.ctx()).unwrap();

        let xml = fixture.read("sitemap.xml");
        // front page + 2 articles + tag page
        assert_eq!(xml.matches("<loc>").count(), 4);
        assert!(xml.contains("https://example.org/index.html"));
    }

    #[test]
    fn missing_template_fails_task_not_run() {
        let mut graph = ContentGraph::default();
        let mut m = meta("Odd", 3);
        m.template = Some("no-such-template".to_string());
        graph.push_article(article("odd", m, "body"));
        graph.push_article(article("fine", meta("Fine", 4), "body"));

        let fixture = Fixture::new(graph, SiteConfig::default());
        let summary = render_site(&fixture.ctx()).unwrap();

        assert_eq!(summary.failed, 1);
        assert!(fixture.staging.path().join("fine.html").is_file());
        assert!(!fixture.staging.path().join("odd.html").exists());
    }

    #[test]
    fn series_page_lists_members_with_navigation() {
        let mut graph = ContentGraph::default();
        let a = graph.push_article(article("one", meta("One", 2), "body one"));
        let b = graph.push_article(article("two", meta("Two", 5), "body two"));
        let sid = graph.push_series(crate::model::Series {
            meta: meta("Guide", 1),
            dir_name: "guide".to_string(),
            slug: "guide".to_string(),
            articles: vec![a, b],
            cover: None,
            config_files: Vec::new(),
        });
        graph.articles[a.0].series = Some(sid);
        graph.articles[b.0].series = Some(sid);

        let fixture = Fixture::new(graph, SiteConfig::default());
        render_site(&fixture.ctx()).unwrap();

        let series_page = fixture.read("guide/index.html");
        let one = series_page.find("One").unwrap();
        let two = series_page.find("Two").unwrap();
        assert!(one < two, "members oldest first");

        let member = fixture.read("guide/two.html");
        assert!(member.contains(r#"class="prev" href="guide/one.html""#));
        assert!(member.contains(r#"class="up" href="guide/index.html""#));
    }
}
