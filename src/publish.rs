//! Publish aggregation: from the full content graph to the set of pages a
//! run will actually emit.
//!
//! This stage owns four decisions:
//!
//! - which nodes are publishable right now (draft flag, publish date in the
//!   future, expiry in the past) — preview mode short-circuits all three;
//! - series membership: an all-draft series disappears, a partial one keeps
//!   exactly its publishable members, `part`-sorted when every member
//!   declares a part and oldest-first otherwise, with the series `updated`
//!   promoted to the newest member;
//! - the tag index, keyed by Unicode-lowercased tag with the first-seen
//!   spelling as display name;
//! - output URLs. `relative_url` is assigned exactly once, here, after
//!   filtering; nothing downstream recomputes paths.

use crate::config::{PathLayout, SiteConfig};
use crate::menu::Menu;
use crate::model::{ArticleId, ContentGraph, Metadata, NodeKind, SeriesId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// A front-page or tag-index entry: either a standalone article or a whole
/// series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Article(ArticleId),
    Series(SeriesId),
}

#[derive(Debug, Clone, Default)]
pub struct TagInfo {
    /// First-seen spelling, shown in headings.
    pub display: String,
    /// URL leaf under `_tags/`.
    pub slug: String,
    pub nodes: Vec<ArticleId>,
}

/// Everything the render stage needs, publish decisions already made.
#[derive(Debug)]
pub struct Publication {
    pub graph: ContentGraph,
    /// Front-page entries, newest first.
    pub front: Vec<NodeRef>,
    /// Series that kept at least one publishable member.
    pub series: Vec<SeriesId>,
    /// Publishable `type: info` pages.
    pub infos: Vec<ArticleId>,
    /// Case-folded tag key to index entry.
    pub tags: BTreeMap<String, TagInfo>,
    pub menu: Menu,
    pub preview: bool,
}

/// Publish validity for a single node.
pub fn is_publishable(meta: &Metadata, now: DateTime<Utc>, preview: bool) -> bool {
    if preview {
        return true;
    }
    if !meta.is_published {
        return false;
    }
    match meta.published {
        Some(date) if date > now => return false,
        Some(_) => {}
        None => return false,
    }
    match meta.expires {
        Some(expiry) => expiry > now,
        None => true,
    }
}

fn sort_date(meta: &Metadata) -> DateTime<Utc> {
    meta.published
        .or(meta.updated)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

fn tag_slug(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// Run publish aggregation over a scanned graph.
pub fn aggregate(
    mut graph: ContentGraph,
    config: &SiteConfig,
    now: DateTime<Utc>,
    preview: bool,
) -> Publication {
    // Series first: prune members, sort, promote dates.
    let mut kept_series = Vec::new();
    for sid in 0..graph.series.len() {
        let sid = SeriesId(sid);
        let mut members: Vec<ArticleId> = graph.series_node(sid).articles.clone();
        members.retain(|id| is_publishable(&graph.article(*id).meta, now, preview));
        if members.is_empty() {
            graph.series[sid.0].articles.clear();
            continue;
        }

        let all_have_parts = members
            .iter()
            .all(|id| graph.article(*id).meta.part.is_some());
        if all_have_parts {
            members.sort_by_key(|id| graph.article(*id).meta.part);
        } else {
            members.sort_by_key(|id| sort_date(&graph.article(*id).meta));
        }

        let newest_updated = members
            .iter()
            .filter_map(|id| graph.article(*id).meta.updated)
            .max();
        let newest_published = members
            .iter()
            .filter_map(|id| graph.article(*id).meta.published)
            .max();

        let series = &mut graph.series[sid.0];
        series.articles = members;
        if let Some(date) = newest_updated {
            series.meta.updated = Some(date);
        }
        if series.meta.published.is_none() {
            series.meta.published = newest_published;
        }
        kept_series.push(sid);
    }

    assign_urls(&mut graph, &kept_series, config.layout);

    // Front page: standalone articles plus whole series, newest first.
    let mut front: Vec<NodeRef> = Vec::new();
    let mut infos: Vec<ArticleId> = Vec::new();
    for (i, article) in graph.articles.iter().enumerate() {
        let id = ArticleId(i);
        if article.series.is_some() || article.is_cover {
            continue;
        }
        if !is_publishable(&article.meta, now, preview) {
            continue;
        }
        match article.meta.kind {
            NodeKind::Info => infos.push(id),
            _ => front.push(NodeRef::Article(id)),
        }
    }
    front.extend(kept_series.iter().map(|sid| NodeRef::Series(*sid)));
    front.sort_by(|a, b| {
        let date = |n: &NodeRef| match n {
            NodeRef::Article(id) => sort_date(&graph.article(*id).meta),
            NodeRef::Series(id) => sort_date(&graph.series_node(*id).meta),
        };
        date(b).cmp(&date(a))
    });

    let tags = collect_tags(&graph, &front);
    let menu = build_menu(&graph, config, &front, &infos);

    Publication {
        graph,
        front,
        series: kept_series,
        infos,
        tags,
        menu,
        preview,
    }
}

/// Assign `relative_url` to every node that survived filtering.
fn assign_urls(graph: &mut ContentGraph, kept_series: &[SeriesId], layout: PathLayout) {
    for sid in kept_series {
        let slug = graph.series[sid.0].slug.clone();
        graph.series[sid.0].meta.relative_url = Some(format!("{slug}/index.html"));
        for aid in graph.series[sid.0].articles.clone() {
            let url = match layout {
                PathLayout::Simple => {
                    format!("{slug}/{}.html", graph.articles[aid.0].slug)
                }
                PathLayout::Recursive => chain_url(graph, aid),
            };
            graph.articles[aid.0].meta.relative_url = Some(url);
        }
        if let Some(cover) = graph.series[sid.0].cover {
            graph.articles[cover.0].meta.relative_url = Some(format!("{slug}/index.html"));
        }
    }

    for i in 0..graph.articles.len() {
        let article = &graph.articles[i];
        if article.series.is_some() || article.meta.relative_url.is_some() {
            continue;
        }
        if article.is_cover {
            graph.articles[i].meta.relative_url = Some("index.html".to_string());
            continue;
        }
        let url = match layout {
            PathLayout::Simple => format!("{}.html", article.slug),
            PathLayout::Recursive => chain_url(graph, ArticleId(i)),
        };
        graph.articles[i].meta.relative_url = Some(url);
    }
}

fn chain_url(graph: &ContentGraph, id: ArticleId) -> String {
    let article = graph.article(id);
    let mut parts = article.dir_chain.clone();
    parts.push(format!("{}.html", article.slug));
    parts.join("/")
}

/// Fold tags across every listed article and every kept series member, in
/// scan order so display casing comes from the first occurrence on disk.
/// Each member also carries the union of its series' own declared tags.
/// Covers and info pages stay out of the index.
fn collect_tags(graph: &ContentGraph, front: &[NodeRef]) -> BTreeMap<String, TagInfo> {
    let mut listed: BTreeSet<usize> = BTreeSet::new();
    for node in front {
        match node {
            NodeRef::Article(id) => {
                listed.insert(id.0);
            }
            NodeRef::Series(sid) => {
                listed.extend(graph.series_node(*sid).articles.iter().map(|id| id.0));
            }
        }
    }

    let mut tags: BTreeMap<String, TagInfo> = BTreeMap::new();
    for index in listed {
        let id = ArticleId(index);
        let article = graph.article(id);
        let series_tags = article
            .series
            .map(|sid| graph.series_node(sid).meta.tags.as_slice())
            .unwrap_or_default();
        for tag in article.meta.tags.iter().chain(series_tags) {
            let key = tag.to_lowercase();
            let info = tags.entry(key.clone()).or_insert_with(|| TagInfo {
                display: tag.clone(),
                slug: tag_slug(&key),
                nodes: Vec::new(),
            });
            // Same tag on both the member and its series counts once.
            if info.nodes.last() != Some(&id) {
                info.nodes.push(id);
            }
        }
    }
    tags
}

/// Config-declared entries first, then every published node that asked for
/// a placement. Later declarations overwrite earlier ones.
fn build_menu(
    graph: &ContentGraph,
    config: &SiteConfig,
    front: &[NodeRef],
    infos: &[ArticleId],
) -> Menu {
    let mut menu = Menu::default();
    for entry in &config.menu {
        menu.insert(&entry.path, &entry.url);
    }

    let mut add = |meta: &Metadata| {
        if let (Some(path), Some(url)) = (&meta.menu, &meta.relative_url) {
            menu.insert(path, url);
        }
    };
    for node in front {
        match node {
            NodeRef::Article(id) => add(&graph.article(*id).meta),
            NodeRef::Series(sid) => add(&graph.series_node(*sid).meta),
        }
    }
    for id in infos {
        add(&graph.article(*id).meta);
    }
    menu
}
