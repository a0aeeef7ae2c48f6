//! RSS 2.0 feed (`index.rss`).
//!
//! Entries are collected during rendering and cut down to the newest N by
//! publish date once the render barrier has passed. Info pages and series
//! covers never become feed items; series members and standalone articles
//! do.

use crate::config::SiteConfig;
use crate::sitemap::escape_xml;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    /// Absolute URL.
    pub url: String,
    pub uuid: String,
    pub description: String,
    pub published: DateTime<Utc>,
}

/// Render the feed document from collected entries.
///
/// Entries arrive in whatever order the render tasks finished; this sorts
/// newest-first and applies the configured item cap.
pub fn to_rss(config: &SiteConfig, mut entries: Vec<FeedEntry>) -> String {
    entries.sort_by(|a, b| b.published.cmp(&a.published));
    entries.truncate(config.rss.items);

    let base = config.base_url();
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n");
    out.push_str("<channel>\n");
    out.push_str(&format!("<title>{}</title>\n", escape_xml(&config.name)));
    out.push_str(&format!("<link>{}/</link>\n", escape_xml(base)));
    out.push_str(&format!(
        "<description>{}</description>\n",
        escape_xml(&config.name)
    ));
    out.push_str(&format!("<language>{}</language>\n", config.language));
    out.push_str(&format!(
        "<atom:link href=\"{}/index.rss\" rel=\"self\" type=\"application/rss+xml\"/>\n",
        escape_xml(base)
    ));

    for entry in &entries {
        out.push_str("<item>\n");
        out.push_str(&format!("<title>{}</title>\n", escape_xml(&entry.title)));
        out.push_str(&format!("<link>{}</link>\n", escape_xml(&entry.url)));
        out.push_str(&format!(
            "<guid isPermaLink=\"false\">{}</guid>\n",
            escape_xml(&entry.uuid)
        ));
        out.push_str(&format!(
            "<description>{}</description>\n",
            escape_xml(&entry.description)
        ));
        out.push_str(&format!(
            "<pubDate>{}</pubDate>\n",
            entry.published.to_rfc2822()
        ));
        out.push_str("</item>\n");
    }

    out.push_str("</channel>\n</rss>\n");
    out
}
