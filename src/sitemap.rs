//! `sitemap.xml` and `robots.txt`.
//!
//! Entries are keyed by absolute URL, so a page mapped twice (a cover that
//! is also a series index, say) appears once. Insertion order does not
//! matter; output is sorted by URL.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub url: String,
    pub lastmod: Option<DateTime<Utc>>,
    /// `sitemap-priority` header value, passed through verbatim.
    pub priority: Option<String>,
    pub changefreq: Option<String>,
}

#[derive(Debug, Default)]
pub struct Sitemap {
    entries: BTreeMap<String, SitemapEntry>,
}

impl Sitemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a URL already present keeps its first entry.
    pub fn insert(&mut self, entry: SitemapEntry) {
        self.entries.entry(entry.url.clone()).or_insert(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for entry in self.entries.values() {
            out.push_str("  <url>\n");
            out.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.url)));
            if let Some(lastmod) = entry.lastmod {
                out.push_str(&format!(
                    "    <lastmod>{}</lastmod>\n",
                    lastmod.format("%Y-%m-%d")
                ));
            }
            if let Some(freq) = &entry.changefreq {
                out.push_str(&format!(
                    "    <changefreq>{}</changefreq>\n",
                    escape_xml(freq)
                ));
            }
            if let Some(priority) = &entry.priority {
                out.push_str(&format!(
                    "    <priority>{}</priority>\n",
                    escape_xml(priority)
                ));
            }
            out.push_str("  </url>\n");
        }
        out.push_str("</urlset>\n");
        out
    }
}

/// `robots.txt` pointing crawlers at the sitemap.
pub fn robots_txt(base_url: &str) -> String {
    format!("User-agent: *\nAllow: /\n\nSitemap: {base_url}/sitemap.xml\n")
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
