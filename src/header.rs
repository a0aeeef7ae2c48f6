//! Header-block extraction, parsing, and source backfill.
//!
//! Every content file opens with a block delimited by `---` lines:
//!
//! ```text
//! ---
//! # free-form comments are allowed
//! title: Why ravens
//! tags: birds, corvids
//! published: 2024-03-01 09:30
//! ---
//! Markdown body...
//! ```
//!
//! Inside the block each non-blank, non-comment line must be `key: value`.
//! Anything else fails the whole file: a malformed header is a fatal parse
//! error, not a warning. Unknown keys are the one lenient case, logged at
//! debug level and skipped so newer content keeps working with older
//! binaries.
//!
//! Dates are written in the author's local time (`%Y-%m-%d %H:%M`) and
//! normalized to UTC on parse.

use crate::model::Metadata;
use crate::model::NodeKind;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing '---' header delimiter")]
    MissingDelimiter,
    #[error("Header block never closed with '---'")]
    UnterminatedHeader,
    #[error("Malformed header line: {0:?}")]
    MalformedLine(String),
    #[error("Invalid date {0:?} (expected YYYY-MM-DD HH:MM)")]
    InvalidDate(String),
    #[error("Invalid part number: {0:?}")]
    InvalidPart(String),
}

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Split a file's text into its header block and markdown body.
///
/// The first non-blank line must be a `---` delimiter; the block runs to the
/// next one. Returns the raw lines between the delimiters and the body after
/// the closing one.
pub fn extract_header_block(text: &str) -> Result<(String, String), HeaderError> {
    let mut segments = text.split_inclusive('\n');
    let mut offset = 0usize;

    loop {
        let Some(seg) = segments.next() else {
            return Err(HeaderError::MissingDelimiter);
        };
        offset += seg.len();
        let line = seg.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == "---" {
            break;
        }
        return Err(HeaderError::MissingDelimiter);
    }

    let mut block = String::new();
    for seg in segments {
        offset += seg.len();
        let line = seg.trim_end_matches(['\n', '\r']);
        if line.trim() == "---" {
            // Body is sliced, not re-joined, so backfill preserves it
            // byte for byte.
            return Ok((block, text[offset..].to_string()));
        }
        block.push_str(line);
        block.push('\n');
    }
    Err(HeaderError::UnterminatedHeader)
}

/// Parse a header block into typed metadata.
///
/// Missing `uuid` generates a fresh v4 and flags the field for backfill;
/// missing dates are flagged and left `None` for the scanner's mtime
/// fallback.
pub fn parse_header(block: &str) -> Result<Metadata, HeaderError> {
    let mut meta = Metadata::new();
    let mut saw_published_date = false;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(HeaderError::MalformedLine(trimmed.to_string()));
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "uuid" => meta.uuid = value.to_string(),
            "title" => meta.title = value.to_string(),
            "abstract" => meta.abstract_text = Some(value.to_string()),
            "tags" => meta.tags = split_list(value),
            "authors" | "author" => meta.authors = split_list(value),
            "menu" => meta.menu = Some(value.to_string()),
            "template" => meta.template = Some(value.to_string()),
            "type" => meta.kind = parse_kind(value),
            "banner" => meta.banner = Some(value.to_string()),
            "banner-credits" => meta.banner_credits = Some(value.to_string()),
            "comments" => meta.comments = !is_false(value),
            "part" => {
                meta.part = Some(
                    value
                        .parse()
                        .map_err(|_| HeaderError::InvalidPart(value.to_string()))?,
                )
            }
            "sitemap-priority" => meta.sitemap_priority = Some(value.to_string()),
            "sitemap-changefreq" => meta.sitemap_changefreq = Some(value.to_string()),
            "published" => match value.to_lowercase().as_str() {
                "false" | "no" => meta.is_published = false,
                "true" | "yes" => {}
                _ => {
                    meta.published = Some(parse_date(value)?);
                    saw_published_date = true;
                }
            },
            "updated" => meta.updated = Some(parse_date(value)?),
            "expires" => meta.expires = Some(parse_date(value)?),
            other => debug!(key = other, "ignoring unknown header key"),
        }
    }

    if meta.uuid.is_empty() {
        meta.uuid = Uuid::new_v4().to_string();
        meta.missing.uuid = true;
    }
    if !saw_published_date {
        meta.missing.published = true;
    }
    if meta.updated.is_none() {
        meta.missing.updated = true;
    }
    Ok(meta)
}

/// Read a file, split it, and parse its header. Convenience for the scanner.
pub fn parse_file(path: &Path) -> Result<(Metadata, String), HeaderError> {
    let text = fs::read_to_string(path)?;
    let (block, body) = extract_header_block(&text)?;
    let meta = parse_header(&block)?;
    Ok((meta, body))
}

/// Serialize metadata back into a header block (without the `---` fences).
/// Emits every field [`parse_header`] reads, so parse∘serialize is identity
/// on the typed form.
pub fn serialize_header(meta: &Metadata) -> String {
    let mut out = String::new();
    let mut push = |key: &str, value: &str| {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    };

    push("uuid", &meta.uuid);
    if !meta.title.is_empty() {
        push("title", &meta.title);
    }
    if let Some(text) = &meta.abstract_text {
        push("abstract", text);
    }
    if !meta.tags.is_empty() {
        push("tags", &meta.tags.join(", "));
    }
    if !meta.authors.is_empty() {
        push("authors", &meta.authors.join(", "));
    }
    if let Some(menu) = &meta.menu {
        push("menu", menu);
    }
    if let Some(template) = &meta.template {
        push("template", template);
    }
    match meta.kind {
        NodeKind::Article => {}
        NodeKind::Info => push("type", "info"),
        NodeKind::Index => push("type", "index"),
    }
    if let Some(banner) = &meta.banner {
        push("banner", banner);
    }
    if let Some(credits) = &meta.banner_credits {
        push("banner-credits", credits);
    }
    if !meta.comments {
        push("comments", "false");
    }
    if let Some(part) = meta.part {
        push("part", &part.to_string());
    }
    if let Some(priority) = &meta.sitemap_priority {
        push("sitemap-priority", priority);
    }
    if let Some(freq) = &meta.sitemap_changefreq {
        push("sitemap-changefreq", freq);
    }
    if !meta.is_published {
        push("published", "false");
    } else if let Some(date) = meta.published {
        push("published", &format_date(date));
    }
    if let Some(date) = meta.updated {
        push("updated", &format_date(date));
    }
    if let Some(date) = meta.expires {
        push("expires", &format_date(date));
    }
    out
}

/// Append the fields the scanner had to invent (`uuid`, `published`,
/// `updated`) to the file's header block, in place.
///
/// The original block lines, comments included, and the body bytes are left
/// untouched, and the file's mtime is restored afterwards so the rewrite
/// never invalidates mtime-keyed caches or future date fallbacks.
pub fn backfill_header(path: &Path, meta: &Metadata) -> Result<(), HeaderError> {
    if !meta.missing.any() {
        return Ok(());
    }

    let mtime = fs::metadata(path)?.modified()?;
    let text = fs::read_to_string(path)?;
    let (block, body) = extract_header_block(&text)?;

    let mut new_block = block;
    if meta.missing.uuid {
        new_block.push_str(&format!("uuid: {}\n", meta.uuid));
    }
    if meta.missing.published
        && meta.is_published
        && let Some(date) = meta.published
    {
        new_block.push_str(&format!("published: {}\n", format_date(date)));
    }
    if meta.missing.updated
        && let Some(date) = meta.updated
    {
        new_block.push_str(&format!("updated: {}\n", format_date(date)));
    }

    let mut rewritten = String::from("---\n");
    rewritten.push_str(&new_block);
    rewritten.push_str("---\n");
    rewritten.push_str(&body);
    fs::write(path, rewritten)?;

    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(mtime)?;
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_false(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "false" | "no")
}

fn parse_kind(value: &str) -> NodeKind {
    match value.to_lowercase().as_str() {
        "info" => NodeKind::Info,
        "index" => NodeKind::Index,
        _ => NodeKind::Article,
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, HeaderError> {
    let naive = NaiveDateTime::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| HeaderError::InvalidDate(value.to_string()))?;
    // Ambiguous local instants (DST fold) resolve to the earlier mapping.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| HeaderError::InvalidDate(value.to_string()))
}

fn format_date(date: DateTime<Utc>) -> String {
    date.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
---
# editorial note
title: Why ravens
tags: birds, corvids
published: 2024-03-01 09:30
---
Body first line.

Body second line.
";

    #[test]
    fn extract_splits_block_and_body() {
        let (block, body) = extract_header_block(SAMPLE).unwrap();
        assert!(block.contains("title: Why ravens"));
        assert!(body.starts_with("Body first line."));
        assert!(!body.contains("---"));
    }

    #[test]
    fn missing_opening_delimiter_is_fatal() {
        assert!(matches!(
            extract_header_block("title: no fences\n"),
            Err(HeaderError::MissingDelimiter)
        ));
    }

    #[test]
    fn unterminated_block_is_fatal() {
        assert!(matches!(
            extract_header_block("---\ntitle: x\n"),
            Err(HeaderError::UnterminatedHeader)
        ));
    }

    #[test]
    fn parse_reads_typed_fields() {
        let (block, _) = extract_header_block(SAMPLE).unwrap();
        let meta = parse_header(&block).unwrap();

        assert_eq!(meta.title, "Why ravens");
        assert_eq!(meta.tags, vec!["birds", "corvids"]);
        assert!(meta.is_published);
        assert!(meta.published.is_some());
        assert!(!meta.missing.published);
        // No uuid in the source: one was generated and flagged.
        assert!(!meta.uuid.is_empty());
        assert!(meta.missing.uuid);
    }

    #[test]
    fn published_false_marks_draft() {
        let meta = parse_header("published: no\n").unwrap();
        assert!(!meta.is_published);
        assert!(meta.published.is_none());
    }

    #[test]
    fn author_is_alias_for_authors() {
        let meta = parse_header("author: Ada Lovelace\n").unwrap();
        assert_eq!(meta.authors, vec!["Ada Lovelace"]);
    }

    #[test]
    fn garbage_line_fails_whole_parse() {
        assert!(matches!(
            parse_header("title: ok\nthis line has no colon\n"),
            Err(HeaderError::MalformedLine(_))
        ));
    }

    #[test]
    fn unknown_key_is_ignored() {
        let meta = parse_header("title: ok\nflavor: lemon\n").unwrap();
        assert_eq!(meta.title, "ok");
    }

    #[test]
    fn bad_date_is_error() {
        assert!(matches!(
            parse_header("published: 2024-13-99 99:99\n"),
            Err(HeaderError::InvalidDate(_))
        ));
    }

    // =========================================================================
    // Round-trip
    // =========================================================================

    #[test]
    fn serialize_parse_round_trip() {
        let (block, _) = extract_header_block(SAMPLE).unwrap();
        let mut meta = parse_header(&block).unwrap();
        meta.updated = meta.published;
        meta.missing = Default::default();

        let reparsed = parse_header(&serialize_header(&meta)).unwrap();
        assert_eq!(reparsed.uuid, meta.uuid);
        assert_eq!(reparsed.title, meta.title);
        assert_eq!(reparsed.tags, meta.tags);
        assert_eq!(reparsed.published, meta.published);
        assert_eq!(reparsed.updated, meta.updated);
    }

    #[test]
    fn draft_round_trips_as_draft() {
        let mut meta = Metadata::new();
        meta.uuid = "fixed".to_string();
        meta.title = "Draft".to_string();
        meta.is_published = false;

        let reparsed = parse_header(&serialize_header(&meta)).unwrap();
        assert!(!reparsed.is_published);
    }

    // =========================================================================
    // Backfill
    // =========================================================================

    #[test]
    fn backfill_appends_missing_fields_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "---\ntitle: Kept\n---\nBody stays.\n").unwrap();

        let (block, _) = extract_header_block(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let mut meta = parse_header(&block).unwrap();
        meta.published = Some(Utc::now());
        meta.updated = meta.published;

        backfill_header(&path, &meta).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("title: Kept"));
        assert!(text.contains(&format!("uuid: {}", meta.uuid)));
        assert!(text.contains("published: "));
        assert!(text.ends_with("Body stays.\n"));
    }

    #[test]
    fn backfill_preserves_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "---\ntitle: T\n---\nbody\n").unwrap();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let mut meta = Metadata::new();
        meta.uuid = "u".to_string();
        meta.missing.uuid = true;
        backfill_header(&path, &meta).unwrap();

        let after = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn backfill_noop_when_nothing_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.md");
        std::fs::write(&path, "---\ntitle: T\n---\nbody\n").unwrap();

        let meta = Metadata::new();
        backfill_header(&path, &meta).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "---\ntitle: T\n---\nbody\n"
        );
    }
}
