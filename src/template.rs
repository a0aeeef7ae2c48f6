//! `{{name}}` macro templates.
//!
//! This is deliberately not a templating language: no conditionals, no
//! loops, no recursion. [`expand`] makes a single pass, replaces each
//! `{{name}}` with its value, and deletes macros no value was supplied for.
//! Conditional sections are assembled by callers: an `if-banner` variable is
//! either the expanded `if-banner` sub-template or the empty string.
//!
//! Templates are plain HTML files in `<source>/templates/`; any name not
//! found there falls back to a default compiled into the binary.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub type Vars = HashMap<String, String>;

/// Template names with compiled-in defaults.
const EMBEDDED: &[(&str, &str)] = &[
    ("frontpage", include_str!("../templates/frontpage.html")),
    ("article", include_str!("../templates/article.html")),
    ("series", include_str!("../templates/series.html")),
    ("tags", include_str!("../templates/tags.html")),
    ("summary", include_str!("../templates/summary.html")),
    ("if-banner", include_str!("../templates/if-banner.html")),
    ("if-authors", include_str!("../templates/if-authors.html")),
    ("if-nav", include_str!("../templates/if-nav.html")),
    ("if-pager", include_str!("../templates/if-pager.html")),
];

/// All templates for one run, site overrides layered over the defaults.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<String, String>,
}

impl TemplateSet {
    /// Load `<source>/templates/*.html`, falling back to embedded defaults
    /// for anything the site does not override.
    pub fn load(source: &Path) -> std::io::Result<Self> {
        let mut templates: HashMap<String, String> = EMBEDDED
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect();

        let dir = source.join("templates");
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                let is_html = path
                    .extension()
                    .map(|e| e.eq_ignore_ascii_case("html"))
                    .unwrap_or(false);
                if !is_html {
                    continue;
                }
                if let Some(stem) = path.file_stem() {
                    templates.insert(
                        stem.to_string_lossy().to_string(),
                        fs::read_to_string(&path)?,
                    );
                }
            }
        }
        Ok(Self { templates })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    /// Expand a sub-template into a caller-assembled conditional variable.
    pub fn expand_partial(&self, name: &str, vars: &Vars) -> String {
        self.get(name).map(|t| expand(t, vars)).unwrap_or_default()
    }
}

/// Replace every `{{name}}` macro in one pass.
///
/// A macro name is word characters and hyphens. Known names substitute
/// their literal value (values are never re-scanned); unknown names expand
/// to nothing. Text that merely looks like a macro (`{{ not a name }}`) is
/// left alone.
pub fn expand(template: &str, vars: &Vars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) if is_macro_name(&after[..end]) => {
                if let Some(value) = vars.get(&after[..end]) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            _ => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_macro_name(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
