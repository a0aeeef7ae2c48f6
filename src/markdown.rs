//! Markdown rendering with media-aware rewriting.
//!
//! Bodies go through pulldown-cmark with two interceptions:
//!
//! - Image references into the content tree (`![alt](images/p.jpg)`,
//!   `![alt](video/intro.mp4)`) are routed through the derived-asset cache
//!   and come out as responsive `<img srcset>` / multi-source `<video>`
//!   markup. Other image destinations pass through untouched.
//! - Fenced code blocks are piped through the configured external
//!   highlighter, when there is one. A missing or failing highlighter
//!   degrades to an escaped `<pre><code>` with a warning; it never fails
//!   the page.

use crate::assets::image::{ImageCodec, prepare_image, srcset};
use crate::assets::video::Transcoder;
use crate::assets::ToolQueue;
use crate::config::SiteConfig;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use std::path::Path;
use std::process::Command;
use tracing::warn;

pub struct Renderer<'a> {
    pub root: &'a Path,
    pub codec: &'a dyn ImageCodec,
    pub queue: &'a ToolQueue,
    pub config: &'a SiteConfig,
}

impl Renderer<'_> {
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_FOOTNOTES);
        let mut parser = Parser::new_ext(markdown, options);

        let mut events: Vec<Event> = Vec::new();
        while let Some(event) = parser.next() {
            match event {
                Event::Start(Tag::Image { dest_url, .. }) => {
                    let mut alt = String::new();
                    for inner in parser.by_ref() {
                        match inner {
                            Event::End(TagEnd::Image) => break,
                            Event::Text(t) | Event::Code(t) => alt.push_str(&t),
                            _ => {}
                        }
                    }
                    events.push(Event::Html(self.media_html(&dest_url, &alt).into()));
                }
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                    let mut code = String::new();
                    for inner in parser.by_ref() {
                        match inner {
                            Event::End(TagEnd::CodeBlock) => break,
                            Event::Text(t) => code.push_str(&t),
                            _ => {}
                        }
                    }
                    events.push(Event::Html(self.code_html(&lang, &code).into()));
                }
                other => events.push(other),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn media_html(&self, dest: &str, alt: &str) -> String {
        if dest.starts_with("images/") {
            self.image_html(dest, alt)
        } else if dest.starts_with("video/") {
            self.video_html(dest)
        } else {
            format!(
                r#"<img src="{}" alt="{}">"#,
                escape_attr(dest),
                escape_attr(alt)
            )
        }
    }

    /// Responsive `<img>` for a content-tree image. Degrades to a plain tag
    /// on any cache failure.
    pub fn image_html(&self, rel: &str, alt: &str) -> String {
        match prepare_image(
            self.codec,
            self.root,
            rel,
            &self.config.banner_widths,
            self.config.image_quality,
        ) {
            Ok(renditions) => {
                // Smallest rendition as the no-srcset fallback.
                let fallback = renditions
                    .last()
                    .map(|r| r.rel.as_str())
                    .unwrap_or(rel);
                format!(
                    r#"<img src="{}" srcset="{}" sizes="100vw" alt="{}">"#,
                    escape_attr(fallback),
                    escape_attr(&srcset(&renditions)),
                    escape_attr(alt)
                )
            }
            Err(e) => {
                warn!(rel, error = %e, "image scaling failed, using original");
                format!(
                    r#"<img src="{}" alt="{}">"#,
                    escape_attr(rel),
                    escape_attr(alt)
                )
            }
        }
    }

    /// Multi-source `<video>` block for a content-tree video. Degrades to a
    /// bare player on the original file when transcoding is unavailable.
    pub fn video_html(&self, rel: &str) -> String {
        let transcoder = Transcoder::new(self.queue, &self.config.video);
        match transcoder.prepare_video(self.root, rel) {
            Ok(set) if !set.renditions.is_empty() => {
                let mut out = format!(
                    r#"<video controls preload="metadata" poster="{}" width="{}" height="{}">"#,
                    escape_attr(&set.poster_rel),
                    set.native_width,
                    set.native_height
                );
                for r in &set.renditions {
                    if r.media.is_empty() {
                        out.push_str(&format!(
                            r#"<source src="{}" type="{}">"#,
                            escape_attr(&r.rel),
                            r.mime
                        ));
                    } else {
                        out.push_str(&format!(
                            r#"<source src="{}" type="{}" media="{}">"#,
                            escape_attr(&r.rel),
                            r.mime,
                            r.media
                        ));
                    }
                }
                out.push_str("</video>");
                out
            }
            Ok(_) => format!(r#"<video controls src="{}"></video>"#, escape_attr(rel)),
            Err(e) => {
                warn!(rel, error = %e, "video transcode failed, linking original");
                format!(r#"<video controls src="{}"></video>"#, escape_attr(rel))
            }
        }
    }

    fn code_html(&self, lang: &str, code: &str) -> String {
        if let Some(command) = &self.config.highlighter
            && !lang.is_empty()
        {
            match self.run_highlighter(command, lang, code) {
                Ok(html) => return html,
                Err(e) => {
                    warn!(lang, error = %e, "highlighter failed, rendering plain");
                }
            }
        }
        if lang.is_empty() {
            format!("<pre><code>{}</code></pre>\n", escape_text(code))
        } else {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                escape_attr(lang),
                escape_text(code)
            )
        }
    }

    fn run_highlighter(
        &self,
        command: &str,
        lang: &str,
        code: &str,
    ) -> Result<String, crate::assets::AssetError> {
        let expanded = command.replace("{}", lang);
        let mut parts = expanded.split_whitespace();
        let program = parts.next().unwrap_or(command);
        let mut cmd = Command::new(program);
        cmd.args(parts);
        let output = self
            .queue
            .run_filter(program, &mut cmd, code.as_bytes())?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::image::tests::MockCodec;
    use std::fs;
    use tempfile::TempDir;

    fn renderer<'a>(
        root: &'a Path,
        codec: &'a MockCodec,
        queue: &'a ToolQueue,
        config: &'a SiteConfig,
    ) -> Renderer<'a> {
        Renderer {
            root,
            codec,
            queue,
            config,
        }
    }

    #[test]
    fn plain_markdown_renders() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        let config = SiteConfig::default();
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("# Title\n\nSome *emphasis*.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<em>emphasis</em>"));
    }

    #[test]
    fn content_image_becomes_srcset() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("images")).unwrap();
        fs::write(tmp.path().join("images/photo.jpg"), b"x").unwrap();

        let codec = MockCodec::new((4000, 3000));
        let queue = ToolQueue::new();
        let config = SiteConfig::default();
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("![A raven](images/photo.jpg)");
        assert!(html.contains("srcset="));
        assert!(html.contains("images/_scale_1920/photo.jpg 1920w"));
        assert!(html.contains(r#"alt="A raven""#));
    }

    #[test]
    fn external_image_passes_through() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        let config = SiteConfig::default();
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("![ext](https://elsewhere.example/p.png)");
        assert!(html.contains(r#"src="https://elsewhere.example/p.png""#));
        assert!(!html.contains("srcset"));
    }

    #[test]
    fn missing_image_degrades_to_plain_tag() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        let config = SiteConfig::default();
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("![gone](images/gone.jpg)");
        assert!(html.contains(r#"<img src="images/gone.jpg" alt="gone">"#));
    }

    #[test]
    fn fenced_code_escaped_without_highlighter() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        let config = SiteConfig::default();
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("```rust\nlet x = a < b;\n```");
        assert!(html.contains(r#"class="language-rust""#));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn failing_highlighter_degrades_to_plain() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        let config = SiteConfig {
            highlighter: Some("definitely-not-installed-xyz {}".to_string()),
            ..Default::default()
        };
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("```rust\nfn main() {}\n```");
        assert!(html.contains("<pre><code"));
        assert!(html.contains("fn main()"));
    }

    #[test]
    fn working_highlighter_output_used_verbatim() {
        let tmp = TempDir::new().unwrap();
        let codec = MockCodec::new((100, 100));
        let queue = ToolQueue::new();
        // `cat` is a perfectly good identity highlighter.
        let config = SiteConfig {
            highlighter: Some("cat".to_string()),
            ..Default::default()
        };
        let r = renderer(tmp.path(), &codec, &queue, &config);

        let html = r.render("```rust\nraw > output\n```");
        assert!(html.contains("raw > output"));
    }
}
