//! Video renditions and poster frames via ffmpeg.
//!
//! For `video/intro.mp4` with a 1080-tier ceiling and mp4+webm configured:
//!
//! ```text
//! video/_poster_/intro.jpg
//! video/_mp4/intro_p1080.mp4   video/_webm/intro_p1080.webm
//! video/_mp4/intro_p720.mp4    video/_webm/intro_p720.webm
//! video/_mp4/intro_p480.mp4    ...
//! video/_mp4/intro_p360.mp4
//! ```
//!
//! Rendition planning is pure (and unit tested); the ffmpeg/ffprobe calls
//! go through the shared [`ToolQueue`] so only one transcode runs at a
//! time. A rendition newer than its source is never rebuilt.

use super::{AssetError, ToolQueue, is_fresh};
use crate::config::VideoConfig;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Standard tier heights, tallest first.
pub const RENDITION_LADDER: &[u32] = &[2160, 1440, 1080, 720, 480, 360];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRendition {
    /// Root-relative output path, forward slashes.
    pub rel: String,
    pub width: u32,
    pub height: u32,
    pub mime: String,
    /// `media=` attribute value; empty when this is the only tier.
    pub media: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSet {
    pub poster_rel: String,
    /// Declaration order: per format (config order), tallest tier first.
    pub renditions: Vec<VideoRendition>,
    pub native_width: u32,
    pub native_height: u32,
}

/// Tier heights and derived widths for one source, tallest first. Widths
/// are rounded to even numbers, which the h264 encoder requires.
pub fn plan_renditions(native_width: u32, native_height: u32, max_rendition: u32) -> Vec<(u32, u32)> {
    let ceiling = max_rendition.min(native_height);
    RENDITION_LADDER
        .iter()
        .copied()
        .filter(|h| *h <= ceiling)
        .map(|h| {
            let w = (native_width as u64 * h as u64 / native_height as u64) as u32;
            (w & !1, h)
        })
        .collect()
}

/// Non-overlapping viewport ranges for a tier list sorted tallest first.
///
/// The narrowest tier gets `(max-width: ...)`, the widest `(min-width:
/// ...)`, everything between a closed range; a browser picks exactly one
/// source. A single tier gets no constraint at all.
pub fn media_queries(widths_desc: &[u32]) -> Vec<String> {
    if widths_desc.len() <= 1 {
        return vec![String::new(); widths_desc.len()];
    }
    let mut queries = Vec::with_capacity(widths_desc.len());
    for (i, w) in widths_desc.iter().enumerate() {
        let query = if i == 0 {
            // Widest tier: everything above the next one down.
            format!("(min-width: {}px)", widths_desc[1] + 1)
        } else if i == widths_desc.len() - 1 {
            format!("(max-width: {w}px)")
        } else {
            format!(
                "(min-width: {}px) and (max-width: {}px)",
                widths_desc[i + 1] + 1,
                w
            )
        };
        queries.push(query);
    }
    queries
}

fn mime_for(format: &str) -> String {
    match format {
        "mp4" => "video/mp4".to_string(),
        "webm" => "video/webm".to_string(),
        "ogv" => "video/ogg".to_string(),
        other => format!("video/{other}"),
    }
}

fn codec_args(format: &str) -> &'static [&'static str] {
    match format {
        "webm" => &["-c:v", "libvpx-vp9", "-b:v", "0", "-crf", "33", "-c:a", "libopus"],
        "ogv" => &["-c:v", "libtheora", "-q:v", "6", "-c:a", "libvorbis"],
        // mp4 and anything unrecognized: h264 is the safe default
        _ => &["-c:v", "libx264", "-crf", "23", "-preset", "medium", "-c:a", "aac"],
    }
}

/// Transcodes one source into its rendition set, caching by mtime.
pub struct Transcoder<'a> {
    pub queue: &'a ToolQueue,
    pub config: &'a VideoConfig,
}

impl<'a> Transcoder<'a> {
    pub fn new(queue: &'a ToolQueue, config: &'a VideoConfig) -> Self {
        Self { queue, config }
    }

    /// Probe native dimensions with ffprobe.
    pub fn probe(&self, source: &Path) -> Result<(u32, u32), AssetError> {
        let output = self.queue.run(
            "ffprobe",
            Command::new("ffprobe").args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ])
            .arg(source),
        )?;
        let text = String::from_utf8_lossy(&output.stdout);
        let line = text.trim();
        let parsed = line
            .split_once('x')
            .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
        parsed.ok_or_else(|| AssetError::Tool {
            tool: "ffprobe".to_string(),
            detail: format!("unparseable dimensions: {line:?}"),
        })
    }

    /// Ensure poster and every planned rendition of `rel` (root-relative,
    /// e.g. `video/intro.mp4`) exist and are current.
    pub fn prepare_video(&self, root: &Path, rel: &str) -> Result<VideoSet, AssetError> {
        let source = root.join(rel);
        if !source.is_file() {
            return Err(AssetError::MissingSource(source));
        }
        let source_mtime = fs::metadata(&source)?.modified()?;
        let (native_width, native_height) = self.probe(&source)?;

        let (rel_dir, name) = match rel.rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", rel),
        };
        let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
        let join_rel = |tail: String| {
            if rel_dir.is_empty() {
                tail
            } else {
                format!("{rel_dir}/{tail}")
            }
        };

        let poster_rel = join_rel(format!("_poster_/{stem}.jpg"));
        let poster_path = root.join(&poster_rel);
        if !is_fresh(&poster_path, source_mtime) {
            if let Some(parent) = poster_path.parent() {
                fs::create_dir_all(parent)?;
            }
            self.queue.run(
                "ffmpeg",
                Command::new("ffmpeg")
                    .args(["-y", "-loglevel", "error", "-ss"])
                    .arg(self.config.poster_second.to_string())
                    .arg("-i")
                    .arg(&source)
                    .args(["-frames:v", "1"])
                    .arg(&poster_path),
            )?;
            debug!(rel = %poster_rel, "poster frame extracted");
        }

        let plan = plan_renditions(native_width, native_height, self.config.max_rendition);
        let widths: Vec<u32> = plan.iter().map(|(w, _)| *w).collect();
        let queries = media_queries(&widths);

        let mut renditions = Vec::new();
        for format in &self.config.formats {
            for ((width, height), media) in plan.iter().zip(queries.iter()) {
                let out_rel = join_rel(format!("_{format}/{stem}_p{height}.{format}"));
                let out_path = root.join(&out_rel);
                if !is_fresh(&out_path, source_mtime) {
                    if let Some(parent) = out_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    info!(rel = %out_rel, "transcoding");
                    self.queue.run(
                        "ffmpeg",
                        Command::new("ffmpeg")
                            .args(["-y", "-loglevel", "error", "-i"])
                            .arg(&source)
                            .arg("-vf")
                            .arg(format!("scale={width}:{height}"))
                            .args(codec_args(format))
                            .arg(&out_path),
                    )?;
                }
                renditions.push(VideoRendition {
                    rel: out_rel,
                    width: *width,
                    height: *height,
                    mime: mime_for(format),
                    media: media.clone(),
                });
            }
        }

        Ok(VideoSet {
            poster_rel,
            renditions,
            native_width,
            native_height,
        })
    }
}
