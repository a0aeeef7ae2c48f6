//! Scaled image renditions.
//!
//! `prepare_image("images/photo.jpg", &[1920, 800])` produces
//! `images/_scale_1920/photo.jpg` and `images/_scale_800/photo.jpg` next to
//! the source, reusing any rendition that is already newer than it. The
//! actual pixel work sits behind [`ImageCodec`] so the pipeline is testable
//! without decoding anything.

use super::{AssetError, is_fresh};
use ::image::ImageReader;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::FilterType;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Width and height in pixels.
pub type Dimensions = (u32, u32);

pub trait ImageCodec: Sync {
    /// Read dimensions without decoding pixel data.
    fn identify(&self, path: &Path) -> Result<Dimensions, AssetError>;

    /// Scale `source` to `width` (aspect preserved) and encode to `output`.
    fn scale(&self, source: &Path, output: &Path, width: u32, quality: u8)
    -> Result<(), AssetError>;
}

/// Production codec on top of the `image` crate.
pub struct ImageRsCodec;

impl ImageCodec for ImageRsCodec {
    fn identify(&self, path: &Path) -> Result<Dimensions, AssetError> {
        Ok(ImageReader::open(path)?.into_dimensions()?)
    }

    fn scale(
        &self,
        source: &Path,
        output: &Path,
        width: u32,
        quality: u8,
    ) -> Result<(), AssetError> {
        let img = ImageReader::open(source)?.decode()?;
        let scaled = img.resize(width, u32::MAX, FilterType::Lanczos3);

        let is_jpeg = output
            .extension()
            .map(|e| {
                let e = e.to_string_lossy().to_lowercase();
                e == "jpg" || e == "jpeg"
            })
            .unwrap_or(false);
        if is_jpeg {
            let file = fs::File::create(output)?;
            let encoder = JpegEncoder::new_with_quality(file, quality);
            scaled.to_rgb8().write_with_encoder(encoder)?;
        } else {
            scaled.save(output)?;
        }
        Ok(())
    }
}

/// One scaled output (or the unscaled original when nothing narrower would
/// help).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRendition {
    /// Path relative to the source root, forward slashes, usable as a URL.
    pub rel: String,
    pub path: PathBuf,
    pub width: u32,
}

/// Build the `srcset` attribute value for a rendition list.
pub fn srcset(renditions: &[ImageRendition]) -> String {
    renditions
        .iter()
        .map(|r| format!("{} {}w", r.rel, r.width))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ensure scaled renditions of `rel` (a root-relative path like
/// `images/photo.jpg`) exist for every applicable width, largest first.
///
/// Only widths strictly smaller than the source's native width get a
/// rendition; if that drops all of them the original is returned once,
/// unscaled. A rendition is re-encoded only when missing or older than the
/// source.
pub fn prepare_image(
    codec: &dyn ImageCodec,
    root: &Path,
    rel: &str,
    widths: &[u32],
    quality: u8,
) -> Result<Vec<ImageRendition>, AssetError> {
    let source = root.join(rel);
    if !source.is_file() {
        return Err(AssetError::MissingSource(source));
    }
    let source_mtime = fs::metadata(&source)?.modified()?;
    let (native_width, _) = codec.identify(&source)?;

    let (rel_dir, name) = match rel.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", rel),
    };

    let mut widths: Vec<u32> = widths.iter().copied().filter(|w| *w < native_width).collect();
    widths.sort_unstable_by(|a, b| b.cmp(a));
    widths.dedup();

    if widths.is_empty() {
        debug!(rel, native_width, "image narrower than every target width");
        return Ok(vec![ImageRendition {
            rel: rel.to_string(),
            path: source,
            width: native_width,
        }]);
    }

    let mut renditions = Vec::with_capacity(widths.len());
    for width in widths {
        let scaled_rel = if rel_dir.is_empty() {
            format!("_scale_{width}/{name}")
        } else {
            format!("{rel_dir}/_scale_{width}/{name}")
        };
        let output = root.join(&scaled_rel);

        if !is_fresh(&output, source_mtime) {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            codec.scale(&source, &output, width, quality)?;
        }
        renditions.push(ImageRendition {
            rel: scaled_rel,
            path: output,
            width,
        });
    }
    Ok(renditions)
}
