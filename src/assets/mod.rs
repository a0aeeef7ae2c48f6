//! Derived binary assets: scaled images, video renditions, poster frames.
//!
//! Derived files live next to their sources inside the content tree
//! (`images/_scale_800/photo.jpg`, `video/_mp4/intro_p720.mp4`) so they
//! survive between runs. The cache key is the pair (path, source mtime): a
//! derived file is reused whenever it exists and is at least as new as its
//! source. Touching a source without changing its bytes re-encodes — an
//! accepted false negative, the check stays a pair of stat calls.
//!
//! External tools (ffmpeg, ffprobe) run through a single-slot [`ToolQueue`]
//! so at most one heavyweight subprocess is alive regardless of how wide
//! the render pool is.

pub mod image;
pub mod video;

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image codec error: {0}")]
    Codec(#[from] ::image::ImageError),
    #[error("Referenced asset does not exist: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("{tool} failed: {detail}")]
    Tool { tool: String, detail: String },
}

/// Serializes external subprocess work across the whole run.
#[derive(Debug, Default)]
pub struct ToolQueue {
    slot: Mutex<()>,
}

impl ToolQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a command while holding the queue slot. Non-zero exit becomes
    /// [`AssetError::Tool`] carrying the tail of stderr.
    pub fn run(&self, tool: &str, command: &mut Command) -> Result<Output, AssetError> {
        let _slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let output = command.output().map_err(|e| AssetError::Tool {
            tool: tool.to_string(),
            detail: e.to_string(),
        })?;
        check_status(tool, output)
    }

    /// Like [`ToolQueue::run`], but feeds `input` to the child's stdin.
    /// Used for filter-style tools such as syntax highlighters.
    pub fn run_filter(
        &self,
        tool: &str,
        command: &mut Command,
        input: &[u8],
    ) -> Result<Output, AssetError> {
        let _slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AssetError::Tool {
                tool: tool.to_string(),
                detail: e.to_string(),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input)?;
        }
        let output = child.wait_with_output()?;
        check_status(tool, output)
    }
}

fn check_status(tool: &str, output: Output) -> Result<Output, AssetError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AssetError::Tool {
            tool: tool.to_string(),
            detail: format!("exit {}: {}", output.status, tail),
        });
    }
    Ok(output)
}

/// True when `derived` exists and is at least as new as `source_mtime`.
pub(crate) fn is_fresh(derived: &std::path::Path, source_mtime: std::time::SystemTime) -> bool {
    std::fs::metadata(derived)
        .and_then(|m| m.modified())
        .map(|m| m >= source_mtime)
        .unwrap_or(false)
}
