//! Staging tree and destination commit.
//!
//! Everything renders into a `TempDir`; only after the whole run succeeds
//! is the destination's content deleted and the staging tree copied over.
//! A crash before commit leaves the destination untouched. A crash in the
//! middle of the commit itself can leave it empty — the copy is not
//! atomic, and deliberately not defended beyond ordering.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Source-tree directories copied into every artifact verbatim (derived
/// `_scale_`/`_mp4`/... subtrees included, since they live inside them).
pub const STATIC_DIRS: &[&str] = &["images", "video", "artifacts", "files"];

/// The staging tree for one run.
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    pub fn new() -> Result<Self, WriteError> {
        let dir = TempDir::with_prefix("stanza-staging-")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persist the staging tree instead of deleting it on drop; returns
    /// where it lives.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }
}

/// Write one rendered page under `root`, creating parent directories.
pub fn write_page(root: &Path, rel: &str, text: &str) -> Result<(), WriteError> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

/// Copy the static source directories into the staging tree.
pub fn copy_static_dirs(source: &Path, staging: &Path) -> Result<(), WriteError> {
    for name in STATIC_DIRS {
        let dir = source.join(name);
        if dir.is_dir() {
            copy_tree(&dir, &staging.join(name))?;
        }
    }
    Ok(())
}

/// Replace the destination's contents with the staging tree.
pub fn commit(staging: &Path, destination: &Path) -> Result<(), WriteError> {
    fs::create_dir_all(destination)?;
    for entry in fs::read_dir(destination)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    copy_tree(staging, destination)?;
    debug!(destination = %destination.display(), "artifact committed");
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), WriteError> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_page_creates_parents() {
        let staging = Staging::new().unwrap();
        write_page(staging.path(), "guide/part1.html", "<html>").unwrap();
        assert!(staging.path().join("guide/part1.html").is_file());
    }

    #[test]
    fn static_dirs_copied_including_derived() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("images/_scale_800")).unwrap();
        fs::write(src.path().join("images/photo.jpg"), "o").unwrap();
        fs::write(src.path().join("images/_scale_800/photo.jpg"), "s").unwrap();
        fs::create_dir_all(src.path().join("articles")).unwrap();
        fs::write(src.path().join("articles/a.md"), "not static").unwrap();

        let staging = Staging::new().unwrap();
        copy_static_dirs(src.path(), staging.path()).unwrap();

        assert!(staging.path().join("images/_scale_800/photo.jpg").is_file());
        // Content sources are not part of the artifact.
        assert!(!staging.path().join("articles").exists());
    }

    #[test]
    fn commit_replaces_destination_contents() {
        let staging = Staging::new().unwrap();
        write_page(staging.path(), "index.html", "new").unwrap();

        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("stale.html"), "old").unwrap();
        fs::create_dir_all(dest.path().join("stale_dir")).unwrap();

        commit(staging.path(), dest.path()).unwrap();

        assert!(dest.path().join("index.html").is_file());
        assert!(!dest.path().join("stale.html").exists());
        assert!(!dest.path().join("stale_dir").exists());
    }

    #[test]
    fn commit_creates_missing_destination() {
        let staging = Staging::new().unwrap();
        write_page(staging.path(), "index.html", "x").unwrap();

        let parent = TempDir::new().unwrap();
        let dest = parent.path().join("out");
        commit(staging.path(), &dest).unwrap();
        assert!(dest.join("index.html").is_file());
    }

    #[test]
    fn keep_persists_the_tree() {
        let staging = Staging::new().unwrap();
        write_page(staging.path(), "index.html", "x").unwrap();

        let kept = staging.keep();
        assert!(kept.join("index.html").is_file());
        fs::remove_dir_all(kept).unwrap();
    }
}
