//! Site menu assembled from `menu:` header declarations and config entries.
//!
//! A declaration is a slash-separated path (`"Guides/Networking"`); each
//! segment becomes a level in the tree and the declaring node's URL lands on
//! the leaf. Two declarations of the same leaf overwrite last-write-wins,
//! with a warning, so a stray duplicate never aborts a build.

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuNode {
    pub name: String,
    /// Empty for intermediate levels nothing links to.
    pub url: String,
    pub children: Vec<MenuNode>,
}

#[derive(Debug, Clone, Default)]
pub struct Menu {
    pub roots: Vec<MenuNode>,
}

impl Menu {
    /// Fold one declaration into the tree.
    pub fn insert(&mut self, path: &str, url: &str) {
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return;
        }
        insert_at(&mut self.roots, &segments, path, url);
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Find the leaf node for a declaration path, if present.
    pub fn find(&self, path: &str) -> Option<&MenuNode> {
        let mut level = &self.roots;
        let mut found = None;
        for segment in path.split('/').map(str::trim).filter(|s| !s.is_empty()) {
            let node = level.iter().find(|n| n.name == segment)?;
            found = Some(node);
            level = &node.children;
        }
        found
    }
}

fn insert_at(level: &mut Vec<MenuNode>, segments: &[&str], full_path: &str, url: &str) {
    let name = segments[0];
    let position = level.iter().position(|n| n.name == name);
    let node = match position {
        Some(i) => &mut level[i],
        None => {
            level.push(MenuNode {
                name: name.to_string(),
                url: String::new(),
                children: Vec::new(),
            });
            let last = level.len() - 1;
            &mut level[last]
        }
    };

    if segments.len() == 1 {
        if !node.url.is_empty() && node.url != url {
            warn!(path = full_path, old = %node.url, new = url, "menu entry overwritten");
        }
        node.url = url.to_string();
    } else {
        insert_at(&mut node.children, &segments[1..], full_path, url);
    }
}
