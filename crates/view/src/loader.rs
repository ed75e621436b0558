use std::{collections::HashMap, path::PathBuf};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use shared::domain::ViewHandle;

use crate::tree::{DisplayTree, ElementSpec};

/// Class carried by every view root.
pub const VIEW_CLASS: &str = "shell-view";

#[async_trait]
pub trait ViewLoader: Send + Sync {
    async fn load_fragment(&self, view: &str) -> anyhow::Result<ElementSpec>;
}

/// In-memory fragments, keyed by view name.
#[derive(Debug, Clone, Default)]
pub struct StaticViewLoader {
    fragments: HashMap<String, ElementSpec>,
}

impl StaticViewLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fragment(mut self, view: impl Into<String>, fragment: ElementSpec) -> Self {
        self.fragments.insert(view.into(), fragment);
        self
    }

    pub fn insert(&mut self, view: impl Into<String>, fragment: ElementSpec) {
        self.fragments.insert(view.into(), fragment);
    }
}

#[async_trait]
impl ViewLoader for StaticViewLoader {
    async fn load_fragment(&self, view: &str) -> anyhow::Result<ElementSpec> {
        self.fragments
            .get(view)
            .cloned()
            .ok_or_else(|| anyhow!("no fragment registered for view '{view}'"))
    }
}

/// Reads `<root>/<view>.json` fragment files.
#[derive(Debug, Clone)]
pub struct DirectoryViewLoader {
    root: PathBuf,
}

impl DirectoryViewLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, view: &str) -> PathBuf {
        self.root.join(format!("{view}.json"))
    }
}

#[async_trait]
impl ViewLoader for DirectoryViewLoader {
    async fn load_fragment(&self, view: &str) -> anyhow::Result<ElementSpec> {
        let path = self.path_for(view);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read view fragment '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid view fragment '{}'", path.display()))
    }
}

fn view_name(view: &str) -> &str {
    view.strip_suffix(".html").unwrap_or(view)
}

/// Wraps a fetched fragment in a fresh, detached view root. The root carries
/// [`VIEW_CLASS`] and a class derived from the view name, so
/// `settings/account` becomes `settings-account`.
pub fn mount_fragment(tree: &mut DisplayTree, view: &str, fragment: &ElementSpec) -> ViewHandle {
    let name = view_name(view);
    let root = tree.create("div");
    tree.add_class(root, VIEW_CLASS);
    tree.add_class(root, name.replace('/', "-"));
    let content = tree.materialize(fragment);
    tree.append_child(root, content);
    root
}

pub async fn load_view(
    loader: &dyn ViewLoader,
    tree: &mut DisplayTree,
    view: &str,
) -> anyhow::Result<ViewHandle> {
    let name = view_name(view);
    let fragment = loader.load_fragment(name).await?;
    let root = mount_fragment(tree, name, &fragment);
    tracing::debug!(view = name, root = %root, "view fragment mounted");
    Ok(root)
}
