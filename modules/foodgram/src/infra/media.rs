use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::repo::ImageStore;

/// Subdirectory of the media root holding recipe images.
pub const RECIPES_DIR: &str = "recipes";

/// Images stored as files under a media root served at `/media`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("refusing media path outside the media root: {relative}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ImageStore for LocalMediaStore {
    async fn save(&self, ext: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let relative = format!("{RECIPES_DIR}/{}.{ext}", Uuid::new_v4());
        let path = self.resolve(&relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %relative, size = bytes.len(), "image stored");
        Ok(relative)
    }

    async fn remove(&self, relative: &str) -> anyhow::Result<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}
