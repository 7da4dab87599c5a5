use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a rendered artifact under `name`, returning where it went.
    async fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf>;
}

pub struct FileStorage {
    pub folder: PathBuf,
}

impl FileStorage {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn save(&self, name: &str, data: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("creating {}", self.folder.display()))?;
        let path = self.folder.join(name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = data.len(), "saved output");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saves_into_nested_folder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("result"));
        let path = storage.save("result.html", b"<html></html>").await.unwrap();
        assert_eq!(path, dir.path().join("result").join("result.html"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
    }

    #[tokio::test]
    async fn overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.save("result.pdf", b"old").await.unwrap();
        let path = storage.save("result.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4");
    }
}
