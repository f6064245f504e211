use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Directory holding the rendered wheel snapshots of reports.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotStore { dir: dir.into() }
    }

    /// Create the directory if needed.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh `<uuid>.svg` name.
    pub fn new_filename() -> String {
        format!("{}.svg", Uuid::new_v4())
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        // keep only the last component, even for generated names
        let name = Path::new(filename)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        self.dir.join(name)
    }

    pub async fn write(&self, filename: &str, content: &str) -> std::io::Result<()> {
        tokio::fs::write(self.path_of(filename), content).await
    }

    pub async fn read(&self, filename: &str) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.path_of(filename)).await
    }

    pub async fn remove(&self, filename: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(self.path_of(filename)).await
    }

    /// Remove an artifact, logging instead of failing.
    pub async fn remove_or_warn(&self, filename: &str) {
        if let Err(e) = self.remove(filename).await {
            tracing::warn!(filename, "Failed to remove snapshot: {}", e);
        }
    }

    #[cfg(test)]
    pub async fn exists(&self, filename: &str) -> bool {
        tokio::fs::try_exists(self.path_of(filename))
            .await
            .unwrap_or(false)
    }
}
