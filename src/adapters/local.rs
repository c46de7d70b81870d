use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// Files resolved against a base directory; absolute paths are used as given.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.resolve(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

/// `<stem>_backup_<timestamp>.csv` next to `path`.
pub fn backup_path(path: &str, timestamp: &str) -> String {
    let original = Path::new(path);
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    let extension = original
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    let file_name = format!("{}_backup_{}.{}", stem, timestamp, extension);

    match original.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.join(file_name).to_string_lossy().into_owned(),
        None => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_creates_parents() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.write_file("nested/out.csv", b"a,b\n").await.unwrap();
        assert!(storage.exists("nested/out.csv"));
        assert_eq!(storage.read_file("nested/out.csv").await.unwrap(), b"a,b\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let err = storage.read_file("absent.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::SyncError::IoError(_)));
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path("data/funds.csv", "20250101_120000"),
            "data/funds_backup_20250101_120000.csv"
        );
        assert_eq!(
            backup_path("funds.csv", "20250101_120000"),
            "funds_backup_20250101_120000.csv"
        );
    }
}
