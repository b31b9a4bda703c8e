use crate::core::Storage;
use crate::utils::error::Result;
use std::path::Path;

/// Output storage rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("results").join("escondida");
        let storage = LocalStorage::new(base.display().to_string());

        storage.write_file("change_summary.csv", b"period\n").await.unwrap();

        assert!(base.join("change_summary.csv").exists());
        assert_eq!(std::fs::read(base.join("change_summary.csv")).unwrap(), b"period\n");
    }
}
