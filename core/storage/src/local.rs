//! Local filesystem storage provider.

use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::provider::{Metadata, StorageProvider};
use twinkey_common::{Error, Result};

/// Local filesystem storage provider.
///
/// Stores the vault blob in a single file. Writes go to a temporary file in
/// the same directory which is then renamed over the target.
pub struct LocalProvider {
    path: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider for the given vault file.
    ///
    /// No filesystem access happens until the first operation; the parent
    /// directory is created on the first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn create_metadata(fs_meta: &fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            size: fs_meta.len(),
            modified,
        }
    }

    fn persistence_error(&self, action: &str, err: std::io::Error) -> Error {
        Error::Persistence(format!("{} {}: {}", action, self.path.display(), err))
    }
}

impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn exists(&self) -> Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.is_file() && meta.len() > 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Result<Vec<u8>> {
        if !self.exists()? {
            return Err(Error::VaultNotFound(self.location()));
        }

        let data = fs::read(&self.path)?;
        debug!(path = %self.path.display(), bytes = data.len(), "Read vault file");
        Ok(data)
    }

    fn write(&self, data: &[u8]) -> Result<Metadata> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| self.persistence_error("cannot create directory for", e))?;

        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| self.persistence_error("cannot create temporary file for", e))?;
        temp.write_all(data)
            .map_err(|e| self.persistence_error("cannot write", e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.persistence_error("cannot sync", e))?;

        // Owner read/write only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(temp.path(), perms)
                .map_err(|e| self.persistence_error("cannot set permissions on", e))?;
        }

        temp.persist(&self.path)
            .map_err(|e| self.persistence_error("cannot replace", e.error))?;

        let fs_meta = fs::metadata(&self.path)
            .map_err(|e| self.persistence_error("cannot stat", e))?;
        debug!(path = %self.path.display(), bytes = data.len(), "Wrote vault file");
        Ok(Self::create_metadata(&fs_meta))
    }

    fn metadata(&self) -> Result<Option<Metadata>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(Self::create_metadata(&meta))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use twinkey_common::ErrorKind;

    #[test]
    fn test_local_write_read() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path().join("passwords.vault"));

        assert!(!provider.exists().unwrap());

        let meta = provider.write(b"ciphertext").unwrap();
        assert_eq!(meta.size, 10);
        assert!(provider.exists().unwrap());
        assert_eq!(provider.read().unwrap(), b"ciphertext");
    }

    #[test]
    fn test_local_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a").join("b").join("passwords.vault");
        let provider = LocalProvider::new(&path);

        provider.write(b"blob").unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_local_overwrite_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path().join("passwords.vault"));

        provider.write(b"first").unwrap();
        provider.write(b"second version").unwrap();

        assert_eq!(provider.read().unwrap(), b"second version");
        let entries = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_local_read_missing() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path().join("missing.vault"));

        let err = provider.read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VaultNotFound);
        assert!(provider.metadata().unwrap().is_none());
    }

    #[test]
    fn test_local_empty_file_does_not_exist() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.vault");
        fs::write(&path, b"").unwrap();

        let provider = LocalProvider::new(&path);
        assert!(!provider.exists().unwrap());
        assert_eq!(provider.read().unwrap_err().kind(), ErrorKind::VaultNotFound);
    }

    #[test]
    fn test_local_write_into_file_parent_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let provider = LocalProvider::new(blocker.join("passwords.vault"));
        let err = provider.write(b"blob").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[cfg(unix)]
    #[test]
    fn test_local_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("passwords.vault");
        LocalProvider::new(&path).write(b"blob").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
