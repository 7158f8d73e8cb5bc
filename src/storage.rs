use crate::errors::ServiceError;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Writes generated order files under a local directory that is also served
/// over HTTP under `public_prefix`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
    public_prefix: String,
}

impl FileStorage {
    pub fn new(base_dir: impl Into<PathBuf>, public_prefix: impl AsRef<str>) -> Self {
        let prefix = public_prefix.as_ref().trim_end_matches('/');
        Self {
            base_dir: base_dir.into(),
            public_prefix: if prefix.starts_with('/') {
                prefix.to_string()
            } else {
                format!("/{}", prefix)
            },
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Stores `content` as `filename` and returns its public path.
    pub async fn put(&self, filename: &str, content: &[u8]) -> Result<String, ServiceError> {
        let name = Self::checked_name(filename)?;

        tokio::fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            error!(dir = %self.base_dir.display(), error = %e, "Failed to create storage directory");
            ServiceError::StorageError(e.to_string())
        })?;

        let path = self.base_dir.join(name);
        tokio::fs::write(&path, content).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to write file");
            ServiceError::StorageError(e.to_string())
        })?;

        debug!(path = %path.display(), bytes = content.len(), "Stored file");
        Ok(format!("{}/{}", self.public_prefix, name))
    }

    /// Reads back a file previously stored under `filename`.
    pub async fn get(&self, filename: &str) -> Result<Vec<u8>, ServiceError> {
        let name = Self::checked_name(filename)?;
        let path = self.base_dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(format!("file {}", name)))
            }
            Err(e) => Err(ServiceError::StorageError(e.to_string())),
        }
    }

    fn checked_name(filename: &str) -> Result<&str, ServiceError> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && filename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(filename)
        } else {
            Err(ServiceError::BadRequest(format!("invalid file name {:?}", filename)))
        }
    }
}
