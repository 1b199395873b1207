use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// A file part lifted out of a multipart body.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Featured images on local disk, one file per upload.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reject anything that is not an image or is over the size limit.
    pub fn check(&self, upload: &ImageUpload) -> AppResult<()> {
        let mime = mime_guess::from_path(&upload.file_name).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(AppError::BadRequest("Only image files are allowed".into()));
        }
        if upload.bytes.is_empty() {
            return Err(AppError::BadRequest("Image file is empty".into()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::BadRequest(format!(
                "Image cannot be larger than {} bytes",
                self.max_bytes
            )));
        }
        Ok(())
    }

    /// Write the upload under a generated name and return that name.
    pub async fn save(&self, upload: &ImageUpload) -> AppResult<String> {
        self.check(upload)?;

        let extension = Path::new(&upload.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "img".to_string());
        let name = format!("post-{}.{}", uuid::Uuid::now_v7(), extension);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&name), &upload.bytes).await?;
        tracing::debug!(file = %name, bytes = upload.bytes.len(), "stored featured image");
        Ok(name)
    }

    /// Whether `name` is a file this store generated. The default image and
    /// externally supplied names are never removed.
    pub fn owns(&self, name: &str) -> bool {
        name.starts_with("post-") && self.resolve(name).is_some()
    }

    /// Best-effort removal of a stored image.
    pub async fn discard(&self, name: &str) {
        if let Err(e) = tokio::fs::remove_file(self.dir.join(name)).await {
            tracing::warn!("Could not remove orphaned image {}: {}", name, e);
        }
    }

    /// Resolve a stored file name, refusing anything that could escape the directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        plain.then(|| self.dir.join(name))
    }
}
