use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;

use crate::domain::{
    bridge::BridgeReader,
    provider::{
        DeleteResult, DownloadResult, ProviderError, StorageProvider, TransferArguments,
        UploadResult,
    },
};

/// Provider storing objects as plain files below a root directory.
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Create the storage, creating `root` if it doesn't exist
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let root = root.as_ref().to_path_buf();
        tracing::info!("Using filesystem storage at {}", root.display());

        fs::create_dir_all(&root).await.map_err(|e| {
            tracing::error!("Failed to create root directory {}: {}", root.display(), e);
            ProviderError::Io(e)
        })?;

        Ok(Self { root })
    }

    /// Map a request path onto a file below the root
    fn resolve(&self, path: &str) -> Result<PathBuf, ProviderError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {},
                _ => {
                    return Err(ProviderError::OperationFailed(format!(
                        "path escapes storage root: {}",
                        path
                    )))
                },
            }
        }
        if resolved == self.root {
            return Err(ProviderError::OperationFailed(
                "path does not name a file".to_string(),
            ));
        }
        Ok(resolved)
    }

    /// Fresh temporary file next to `target`, unique per upload. The file is
    /// removed when the returned path is dropped without being persisted.
    fn partial_file(target: &Path) -> Result<(fs::File, TempPath), ProviderError> {
        let dir = target.parent().ok_or_else(|| {
            ProviderError::OperationFailed(format!("no parent directory for {}", target.display()))
        })?;
        let prefix = format!(
            ".{}.",
            target.file_name().unwrap_or_default().to_string_lossy()
        );
        let (file, path) = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".partial")
            .tempfile_in(dir)?
            .into_parts();
        Ok((fs::File::from_std(file), path))
    }

    fn content_type_for(path: &Path) -> String {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string()
    }

    async fn write_partial(
        mut file: fs::File,
        source: &mut BridgeReader,
    ) -> Result<u64, ProviderError> {
        let mut written = 0u64;
        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl StorageProvider for FilesystemStorage {
    async fn download(&self, args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
        let path = self.resolve(&args.path)?;
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProviderError::NotFound,
            _ => {
                tracing::error!("Failed to open {}: {}", path.display(), e);
                ProviderError::Io(e)
            },
        })?;

        if file.metadata().await?.is_dir() {
            return Err(ProviderError::NotFound);
        }

        Ok(DownloadResult {
            content_type: Self::content_type_for(&path),
            content: Box::new(file),
        })
    }

    async fn upload(
        &self,
        mut source: BridgeReader,
        args: &TransferArguments,
    ) -> Result<UploadResult, ProviderError> {
        let target = self.resolve(&args.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // an error before `persist` drops `partial`, which deletes the file
        let (file, partial) = Self::partial_file(&target)?;
        let size = Self::write_partial(file, &mut source).await?;

        let existed = fs::try_exists(&target).await?;
        partial
            .persist(&target)
            .map_err(|e| ProviderError::Io(e.error))?;
        tracing::debug!("Wrote {} bytes to {}", size, target.display());

        Ok(UploadResult {
            status: if existed { 200 } else { 201 },
            metadata: Some(serde_json::json!({
                "path": args.path,
                "size": size,
            })),
        })
    }

    async fn delete(&self, args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
        let path = self.resolve(&args.path)?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ProviderError::NotFound,
            _ => ProviderError::Io(e),
        })?;
        Ok(DeleteResult { status: 204 })
    }
}
