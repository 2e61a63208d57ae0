//! Upload coordination: validate, hash, deduplicate, persist, enqueue

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ServerConfig, StorageConfig};
use crate::error::{Error, Result};
use crate::processing::IngestScheduler;
use crate::storage::Store;
use crate::types::{Document, FileType};

/// Outcome of an accepted upload
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    pub document: Document,
    /// The bytes matched an existing document; nothing new was created
    pub deduplicated: bool,
}

/// Accepts a file, produces a pending document, and enqueues ingestion.
///
/// The SHA-256 dedup makes uploads idempotent: repeated uploads of identical
/// bytes collapse to one document and at most one ingestion run.
pub struct UploadCoordinator {
    store: Arc<Store>,
    scheduler: IngestScheduler,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<Store>,
        scheduler: IngestScheduler,
        server: &ServerConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            upload_dir: storage.upload_dir(),
            max_upload_bytes: server.max_upload_bytes,
            allowed_extensions: server.allowed_extensions.clone(),
        }
    }

    /// Validate and persist an upload, returning the new or existing document.
    pub async fn accept(&self, filename: &str, data: &[u8]) -> Result<AcceptedUpload> {
        let file_type = self.validate(filename, data)?;
        let file_hash = content_hash(data);

        if let Some(existing) = self.store.get_document_by_hash(&file_hash)? {
            tracing::info!(
                "duplicate upload of {} matches document {}",
                filename,
                existing.document_id
            );
            return Ok(AcceptedUpload {
                document: existing,
                deduplicated: true,
            });
        }

        // Hash-derived path; identical bytes land on the same file
        let stored_name = format!("{}.{}", &file_hash[..16], file_type.extension());
        let file_path = self.upload_dir.join(stored_name);
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(&file_path, data).await?;

        let document = Document::new(
            filename,
            file_type,
            data.len() as u64,
            &file_hash,
            file_path.to_string_lossy().to_string(),
        );

        match self.store.create_document(&document) {
            Ok(()) => {}
            Err(Error::DuplicateContent { existing_id }) => {
                // Lost a race against a concurrent identical upload
                let existing = self.store.get_document(&existing_id)?;
                return Ok(AcceptedUpload {
                    document: existing,
                    deduplicated: true,
                });
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&file_path).await;
                return Err(e);
            }
        }

        self.scheduler.enqueue(document.document_id.clone()).await?;

        tracing::info!(
            "accepted upload {} as document {} ({} bytes)",
            filename,
            document.document_id,
            data.len()
        );
        Ok(AcceptedUpload {
            document,
            deduplicated: false,
        })
    }

    fn validate(&self, filename: &str, data: &[u8]) -> Result<FileType> {
        if filename.trim().is_empty() {
            return Err(Error::validation("no filename provided"));
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| Error::validation(format!("file '{}' has no extension", filename)))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(Error::validation(format!(
                "file type .{} not allowed; allowed types: {}",
                extension,
                self.allowed_extensions.join(", ")
            )));
        }

        let file_type = FileType::from_extension(&extension)
            .ok_or_else(|| Error::validation(format!("unsupported file type: .{}", extension)))?;

        if data.is_empty() {
            return Err(Error::validation("uploaded file is empty"));
        }
        if data.len() > self.max_upload_bytes {
            return Err(Error::validation(format!(
                "file too large: {} bytes exceeds the {} byte limit",
                data.len(),
                self.max_upload_bytes
            )));
        }

        Ok(file_type)
    }
}

/// SHA-256 of the raw bytes, hex-encoded
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
