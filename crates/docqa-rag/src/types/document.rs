//! Document and chunk domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Txt,
    /// PDF document
    Pdf,
}

impl FileType {
    /// Detect file type from a lowercase extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" => Some(Self::Txt),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Canonical extension
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Pdf => "pdf",
        }
    }
}

/// Processing status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Status as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored status string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether moving to `next` is a legal transition.
    ///
    /// The lifecycle is `pending -> processing -> {completed, failed}`;
    /// a failed document may be re-claimed for another ingestion attempt.
    pub fn can_transition(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Failed, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document id (`doc_<12 hex>`)
    pub document_id: String,
    /// Original filename as uploaded
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub file_size: u64,
    /// SHA-256 of the raw bytes, hex-encoded; globally unique
    pub file_hash: String,
    /// Path of the stored file on disk
    pub file_path: String,
    /// Extracted character count (set at completion)
    pub character_count: Option<u64>,
    /// Extracted word count (set at completion)
    pub word_count: Option<u64>,
    /// Page count for paginated formats
    pub page_count: Option<u32>,
    /// Number of persisted chunks
    pub chunk_count: u32,
    /// Current processing status
    pub status: DocumentStatus,
    /// Failure message when status is `failed`
    pub error_message: Option<String>,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a new pending document record
    pub fn new(
        filename: impl Into<String>,
        file_type: FileType,
        file_size: u64,
        file_hash: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            document_id: format!("doc_{}", &Uuid::new_v4().simple().to_string()[..12]),
            filename: filename.into(),
            file_type,
            file_size,
            file_hash: file_hash.into(),
            file_path: file_path.into(),
            character_count: None,
            word_count: None,
            page_count: None,
            chunk_count: 0,
            status: DocumentStatus::Pending,
            error_message: None,
            uploaded_at: now,
            updated_at: now,
        }
    }
}

/// Extraction counts recorded when ingestion completes
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCounts {
    pub chunk_count: u32,
    pub character_count: u64,
    pub word_count: u64,
    pub page_count: Option<u32>,
}

/// A persisted passage of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk id
    pub chunk_id: String,
    /// Owning document id
    pub document_id: String,
    /// 0-based position in the original text
    pub chunk_index: u32,
    /// Passage text
    pub text: String,
    /// Character length of the passage
    pub char_length: u32,
    /// Dense vector of the configured dimension, when embedded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Payload for a batch chunk insert
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub index: u32,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}
