//! Document management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::query::ListDocumentsParams;
use crate::types::response::{
    ChunkSummary, DeleteResponse, DocumentChunksResponse, DocumentListResponse, DocumentMetadata,
    UploadResponse,
};
use crate::types::DocumentStatus;

/// POST /documents/upload - accept a file and enqueue ingestion
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("invalid multipart payload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| Error::validation("multipart field 'file' has no filename"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("failed to read upload: {}", e)))?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| Error::validation("multipart field 'file' is required"))?;

    let accepted = state.uploads().accept(&filename, &data).await?;
    let doc = &accepted.document;

    let (status, message) = if accepted.deduplicated {
        (
            StatusCode::OK,
            "document already exists (duplicate detected)".to_string(),
        )
    } else {
        (
            StatusCode::CREATED,
            "document accepted for processing".to_string(),
        )
    };

    Ok((
        status,
        Json(UploadResponse {
            success: true,
            message,
            document_id: doc.document_id.clone(),
            filename: doc.filename.clone(),
            size: doc.file_size,
            hash: doc.file_hash.clone(),
            chunks_created: doc.chunk_count,
            metadata: DocumentMetadata::from(doc),
        }),
    ))
}

/// GET /documents/ - list documents
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListDocumentsParams>,
) -> Result<Json<DocumentListResponse>> {
    let status = params
        .status
        .as_deref()
        .map(|raw| {
            DocumentStatus::parse(raw)
                .ok_or_else(|| Error::validation(format!("unknown status filter: {}", raw)))
        })
        .transpose()?;

    let documents = state.store().list_documents(
        params.offset.unwrap_or(0),
        params.limit.unwrap_or(100),
        status,
    )?;
    let total_count = state.store().count_documents(status)?;

    Ok(Json(DocumentListResponse {
        documents: documents.iter().map(DocumentMetadata::from).collect(),
        total_count,
    }))
}

/// GET /documents/:id - document metadata and status
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentMetadata>> {
    let doc = state.store().get_document(&id)?;
    Ok(Json(DocumentMetadata::from(&doc)))
}

/// GET /documents/:id/chunks - chunk previews for a document
pub async fn get_document_chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentChunksResponse>> {
    let doc = state.store().get_document(&id)?;
    let chunks = state.store().get_chunks(&doc.document_id)?;

    Ok(Json(DocumentChunksResponse {
        document_id: doc.document_id,
        chunks: chunks.iter().map(ChunkSummary::from).collect(),
    }))
}

/// DELETE /documents/:id - delete a document and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted_chunks = state.store().delete_document(&id)?;
    Ok(Json(DeleteResponse {
        success: true,
        document_id: id,
        deleted_chunks,
    }))
}
