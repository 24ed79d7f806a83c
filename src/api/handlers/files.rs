use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use crate::api::requester::Caller;
use crate::api::response::{ApiError, AppJson, AppQuery, JSend};
use crate::storage::FileRecord;
use crate::vault::{CreateOutcome, NewFile};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub sensitivity: Option<u32>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateFileResponse {
    pub status: &'static str,
    pub file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub created_at: String,
    pub department: Option<String>,
    pub filename: String,
    pub id: String,
    pub owner: String,
    pub sensitivity: u32,
    pub sha256: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchMatch {
    pub filename: String,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub matches: Vec<SearchMatch>,
}

fn default_sensitivity() -> u32 {
    1
}

/// Accepts `3` or `"3"`; browser forms send numbers as strings.
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("sensitivity must be a non-negative integer")),
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_file(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    AppJson(req): AppJson<CreateFileRequest>,
) -> Result<(StatusCode, Json<JSend<CreateFileResponse>>), ApiError> {
    let (Some(filename), Some(sha256)) = (req.filename, req.sha256) else {
        return Err(ApiError::bad_request("missing fields: filename and sha256 are required"));
    };
    if filename.is_empty() || sha256.is_empty() {
        return Err(ApiError::bad_request("missing fields: filename and sha256 are required"));
    }

    let outcome = state.vault.create_file(
        &requester.id,
        NewFile {
            filename,
            digest: sha256,
            sensitivity: req.sensitivity.unwrap_or_else(default_sensitivity),
            department: req.department,
        },
    )?;

    let response = match outcome {
        CreateOutcome::Created { id } => (
            StatusCode::CREATED,
            CreateFileResponse {
                status: "created",
                upload_key: Some(id.clone()),
                file_id: id,
            },
        ),
        CreateOutcome::Exists { id } => (
            StatusCode::OK,
            CreateFileResponse {
                status: "exists",
                file_id: id,
                upload_key: None,
            },
        ),
    };

    Ok((response.0, JSend::success(response.1)))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state.vault.get_file(&id)?;
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn upload_blob(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<JSend<UploadResponse>>, ApiError> {
    if body.len() as u64 > state.config.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {} bytes",
            state.config.max_upload_size
        )));
    }

    state.vault.upload(&id, body).await?;
    tracing::debug!(file_id = %id, "Uploaded file content");

    Ok(JSend::success(UploadResponse { status: "ok" }))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<SearchResponse>>, ApiError> {
    let matches = state
        .vault
        .search(&params.q)?
        .into_iter()
        .map(|f| SearchMatch {
            filename: f.filename,
            id: f.id,
        })
        .collect();

    Ok(JSend::success(SearchResponse { matches }))
}

/// Decrypted file content as an attachment named after the record.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let download = state.vault.download(&requester, &id).await?;

    let content_type = mime_guess::from_path(&download.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = content_disposition(&download.filename);

    let mut response = (StatusCode::OK, download.data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = disposition.parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(response)
}

// ============================================================================
// Helpers
// ============================================================================

fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        created_at: file.created_at.to_rfc3339(),
        department: file.department.clone(),
        filename: file.filename.clone(),
        id: file.id.clone(),
        owner: file.owner.clone(),
        sensitivity: file.sensitivity,
        sha256: file.digest.clone(),
    }
}

/// `attachment` with an ASCII fallback name plus the exact name in RFC 5987 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(filename.len());
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
