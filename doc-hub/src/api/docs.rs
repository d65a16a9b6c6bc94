use super::auth_middleware::AuthContext;
use super::response::{decode, ApiError, Envelope};
use super::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use doc_hub_core::models::{DocSummary, DocumentContent, DocumentMeta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
pub struct UploadData {
    /// The JSON payload as stored, `null` when none was sent.
    pub json: Option<Value>,
    /// Name of the uploaded file, empty when the document has none.
    pub file: String,
}

#[derive(Deserialize)]
struct ListRequest {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    limit: i64,
}

/// Multipart fields `meta` (required JSON), `json` (optional JSON) and `file` (optional bytes).
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<Envelope<UploadData>, ApiError> {
    let mut meta_raw: Option<String> = None;
    let mut json_raw: Option<Bytes> = None;
    let mut file: Option<Bytes> = None;

    let malformed = |e: axum::extract::multipart::MultipartError| {
        warn!(login = %auth.login, "failed to parse multipart form: {}", e);
        ApiError::new(e.status(), "failed to parse multipart form")
    };

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("meta") => meta_raw = Some(field.text().await.map_err(malformed)?),
            Some("json") => json_raw = Some(field.bytes().await.map_err(malformed)?),
            Some("file") => file = Some(field.bytes().await.map_err(malformed)?),
            other => debug!(field = ?other, "ignoring multipart field"),
        }
    }

    let meta_raw = meta_raw
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("failed to get meta"))?;
    let meta: DocumentMeta = serde_json::from_str(&meta_raw)
        .map_err(|_| ApiError::bad_request("failed to unmarshal meta"))?;

    let json = match json_raw.filter(|j| !j.is_empty()) {
        Some(raw) => Some(
            serde_json::from_slice::<Value>(&raw)
                .map_err(|_| ApiError::bad_request("failed to unmarshal json"))?,
        ),
        None => None,
    };
    let payload = json
        .as_ref()
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|_| ApiError::bad_request("failed to unmarshal json"))?;

    // A file part is stored even when meta does not declare one.
    let has_file = file.is_some();
    state
        .docs
        .save_document(&auth.login, &meta, payload, file)
        .await
        .map_err(|e| ApiError::from_docs(&e, "failed to save document"))?;

    Ok(Envelope::Data(UploadData {
        json,
        file: if has_file { meta.name } else { String::new() },
    }))
}

/// Listing parameters travel in a JSON body, even on GET.
pub async fn list(
    State(state): State<AppState>,
    auth: AuthContext,
    body: Bytes,
) -> Result<Envelope<Vec<DocSummary>>, ApiError> {
    let req: ListRequest = decode(&body)?;
    let docs = state
        .docs
        .list_documents(&auth.login, &req.key, &req.value, req.limit)
        .await
        .map_err(|e| ApiError::from_docs(&e, "failed to get documents"))?;
    Ok(Envelope::Data(docs))
}

pub async fn fetch(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let content = state
        .docs
        .get_document(&auth.login, &id)
        .await
        .map_err(|e| ApiError::from_docs(&e, "failed to get document"))?;

    match content {
        DocumentContent::File { bytes, mime } => {
            Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
        }
        DocumentContent::Json { payload, .. } => {
            let data = if payload.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&payload).unwrap_or_else(|e| {
                    error!(doc_id = %id, "stored payload is not valid json: {}", e);
                    Value::String(String::from_utf8_lossy(&payload).into_owned())
                })
            };
            Ok(Envelope::Data(data).into_response())
        }
    }
}

/// `/api/docs/` with the id segment left empty.
pub async fn missing_id(_auth: AuthContext) -> ApiError {
    ApiError::bad_request("failed to get document id")
}

pub async fn remove(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Envelope<Map<String, Value>>, ApiError> {
    state
        .docs
        .delete_document(&auth.login, &id)
        .await
        .map_err(|e| ApiError::from_docs(&e, "failed to delete document"))?;

    let mut deleted = Map::new();
    deleted.insert(id, Value::Bool(true));
    Ok(Envelope::Response(deleted))
}
