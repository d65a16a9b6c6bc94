//! Records owned by the repository and the shapes passed across the API.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered account.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A stored document row. Never updated in place apart from the soft-delete flag.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: i64,
    pub name: String,
    pub mime: String,
    #[sqlx(rename = "hash_file")]
    pub has_file: bool,
    /// Stored and returned, but not part of the access check.
    #[sqlx(rename = "public")]
    pub is_public: bool,
    #[sqlx(rename = "json_data")]
    pub json_payload: Option<Vec<u8>>,
    #[sqlx(rename = "storage_path")]
    pub storage_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Client-supplied upload metadata (the `meta` multipart field).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMeta {
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default, alias = "grants")]
    pub grant: Vec<String>,
}

/// One entry of a document listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocSummary {
    pub id: Uuid,
    pub name: String,
    pub mime: String,
    pub file: bool,
    pub public: bool,
    pub created: DateTime<Utc>,
    /// Logins holding a grant on the document; empty when unshared.
    pub grant: Vec<String>,
}

impl DocSummary {
    pub fn from_document(doc: &Document, grant: Vec<String>) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            mime: doc.mime.clone(),
            file: doc.has_file,
            public: doc.is_public,
            created: doc.created_at,
            grant,
        }
    }
}

/// Result of fetching a document: the blob when it has one, otherwise its JSON payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentContent {
    File { bytes: Bytes, mime: String },
    Json { payload: Vec<u8>, mime: String },
}
