//! Document orchestration across the object store and the repository.
//!
//! The object store and the repository share no transaction. A save uploads
//! the blob first and inserts the row second, so a row never points at a
//! missing blob. When the insert fails the blob is deleted again; if that
//! delete fails too the key is reported in [`DocsError::Compensation`] and
//! left for [`crate::reconcile::OrphanSweeper`].


use crate::error::{DocsError, RepoError};
use crate::models::{DocSummary, Document, DocumentContent, DocumentMeta};
use crate::storage::{BlobStorage, DocumentRepository, ListFilter};
use bytes::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Fresh object key for a file called `name`: a random UUID plus the original extension.
pub fn storage_key_for(name: &str) -> String {
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext),
        _ => Uuid::new_v4().to_string(),
    }
}

fn parse_id(doc_id: &str) -> Result<Uuid, DocsError> {
    Uuid::parse_str(doc_id).map_err(|_| DocsError::InvalidId(doc_id.to_string()))
}

/// Save, list, fetch and delete documents on behalf of a login.
#[derive(Clone)]
pub struct DocumentService {
    repo: Arc<dyn DocumentRepository>,
    blobs: Arc<dyn BlobStorage>,
}

impl DocumentService {
    pub fn new(repo: Arc<dyn DocumentRepository>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self { repo, blobs }
    }

    /// Store a new document owned by `login` and return its id.
    pub async fn save_document(
        &self,
        login: &str,
        meta: &DocumentMeta,
        json_payload: Option<Vec<u8>>,
        file: Option<Bytes>,
    ) -> Result<Uuid, DocsError> {
        if meta.file && file.is_none() {
            return Err(DocsError::MissingFile);
        }

        let storage_key = match file {
            Some(data) => {
                let key = storage_key_for(&meta.name);
                let locator = self
                    .blobs
                    .put(&key, data, &meta.mime)
                    .await
                    .map_err(|e| {
                        error!(login, key = %key, "upload failed: {}", e);
                        DocsError::Upload(e)
                    })?;
                debug!(login, locator = %locator, "file uploaded");
                Some(key)
            }
            None => None,
        };

        let owner_id = self.repo.user_id(login).await.map_err(|e| {
            // Nothing compensates this path; the sweep collects the blob later.
            if let Some(key) = &storage_key {
                warn!(login, key = %key, "owner lookup failed after upload, object orphaned");
            }
            error!(login, "failed to resolve owner: {}", e);
            DocsError::Persist(e)
        })?;

        let doc = Document {
            id: Uuid::new_v4(),
            owner_id,
            name: meta.name.clone(),
            mime: meta.mime.clone(),
            has_file: storage_key.is_some(),
            is_public: meta.public,
            json_payload,
            storage_key,
            created_at: Utc::now(),
            is_deleted: false,
        };

        if let Err(persist) = self.repo.save_document(&doc, &meta.grant).await {
            error!(login, doc_id = %doc.id, "failed to save document: {}", persist);
            return Err(self.compensate(doc.storage_key, persist).await);
        }

        info!(login, doc_id = %doc.id, has_file = doc.has_file, "document saved");
        Ok(doc.id)
    }

    /// Undo the upload of a save whose row insert failed and pick the error to report.
    async fn compensate(&self, storage_key: Option<String>, persist: RepoError) -> DocsError {
        let Some(key) = storage_key else {
            return DocsError::Persist(persist);
        };
        match self.blobs.delete(&key).await {
            Ok(()) => {
                debug!(key = %key, "compensating delete succeeded");
                DocsError::Persist(persist)
            }
            Err(cleanup) => {
                error!(key = %key, "compensating delete failed, object orphaned: {}", cleanup);
                DocsError::Compensation {
                    key,
                    persist,
                    cleanup,
                }
            }
        }
    }

    /// Documents owned by or shared with `login`. Unknown filter keys are ignored.
    pub async fn list_documents(
        &self,
        login: &str,
        filter_key: &str,
        filter_value: &str,
        limit: i64,
    ) -> Result<Vec<DocSummary>, DocsError> {
        let filter = ListFilter::parse(filter_key, filter_value);
        if filter == ListFilter::None && !filter_key.is_empty() {
            debug!(login, filter_key, "ignoring filter outside the safelist");
        }
        self.repo
            .list_documents(login, &filter, limit)
            .await
            .map_err(|e| {
                error!(login, "failed to list documents: {}", e);
                DocsError::Query(e)
            })
    }

    /// Fetch the file bytes, or the JSON payload when the document has no file.
    pub async fn get_document(&self, login: &str, doc_id: &str) -> Result<DocumentContent, DocsError> {
        let id = parse_id(doc_id)?;

        let doc = self
            .repo
            .document_by_id(id, login)
            .await
            .map_err(|e| match e {
                RepoError::NotFound => DocsError::NotFound,
                other => {
                    error!(login, doc_id = %id, "failed to load document: {}", other);
                    DocsError::Query(other)
                }
            })?;

        match doc.storage_key {
            Some(key) => {
                let bytes = self.blobs.get(&key).await.map_err(|e| {
                    error!(login, doc_id = %id, key = %key, "failed to fetch file: {}", e);
                    DocsError::Retrieval(e)
                })?;
                Ok(DocumentContent::File {
                    bytes,
                    mime: doc.mime,
                })
            }
            None => Ok(DocumentContent::Json {
                payload: doc.json_payload.unwrap_or_default(),
                mime: doc.mime,
            }),
        }
    }

    /// Soft-delete a document owned by `login`.
    pub async fn delete_document(&self, login: &str, doc_id: &str) -> Result<(), DocsError> {
        let id = parse_id(doc_id)?;
        self.repo
            .delete_document(login, id)
            .await
            .map_err(|e| match e {
                RepoError::NotFound => DocsError::NotFound,
                other => {
                    error!(login, doc_id = %id, "failed to delete document: {}", other);
                    DocsError::Delete(other)
                }
            })?;
        info!(login, doc_id = %id, "document deleted");
        Ok(())
    }
}
