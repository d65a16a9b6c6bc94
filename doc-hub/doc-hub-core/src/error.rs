//! Error types shared by the storage layer and the document service.

use thiserror::Error;

/// Failures reported by an object store backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Failures reported by the relational repository.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("login {0} already exists")]
    DuplicateLogin(String),
    #[error("grantee {0} does not resolve to a user")]
    GrantResolution(String),
    #[error("relational store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Unavailable(other.to_string()),
        }
    }
}

/// Failures of the document orchestration operations.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("invalid document id {0:?}")]
    InvalidId(String),
    #[error("metadata declares a file but none was supplied")]
    MissingFile,
    #[error("document not found")]
    NotFound,
    #[error("failed to upload file: {0}")]
    Upload(#[source] BlobError),
    #[error("failed to persist document: {0}")]
    Persist(#[source] RepoError),
    #[error("failed to persist document ({persist}); orphaned object {key}: {cleanup}")]
    Compensation {
        key: String,
        persist: RepoError,
        cleanup: BlobError,
    },
    #[error("failed to query documents: {0}")]
    Query(#[source] RepoError),
    #[error("failed to retrieve file: {0}")]
    Retrieval(#[source] BlobError),
    #[error("failed to delete document: {0}")]
    Delete(#[source] RepoError),
}

impl DocsError {
    /// True for errors caused by the request itself rather than a store.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DocsError::InvalidId(_) | DocsError::MissingFile)
    }
}

/// Failures that abort a reconciliation sweep before any deletion.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to list objects: {0}")]
    List(#[source] BlobError),
    #[error("failed to look up referenced keys: {0}")]
    Lookup(#[source] RepoError),
}

/// Failures of registration, login and token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid login")]
    InvalidLogin,
    #[error("invalid password")]
    InvalidPassword,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to hash password: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_input_only() {
        assert!(DocsError::InvalidId("x".into()).is_client_error());
        assert!(DocsError::MissingFile.is_client_error());
        assert!(!DocsError::NotFound.is_client_error());
        assert!(!DocsError::Persist(RepoError::NotFound).is_client_error());
    }

    #[test]
    fn compensation_message_names_orphaned_key() {
        let err = DocsError::Compensation {
            key: "abc.txt".into(),
            persist: RepoError::Unavailable("db down".into()),
            cleanup: BlobError::Unavailable("s3 down".into()),
        };
        assert!(err.to_string().contains("abc.txt"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            RepoError::from(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
    }
}
