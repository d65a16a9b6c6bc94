use crate::error::RepoError;
use crate::models::{DocSummary, Document};
use crate::storage::filter::ListFilter;
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

/// Upper bound applied to any requested listing size.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// Durable records for users, documents and grants.
///
/// Every document read applies the access relation: the document is not
/// deleted and the caller owns it or holds a grant on it. Callers without
/// access get [`RepoError::NotFound`], never a distinct "forbidden".
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn save_user(&self, login: &str, password_hash: &str) -> Result<(), RepoError>;

    async fn password_hash(&self, login: &str) -> Result<String, RepoError>;

    async fn user_id(&self, login: &str) -> Result<i64, RepoError>;

    /// Insert `doc` and one grant per grantee login in a single transaction.
    /// An unknown grantee fails the whole write with [`RepoError::GrantResolution`].
    async fn save_document(&self, doc: &Document, grantees: &[String]) -> Result<(), RepoError>;

    /// Documents visible to `login`, ordered by name ascending then newest first.
    async fn list_documents(
        &self,
        login: &str,
        filter: &ListFilter,
        limit: i64,
    ) -> Result<Vec<DocSummary>, RepoError>;

    async fn document_by_id(&self, id: Uuid, login: &str) -> Result<Document, RepoError>;

    /// Soft-delete `id`. Only the owner may do this.
    async fn delete_document(&self, login: &str, id: Uuid) -> Result<(), RepoError>;

    /// Subset of `keys` referenced by any document row, deleted or not.
    async fn referenced_storage_keys(&self, keys: &[String]) -> Result<HashSet<String>, RepoError>;
}

pub(crate) fn effective_limit(limit: i64) -> i64 {
    limit.clamp(0, MAX_LIST_LIMIT)
}

/// Grantee logins with duplicates removed, first occurrence kept.
pub(crate) fn unique_grantees(grantees: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    grantees
        .iter()
        .map(String::as_str)
        .filter(|login| seen.insert(*login))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(effective_limit(-5), 0);
        assert_eq!(effective_limit(10), 10);
        assert_eq!(effective_limit(1_000_000), MAX_LIST_LIMIT);
    }

    #[test]
    fn grantees_are_deduplicated_in_order() {
        let input = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(unique_grantees(&input), vec!["b", "a"]);
    }
}
