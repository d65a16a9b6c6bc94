//! In-memory repository with the same access rules as the PostgreSQL one.

use crate::error::RepoError;
use crate::models::{DocSummary, Document, User};
use crate::storage::filter::ListFilter;
use crate::storage::repository::{effective_limit, unique_grantees, DocumentRepository};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    next_user_id: i64,
    /// Insertion sequence number alongside each row, newest wins ties on `created_at`.
    documents: HashMap<Uuid, (u64, Document)>,
    next_seq: u64,
    grants: BTreeSet<(Uuid, i64)>,
}

impl State {
    fn resolve(&self, login: &str) -> Option<i64> {
        self.users.get(login).map(|u| u.id)
    }

    fn can_access(&self, doc: &Document, user_id: i64) -> bool {
        !doc.is_deleted && (doc.owner_id == user_id || self.grants.contains(&(doc.id, user_id)))
    }

    fn grantee_logins(&self, doc_id: Uuid) -> Vec<String> {
        let mut logins: Vec<String> = self
            .grants
            .range((doc_id, i64::MIN)..=(doc_id, i64::MAX))
            .filter_map(|(_, uid)| self.users.values().find(|u| u.id == *uid))
            .map(|u| u.login.clone())
            .collect();
        logins.sort();
        logins
    }
}

/// Repository held entirely in process memory.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw row lookup that ignores access rules and the deleted flag.
    pub async fn raw_document(&self, id: Uuid) -> Option<Document> {
        self.state
            .read()
            .await
            .documents
            .get(&id)
            .map(|(_, doc)| doc.clone())
    }

    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn save_user(&self, login: &str, password_hash: &str) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(login) {
            return Err(RepoError::DuplicateLogin(login.to_string()));
        }
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(login.to_string(), user);
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> Result<String, RepoError> {
        self.state
            .read()
            .await
            .users
            .get(login)
            .map(|u| u.password_hash.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn user_id(&self, login: &str) -> Result<i64, RepoError> {
        self.state.read().await.resolve(login).ok_or(RepoError::NotFound)
    }

    async fn save_document(&self, doc: &Document, grantees: &[String]) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(&doc.id) {
            return Err(RepoError::Unavailable(format!("duplicate document id {}", doc.id)));
        }
        if let Some(key) = &doc.storage_key {
            if state
                .documents
                .values()
                .any(|(_, d)| d.storage_key.as_ref() == Some(key))
            {
                return Err(RepoError::Unavailable(format!("duplicate storage key {}", key)));
            }
        }

        // Resolve every grantee before touching state so a failure leaves nothing behind.
        let mut grant_ids = Vec::new();
        for login in unique_grantees(grantees) {
            let uid = state
                .resolve(login)
                .ok_or_else(|| RepoError::GrantResolution(login.to_string()))?;
            grant_ids.push(uid);
        }

        state.next_seq += 1;
        let seq = state.next_seq;
        state.documents.insert(doc.id, (seq, doc.clone()));
        for uid in grant_ids {
            state.grants.insert((doc.id, uid));
        }
        Ok(())
    }

    async fn list_documents(
        &self,
        login: &str,
        filter: &ListFilter,
        limit: i64,
    ) -> Result<Vec<DocSummary>, RepoError> {
        let state = self.state.read().await;
        let Some(uid) = state.resolve(login) else {
            return Ok(Vec::new());
        };

        let mut visible: Vec<&(u64, Document)> = state
            .documents
            .values()
            .filter(|(_, doc)| state.can_access(doc, uid) && filter.matches(doc))
            .collect();
        visible.sort_by(|(seq_a, a), (seq_b, b)| {
            a.name
                .cmp(&b.name)
                .then(b.created_at.cmp(&a.created_at))
                .then(seq_b.cmp(seq_a))
        });

        Ok(visible
            .into_iter()
            .take(effective_limit(limit) as usize)
            .map(|(_, doc)| DocSummary::from_document(doc, state.grantee_logins(doc.id)))
            .collect())
    }

    async fn document_by_id(&self, id: Uuid, login: &str) -> Result<Document, RepoError> {
        let state = self.state.read().await;
        let uid = state.resolve(login).ok_or(RepoError::NotFound)?;
        match state.documents.get(&id) {
            Some((_, doc)) if state.can_access(doc, uid) => Ok(doc.clone()),
            _ => Err(RepoError::NotFound),
        }
    }

    async fn delete_document(&self, login: &str, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let uid = state.resolve(login).ok_or(RepoError::NotFound)?;
        match state.documents.get_mut(&id) {
            Some((_, doc)) if doc.owner_id == uid && !doc.is_deleted => {
                doc.is_deleted = true;
                Ok(())
            }
            _ => Err(RepoError::NotFound),
        }
    }

    async fn referenced_storage_keys(&self, keys: &[String]) -> Result<HashSet<String>, RepoError> {
        let state = self.state.read().await;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(state
            .documents
            .values()
            .filter_map(|(_, doc)| doc.storage_key.as_deref())
            .filter(|key| wanted.contains(key))
            .map(str::to_string)
            .collect())
    }
}
