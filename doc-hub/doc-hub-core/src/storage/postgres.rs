//! PostgreSQL repository.

use crate::error::RepoError;
use crate::models::{DocSummary, Document};
use crate::storage::filter::ListFilter;
use crate::storage::repository::{effective_limit, unique_grantees, DocumentRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

const MAX_CONNECTIONS: u32 = 20;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const LIST_SELECT: &str = r#"
WITH viewer AS (SELECT id FROM users WHERE login = "#;

const LIST_BODY: &str = r#")
SELECT d.id, d.name, d.mime, d.hash_file, d.public, d.created_at,
       COALESCE(ARRAY_AGG(gu.login ORDER BY gu.login) FILTER (WHERE gu.login IS NOT NULL), '{}'::text[]) AS grants
FROM documents d
JOIN viewer v ON true
LEFT JOIN grants g ON g.doc_id = d.id
LEFT JOIN users gu ON gu.id = g.user_id
WHERE d.is_deleted = false
  AND (d.owner_id = v.id
       OR EXISTS (SELECT 1 FROM grants vg WHERE vg.doc_id = d.id AND vg.user_id = v.id))"#;

const LIST_TAIL: &str = r#"
GROUP BY d.id
ORDER BY d.name ASC, d.created_at DESC
LIMIT "#;

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    name: String,
    mime: String,
    hash_file: bool,
    public: bool,
    created_at: DateTime<Utc>,
    grants: Vec<String>,
}

impl From<SummaryRow> for DocSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            mime: row.mime,
            file: row.hash_file,
            public: row.public,
            created: row.created_at,
            grant: row.grants,
        }
    }
}

/// Listing query for `login`. The filter contributes a bound parameter only.
pub(crate) fn list_query<'a>(
    login: &'a str,
    filter: &'a ListFilter,
    limit: i64,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(LIST_SELECT);
    qb.push_bind(login);
    qb.push(LIST_BODY);
    filter.push_condition(&mut qb);
    qb.push(LIST_TAIL);
    qb.push_bind(limit);
    qb
}

/// Repository backed by a shared PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(url: &str) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool, for callers that configure it themselves.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), RepoError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepoError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl DocumentRepository for PgRepository {
    async fn save_user(&self, login: &str, password_hash: &str) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO users (login, password_hash) VALUES ($1, $2)")
            .bind(login)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|err| match err.as_database_error() {
                Some(db) if db.is_unique_violation() => RepoError::DuplicateLogin(login.to_string()),
                _ => RepoError::from(err),
            })?;
        Ok(())
    }

    async fn password_hash(&self, login: &str) -> Result<String, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE login = $1")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn user_id(&self, login: &str) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE login = $1")
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn save_document(&self, doc: &Document, grantees: &[String]) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, name, mime, hash_file, public,
                                   json_data, storage_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(doc.id)
        .bind(doc.owner_id)
        .bind(&doc.name)
        .bind(&doc.mime)
        .bind(doc.has_file)
        .bind(doc.is_public)
        .bind(doc.json_payload.as_deref())
        .bind(doc.storage_key.as_deref())
        .bind(doc.created_at)
        .execute(&mut *tx)
        .await?;

        for login in unique_grantees(grantees) {
            let inserted = sqlx::query(
                r#"
                INSERT INTO grants (doc_id, user_id)
                SELECT d.id, u.id
                FROM users u
                JOIN documents d ON d.id = $1
                WHERE u.login = $2
                "#,
            )
            .bind(doc.id)
            .bind(login)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 0 {
                warn!(doc_id = %doc.id, grantee = login, "grantee does not exist, rolling back");
                if let Err(e) = tx.rollback().await {
                    error!(doc_id = %doc.id, "rollback failed: {}", e);
                }
                return Err(RepoError::GrantResolution(login.to_string()));
            }
        }

        tx.commit().await?;
        debug!(doc_id = %doc.id, grants = grantees.len(), "document stored");
        Ok(())
    }

    async fn list_documents(
        &self,
        login: &str,
        filter: &ListFilter,
        limit: i64,
    ) -> Result<Vec<DocSummary>, RepoError> {
        let limit = effective_limit(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut query = list_query(login, filter, limit);
        let rows = query
            .build_query_as::<SummaryRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(DocSummary::from).collect())
    }

    async fn document_by_id(&self, id: Uuid, login: &str) -> Result<Document, RepoError> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT d.id, d.owner_id, d.name, d.mime, d.hash_file, d.public,
                   d.json_data, d.storage_path, d.created_at, d.is_deleted
            FROM documents d
            JOIN users v ON v.login = $2
            WHERE d.id = $1
              AND d.is_deleted = false
              AND (d.owner_id = v.id
                   OR EXISTS (SELECT 1 FROM grants g WHERE g.doc_id = d.id AND g.user_id = v.id))
            "#,
        )
        .bind(id)
        .bind(login)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepoError::NotFound)
    }

    async fn delete_document(&self, login: &str, id: Uuid) -> Result<(), RepoError> {
        let affected = sqlx::query(
            r#"
            UPDATE documents SET is_deleted = true
            WHERE id = $1
              AND is_deleted = false
              AND owner_id = (SELECT id FROM users WHERE login = $2)
            "#,
        )
        .bind(id)
        .bind(login)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn referenced_storage_keys(&self, keys: &[String]) -> Result<HashSet<String>, RepoError> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        let found = sqlx::query_scalar::<_, String>(
            "SELECT storage_path FROM documents WHERE storage_path = ANY($1)",
        )
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;
        Ok(found.into_iter().collect())
    }
}
