#[cfg(test)]
mod tests {
    use crate::error::RepoError;
    use crate::models::Document;
    use crate::storage::{DocumentRepository, ListFilter, MemoryRepository};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn setup() -> MemoryRepository {
        let repo = MemoryRepository::new();
        for login in ["alice123", "bob12345", "carol123"] {
            repo.save_user(login, "hash").await.unwrap();
        }
        repo
    }

    async fn document(repo: &MemoryRepository, owner: &str, name: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            owner_id: repo.user_id(owner).await.unwrap(),
            name: name.to_string(),
            mime: "text/plain".to_string(),
            has_file: false,
            is_public: false,
            json_payload: Some(br#"{"k":1}"#.to_vec()),
            storage_key: None,
            created_at: Utc::now(),
            is_deleted: false,
        }
    }

    #[tokio::test]
    async fn test_duplicate_login_rejected() {
        let repo = setup().await;
        let err = repo.save_user("alice123", "other").await.unwrap_err();
        assert!(matches!(err, RepoError::DuplicateLogin(l) if l == "alice123"));
        assert_eq!(repo.password_hash("alice123").await.unwrap(), "hash");
        assert!(matches!(repo.user_id("nobody00").await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_access_requires_ownership_or_grant() {
        let repo = setup().await;
        let doc = document(&repo, "alice123", "shared").await;
        repo.save_document(&doc, &["bob12345".to_string()]).await.unwrap();

        assert!(repo.document_by_id(doc.id, "alice123").await.is_ok());
        assert!(repo.document_by_id(doc.id, "bob12345").await.is_ok());
        assert!(matches!(
            repo.document_by_id(doc.id, "carol123").await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            repo.document_by_id(doc.id, "stranger").await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_unknown_grantee_rolls_back_whole_write() {
        let repo = setup().await;
        let doc = document(&repo, "alice123", "doc").await;
        let err = repo
            .save_document(&doc, &["bob12345".to_string(), "ghost000".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::GrantResolution(l) if l == "ghost000"));
        assert_eq!(repo.document_count().await, 0);
        assert!(repo.document_by_id(doc.id, "alice123").await.is_err());
        assert!(repo
            .list_documents("bob12345", &ListFilter::None, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_soft_delete_is_final() {
        let repo = setup().await;
        let doc = document(&repo, "alice123", "gone").await;
        repo.save_document(&doc, &["bob12345".to_string()]).await.unwrap();

        repo.delete_document("alice123", doc.id).await.unwrap();

        for login in ["alice123", "bob12345"] {
            assert!(matches!(
                repo.document_by_id(doc.id, login).await,
                Err(RepoError::NotFound)
            ));
            assert!(repo
                .list_documents(login, &ListFilter::None, 10)
                .await
                .unwrap()
                .is_empty());
        }
        assert!(matches!(
            repo.delete_document("alice123", doc.id).await,
            Err(RepoError::NotFound)
        ));
        // The row survives with the flag set.
        assert!(repo.raw_document(doc.id).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn test_grantee_cannot_delete() {
        let repo = setup().await;
        let doc = document(&repo, "alice123", "keep").await;
        repo.save_document(&doc, &["bob12345".to_string()]).await.unwrap();

        assert!(matches!(
            repo.delete_document("bob12345", doc.id).await,
            Err(RepoError::NotFound)
        ));
        assert!(matches!(
            repo.delete_document("alice123", Uuid::new_v4()).await,
            Err(RepoError::NotFound)
        ));
        assert!(repo.document_by_id(doc.id, "bob12345").await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_order_and_grants() {
        let repo = setup().await;
        let base = Utc::now();
        let mut ids = Vec::new();
        for (i, name) in ["b", "a", "a"].iter().enumerate() {
            let mut doc = document(&repo, "alice123", name).await;
            doc.created_at = base + Duration::seconds(i as i64);
            let grants = if i == 0 { vec!["carol123".to_string(), "bob12345".to_string()] } else { vec![] };
            repo.save_document(&doc, &grants).await.unwrap();
            ids.push(doc.id);
        }

        let listed = repo
            .list_documents("alice123", &ListFilter::None, 10)
            .await
            .unwrap();
        let order: Vec<Uuid> = listed.iter().map(|d| d.id).collect();
        assert_eq!(order, vec![ids[2], ids[1], ids[0]]);
        assert!(listed[0].grant.is_empty());
        assert_eq!(listed[2].grant, vec!["bob12345".to_string(), "carol123".to_string()]);

        let limited = repo
            .list_documents("alice123", &ListFilter::None, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert!(repo
            .list_documents("alice123", &ListFilter::None, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_listing_includes_shared_documents() {
        let repo = setup().await;
        let own = document(&repo, "bob12345", "mine").await;
        let shared = document(&repo, "alice123", "theirs").await;
        let hidden = document(&repo, "carol123", "private").await;
        repo.save_document(&own, &[]).await.unwrap();
        repo.save_document(&shared, &["bob12345".to_string()]).await.unwrap();
        repo.save_document(&hidden, &[]).await.unwrap();

        let names: Vec<String> = repo
            .list_documents("bob12345", &ListFilter::None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["mine".to_string(), "theirs".to_string()]);
    }

    #[tokio::test]
    async fn test_filter_safelist() {
        let repo = setup().await;
        let mut png = document(&repo, "alice123", "pic").await;
        png.mime = "image/png".to_string();
        let txt = document(&repo, "alice123", "notes").await;
        repo.save_document(&png, &[]).await.unwrap();
        repo.save_document(&txt, &[]).await.unwrap();

        let by_mime = repo
            .list_documents("alice123", &ListFilter::parse("mime", "image/png"), 10)
            .await
            .unwrap();
        assert_eq!(by_mime.len(), 1);
        assert_eq!(by_mime[0].id, png.id);

        let ignored = repo
            .list_documents("alice123", &ListFilter::parse("password_hash", "x"), 10)
            .await
            .unwrap();
        let unfiltered = repo
            .list_documents("alice123", &ListFilter::parse("", ""), 10)
            .await
            .unwrap();
        assert_eq!(ignored, unfiltered);
        assert_eq!(ignored.len(), 2);
    }

    #[tokio::test]
    async fn test_referenced_storage_keys_include_deleted_rows() {
        let repo = setup().await;
        let mut doc = document(&repo, "alice123", "f.bin").await;
        doc.has_file = true;
        doc.storage_key = Some("k1.bin".to_string());
        repo.save_document(&doc, &[]).await.unwrap();
        repo.delete_document("alice123", doc.id).await.unwrap();

        let found = repo
            .referenced_storage_keys(&["k1.bin".to_string(), "k2.bin".to_string()])
            .await
            .unwrap();
        assert!(found.contains("k1.bin"));
        assert!(!found.contains("k2.bin"));
    }
}
