//! Reference collection over the marketplace schema.

use std::collections::HashSet;

use uuid::Uuid;

use upkeep_core::config::jobs::default_references;
use upkeep_core::traits::references::ReferenceSource;
use upkeep_core::types::key::StorageKey;
use upkeep_database::repositories::ReferenceCollector;
use upkeep_storage::KeyExtractor;

use crate::helpers::TestDb;

async fn seed(db: &TestDb) {
    let user = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, avatar_url) VALUES ($1, $2, $3)")
        .bind(user)
        .bind("ana@example.com")
        .bind("https://uploads.s3.eu-west-1.amazonaws.com/avatars/ana.png?X-Amz-Signature=abc")
        .execute(&db.pool)
        .await
        .expect("user");
    sqlx::query("INSERT INTO users (id, email, avatar_url) VALUES ($1, $2, NULL)")
        .bind(Uuid::new_v4())
        .bind("no-avatar@example.com")
        .execute(&db.pool)
        .await
        .expect("user");

    sqlx::query(
        "INSERT INTO provider_profiles (id, user_id, cv_url, diploma_urls, photo_urls) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(user)
    .bind("cv/ana%20cv.pdf")
    .bind(vec![
        "https://minio.local:9000/uploads/diplomas/bsc.pdf".to_string(),
        "ftp://legacy.example.com/diplomas/old.pdf".to_string(),
    ])
    .bind(Vec::<String>::new())
    .execute(&db.pool)
    .await
    .expect("profile");

    sqlx::query("INSERT INTO reports (id, pdf_url) VALUES ($1, $2)")
        .bind(Uuid::new_v4())
        .bind("")
        .execute(&db.pool)
        .await
        .expect("report");
}

fn collector(db: &TestDb) -> ReferenceCollector {
    ReferenceCollector::new(
        db.pool.clone(),
        default_references(),
        KeyExtractor::new(Some("uploads".to_string())),
    )
    .expect("collector")
}

#[tokio::test]
async fn test_collects_scalar_and_array_columns() {
    let Some(db) = TestDb::connect().await else { return };
    seed(&db).await;

    let keys = collector(&db).collect().await.expect("collect");
    let expected: HashSet<StorageKey> = [
        "avatars/ana.png",
        "cv/ana cv.pdf",
        "diplomas/bsc.pdf",
    ]
    .into_iter()
    .map(StorageKey::new)
    .collect();
    assert_eq!(keys, expected);
}

#[tokio::test]
async fn test_targeted_recheck_matches_encoded_and_plain_forms() {
    let Some(db) = TestDb::connect().await else { return };
    seed(&db).await;
    let collector = collector(&db);

    assert!(collector
        .is_referenced(&StorageKey::new("cv/ana cv.pdf"))
        .await
        .expect("recheck"));
    assert!(collector
        .is_referenced(&StorageKey::new("diplomas/bsc.pdf"))
        .await
        .expect("recheck"));
    assert!(!collector
        .is_referenced(&StorageKey::new("avatars/someone-else.png"))
        .await
        .expect("recheck"));
}

#[tokio::test]
async fn test_batched_recheck_returns_referenced_subset() {
    let Some(db) = TestDb::connect().await else { return };
    seed(&db).await;

    let candidates: Vec<StorageKey> = [
        "cv/ana cv.pdf",
        "diplomas/bsc.pdf",
        "avatars/ana.png",
        "avatars/someone-else.png",
        "reports/2024-q1.pdf",
    ]
    .into_iter()
    .map(StorageKey::new)
    .collect();

    let referenced = collector(&db)
        .referenced_among(&candidates)
        .await
        .expect("batch recheck");
    let expected: HashSet<StorageKey> = ["cv/ana cv.pdf", "diplomas/bsc.pdf", "avatars/ana.png"]
        .into_iter()
        .map(StorageKey::new)
        .collect();
    assert_eq!(referenced, expected);
}

#[tokio::test]
async fn test_missing_table_is_a_query_failure() {
    let Some(db) = TestDb::connect().await else { return };
    let collector = ReferenceCollector::new(
        db.pool.clone(),
        vec![upkeep_core::config::ReferenceColumn::new(
            "invoices",
            "pdf_url",
            upkeep_core::config::ColumnKind::Scalar,
        )],
        KeyExtractor::default(),
    )
    .expect("collector");
    assert!(collector.collect().await.is_err());
}
