//! License store tests against in-memory SQLite.

#![cfg(all(feature = "server", feature = "sqlite"))]

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;

use keystead::errors::LicenseError;
use keystead::server::database::{Database, KeyStatus, ProductValidity};

/// Helper: create an in-memory SQLite `Database` with the schema applied.
async fn setup_in_memory_db() -> Arc<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("db connect failed");

    let db = Database::SQLite(pool);
    db.run_migrations().await.expect("migrations failed");
    Arc::new(db)
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = setup_in_memory_db().await;
    db.run_migrations().await.expect("second run should succeed");
    assert!(db.ping().await);
    assert_eq!(db.db_type(), "sqlite");
}

#[tokio::test]
async fn insert_then_lookup() {
    let db = setup_in_memory_db().await;

    let record = db
        .insert_license("AAAA-BBBB-CCCC", "acme", "a@x.com")
        .await
        .unwrap();
    assert_eq!(record.license_key, "AAAA-BBBB-CCCC");
    assert_eq!(record.product, "acme");
    assert_eq!(record.email, "a@x.com");
    assert!(record.valid);

    assert!(db.license_exists("AAAA-BBBB-CCCC").await.unwrap());
    assert_eq!(
        db.check_valid("AAAA-BBBB-CCCC").await.unwrap(),
        KeyStatus::Valid
    );

    let fetched = db.get_license("AAAA-BBBB-CCCC").await.unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn unknown_key_is_missing() {
    let db = setup_in_memory_db().await;

    assert!(!db.license_exists("ZZZZ-ZZZZ-ZZZZ").await.unwrap());
    assert_eq!(
        db.check_valid("ZZZZ-ZZZZ-ZZZZ").await.unwrap(),
        KeyStatus::Missing
    );
    assert!(matches!(
        db.get_license("ZZZZ-ZZZZ-ZZZZ").await,
        Err(LicenseError::NotFound)
    ));
    assert_eq!(
        db.check_valid_for_product("ZZZZ-ZZZZ-ZZZZ", "acme")
            .await
            .unwrap(),
        ProductValidity::NotFound
    );
}

#[tokio::test]
async fn duplicate_key_is_rejected() {
    let db = setup_in_memory_db().await;

    db.insert_license("AAAA-BBBB-CCCC", "acme", "a@x.com")
        .await
        .unwrap();
    let second = db
        .insert_license("AAAA-BBBB-CCCC", "other", "b@x.com")
        .await;
    assert!(matches!(second, Err(LicenseError::DuplicateKey)));

    // The first row is untouched.
    let record = db.get_license("AAAA-BBBB-CCCC").await.unwrap();
    assert_eq!(record.product, "acme");
}

#[tokio::test]
async fn product_scoped_validity() {
    let db = setup_in_memory_db().await;
    db.insert_license("AAAA-BBBB-CCCC", "acme", "a@x.com")
        .await
        .unwrap();

    assert_eq!(
        db.check_valid_for_product("AAAA-BBBB-CCCC", "acme")
            .await
            .unwrap(),
        ProductValidity::Valid
    );
    assert_eq!(
        db.check_valid_for_product("AAAA-BBBB-CCCC", "other")
            .await
            .unwrap(),
        ProductValidity::ProductMismatch
    );

    db.invalidate_license("AAAA-BBBB-CCCC").await.unwrap();

    // An invalid license reports invalid even for the wrong product.
    assert_eq!(
        db.check_valid_for_product("AAAA-BBBB-CCCC", "other")
            .await
            .unwrap(),
        ProductValidity::Invalid
    );
}

#[tokio::test]
async fn invalidate_twice() {
    let db = setup_in_memory_db().await;
    db.insert_license("AAAA-BBBB-CCCC", "acme", "a@x.com")
        .await
        .unwrap();

    db.invalidate_license("AAAA-BBBB-CCCC").await.unwrap();
    assert_eq!(
        db.check_valid("AAAA-BBBB-CCCC").await.unwrap(),
        KeyStatus::Invalid
    );

    assert!(matches!(
        db.invalidate_license("AAAA-BBBB-CCCC").await,
        Err(LicenseError::AlreadyInvalid)
    ));
    assert!(matches!(
        db.invalidate_license("ZZZZ-ZZZZ-ZZZZ").await,
        Err(LicenseError::NotFound)
    ));
}

#[tokio::test]
async fn get_all_valid_filters_by_product_and_validity() {
    let db = setup_in_memory_db().await;

    for key in ["KEY1-AAAA-AAAA", "KEY2-AAAA-AAAA", "KEY3-AAAA-AAAA", "KEY4-AAAA-AAAA"] {
        db.insert_license(key, "acme", "a@x.com").await.unwrap();
    }
    db.insert_license("KEY5-AAAA-AAAA", "other", "b@x.com")
        .await
        .unwrap();
    db.invalidate_license("KEY2-AAAA-AAAA").await.unwrap();

    let keys: Vec<String> = db
        .get_all_valid("acme")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.license_key)
        .collect();
    assert_eq!(keys, vec!["KEY1-AAAA-AAAA", "KEY3-AAAA-AAAA", "KEY4-AAAA-AAAA"]);

    assert!(db.get_all_valid("nobody").await.unwrap().is_empty());
}
