//! End-to-end smoke tests against a live PostgreSQL store of record.
//!
//! Run with `--features db-tests` and the `CATALOG_DB_*` variables pointing
//! at a disposable database.

#![cfg(feature = "db-tests")]

use catalog_api::{ApiResult, DbClient, DbConfig};
use catalog_core::{NullableText, Window};
use catalog_storage::ItemStore;

async fn test_db() -> ApiResult<DbClient> {
    let config = DbConfig::from_env();
    let db = DbClient::from_config(&config)?;
    db.ensure_schema().await?;
    Ok(db)
}

#[tokio::test]
async fn smoke_test_item_lifecycle() -> ApiResult<()> {
    let db = test_db().await?;
    let project_id = 9_001;

    let first = db.create(project_id, "smoke-first").await?;
    let second = db.create(project_id, "smoke-second").await?;
    assert_eq!(second.priority, first.priority + 1);
    assert!(!first.description.is_present());
    assert!(db.exists(first.id, project_id).await?);

    let updated = db
        .update(first.id, project_id, "smoke-renamed", NullableText::new("described"))
        .await?;
    assert_eq!(updated.description.as_deref(), Some("described"));

    let affected = db.reprioritize(second.id, project_id, first.priority).await?;
    assert_eq!(affected[0].id, second.id);
    assert!(affected.iter().any(|item| item.id == first.id));

    let removed = db.remove(first.id, project_id).await?;
    assert!(removed.removed);

    let read = db.read_window(Window::new(10, 0)).await?;
    assert!(read.total >= 2);
    assert!(read.removed >= 1);
    assert!(read
        .items
        .windows(2)
        .all(|w| (w[0].priority, w[0].id) <= (w[1].priority, w[1].id)));
    Ok(())
}

#[tokio::test]
async fn smoke_test_missing_item() -> ApiResult<()> {
    let db = test_db().await?;
    assert!(!db.exists(i32::MAX, i32::MAX).await?);
    let err = db.remove(i32::MAX, i32::MAX).await;
    assert!(err.is_err());
    Ok(())
}
