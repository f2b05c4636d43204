use super::*;
use ds_core::{document, FieldPath};
use serde_json::json;

fn users() -> CollectionName {
    CollectionName::new("users")
}

async fn seeded(n: usize) -> MemoryStore {
    let store = MemoryStore::new();
    for i in 0..n {
        store
            .insert_one(&users(), document(json!({ "_id": format!("u{i:04}"), "n": i })))
            .await
            .unwrap();
    }
    store
}

#[tokio::test]
async fn test_insert_rejects_duplicate_and_missing_id() {
    let store = seeded(1).await;
    let dup = store
        .insert_one(&users(), document(json!({ "_id": "u0000" })))
        .await
        .unwrap_err();
    assert!(matches!(dup, StoreError::DuplicateId { .. }));

    let missing = store
        .insert_one(&users(), document(json!({ "name": "anon" })))
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::MissingId { .. }));
}

#[tokio::test]
async fn test_cursor_batches_in_id_order() {
    let store = seeded(7).await;
    let mut cursor = store.open_cursor(&users(), &Filter::All, 3).await.unwrap();
    assert_eq!(store.open_cursors(), 1);

    let mut sizes = Vec::new();
    let mut ids = Vec::new();
    loop {
        let batch = cursor.next_batch().await.unwrap();
        if batch.is_empty() {
            break;
        }
        sizes.push(batch.len());
        ids.extend(batch.iter().map(|d| d.id().unwrap().to_string()));
    }
    assert_eq!(sizes, vec![3, 3, 1]);
    assert_eq!(ids.first().map(String::as_str), Some("u0000"));
    assert_eq!(ids.last().map(String::as_str), Some("u0006"));

    cursor.close();
    cursor.close();
    assert_eq!(store.open_cursors(), 0);
    assert!(cursor.is_closed());
}

#[tokio::test]
async fn test_cursor_does_not_revisit_updated_documents() {
    let store = seeded(4).await;
    let flag = FieldPath::new("flag");
    let mut cursor = store
        .open_cursor(&users(), &Filter::missing(&flag), 2)
        .await
        .unwrap();

    let mut seen = 0;
    loop {
        let batch = cursor.next_batch().await.unwrap();
        if batch.is_empty() {
            break;
        }
        for doc in batch {
            seen += 1;
            store
                .update_one(&users(), doc.id().unwrap(), &Update::set_one(&flag, true))
                .await
                .unwrap();
        }
    }
    cursor.close();
    assert_eq!(seen, 4);
}

#[tokio::test]
async fn test_update_one_and_many() {
    let store = seeded(3).await;
    let status = FieldPath::new("status");

    assert!(store
        .update_one(&users(), "u0001", &Update::set_one(&status, "active"))
        .await
        .unwrap());
    assert!(!store
        .update_one(&users(), "nope", &Update::set_one(&status, "active"))
        .await
        .unwrap());

    let changed = store
        .update_many(&users(), &Filter::missing(&status), &Update::set_one(&status, "new"))
        .await
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(
        store
            .count(&users(), &Filter::eq(&status, "new"))
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_delete_and_drop() {
    let store = seeded(5).await;
    let removed = store
        .delete_many(&users(), &Filter::eq(&FieldPath::new("n"), 2))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count(&users(), &Filter::All).await.unwrap(), 4);

    assert!(store.drop_collection(&users()).await.unwrap());
    assert!(!store.drop_collection(&users()).await.unwrap());
    assert!(!store.collection_exists(&users()).await.unwrap());
}

#[tokio::test]
async fn test_rename_collection() {
    let store = seeded(2).await;
    let people = CollectionName::new("people");

    store.rename_collection(&users(), &people).await.unwrap();
    assert!(!store.collection_exists(&users()).await.unwrap());
    assert_eq!(store.documents("people").unwrap().len(), 2);

    let err = store.rename_collection(&users(), &people).await.unwrap_err();
    assert!(matches!(err, StoreError::CollectionExists(_)));

    let err = store
        .rename_collection(&users(), &CollectionName::new("other"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::CollectionNotFound(_)));
}

#[tokio::test]
async fn test_drop_index() {
    let store = seeded(1).await;
    let idx = IndexName::new("users_n_idx");
    store.create_index(&users(), &idx).unwrap();

    assert!(store.drop_index(&users(), &idx).await.unwrap());
    assert!(!store.drop_index(&users(), &idx).await.unwrap());
    assert!(!store.has_index("users", "users_n_idx").unwrap());
}

#[tokio::test]
async fn test_simulated_failures() {
    let store = seeded(1).await;
    store.fail_writes_to("users").unwrap();
    let err = store
        .update_one(&users(), "u0000", &Update::set_one(&FieldPath::new("x"), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ExecutionError(_)));

    store.fail_reads_from("users").unwrap();
    assert!(store.open_cursor(&users(), &Filter::All, 10).await.is_err());
    assert_eq!(store.open_cursors(), 0);

    store.clear_failures().unwrap();
    assert_eq!(store.count(&users(), &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn test_replace_one_upsert() {
    let store = MemoryStore::new();
    let status = CollectionName::new("_migration_status");
    let doc = document(json!({ "_id": "migration_status", "lastAppliedSequenceNumber": 1 }));

    assert!(!store.replace_one(&status, doc.clone(), false).await.unwrap());
    assert!(store.replace_one(&status, doc, true).await.unwrap());
    assert_eq!(store.documents("_migration_status").unwrap().len(), 1);
}
