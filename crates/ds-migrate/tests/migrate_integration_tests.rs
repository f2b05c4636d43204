//! End-to-end runs of the migration engine against both store backends.
//!
//! Each scenario seeds a store, registers template units, runs the runner
//! and checks the documents, the report and the persisted checkpoint.

use async_trait::async_trait;
use ds_core::{
    document, ClassNameRename, CollectionName, Config, Document, FieldPath, Filter,
};
use ds_migrate::templates::{AddFieldIfAbsent, BackfillFromParent, RenameDiscriminator};
use ds_migrate::{
    registry_from_defs, MigrationContext, MigrationError, MigrationRegistry, MigrationResult,
    MigrationRunner, MigrationUnit, Outcome, RunStatus, ScopedCursor, UnitSummary,
};
use ds_store::{DocumentStore, DuckDbStore, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────────────

fn backends() -> Vec<Arc<dyn DocumentStore>> {
    vec![
        Arc::new(MemoryStore::new()),
        Arc::new(DuckDbStore::in_memory().unwrap()),
    ]
}

async fn seed(store: &dyn DocumentStore, collection: &str, docs: Vec<Value>) {
    let collection = CollectionName::new(collection);
    for doc in docs {
        store.insert_one(&collection, document(doc)).await.unwrap();
    }
}

async fn snapshot(store: &dyn DocumentStore, collection: &str) -> Vec<Document> {
    let mut cursor = ScopedCursor::open(store, &CollectionName::new(collection), &Filter::All, 50)
        .await
        .unwrap();
    let mut docs = Vec::new();
    while let Some(doc) = cursor.next().await.unwrap() {
        docs.push(doc);
    }
    docs
}

fn single(seq: u32, name: &str, unit: impl MigrationUnit + Clone + 'static) -> MigrationRegistry {
    MigrationRegistry::builder()
        .register(seq, name, move || unit.clone())
        .build()
        .unwrap()
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_users_get_disabled_flag() {
    for store in backends() {
        seed(
            store.as_ref(),
            "users",
            vec![
                json!({ "_id": "u1", "email": "a@example.com" }),
                json!({ "_id": "u2", "email": "b@example.com", "disabled": true }),
                json!({ "_id": "u3", "email": "c@example.com" }),
            ],
        )
        .await;
        let unit = AddFieldIfAbsent::new(
            CollectionName::new("users"),
            FieldPath::new("disabled"),
            false,
        );
        let mut runner = MigrationRunner::new(
            single(1, "add_disabled_to_users", unit),
            Arc::clone(&store),
        );

        let report = runner.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Completed, "{}", store.store_type());
        let counters = report.entries[0].counters.clone().unwrap();
        assert_eq!(counters.get("updated"), 2);

        let users = snapshot(store.as_ref(), "users").await;
        let flags: Vec<&Value> = users.iter().map(|u| &u["disabled"]).collect();
        assert_eq!(flags, vec![&json!(false), &json!(true), &json!(false)]);
    }
}

#[tokio::test]
async fn test_backfill_tolerates_orphan() {
    for store in backends() {
        seed(
            store.as_ref(),
            "apps",
            vec![
                json!({ "_id": "app1", "accountId": "acc1" }),
                json!({ "_id": "app2", "accountId": "acc2" }),
            ],
        )
        .await;
        seed(
            store.as_ref(),
            "infrastructureDefinitions",
            vec![
                json!({ "_id": "i1", "appId": "app1" }),
                json!({ "_id": "i2", "appId": "app2" }),
                json!({ "_id": "i3", "appId": "deleted-app" }),
            ],
        )
        .await;
        let unit = BackfillFromParent::new(
            CollectionName::new("infrastructureDefinitions"),
            FieldPath::new("appId"),
            CollectionName::new("apps"),
            FieldPath::new("_id"),
            FieldPath::new("accountId"),
        );
        let mut runner =
            MigrationRunner::new(single(1, "backfill_account_id", unit), Arc::clone(&store));

        let report = runner.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        let counters = report.entries[0].counters.clone().unwrap();
        assert_eq!(counters.get("updated"), 2);
        assert_eq!(counters.get("skipped_missing_parent"), 1);

        let infra = snapshot(store.as_ref(), "infrastructureDefinitions").await;
        assert_eq!(infra[0]["accountId"], "acc1");
        assert_eq!(infra[1]["accountId"], "acc2");
        assert!(!infra[2].contains_key("accountId"));
    }
}

#[tokio::test]
async fn test_kubernetes_setup_class_rename() {
    for store in backends() {
        let mut docs: Vec<Value> = (0..5)
            .map(|i| {
                json!({
                    "_id": format!("s{i}"),
                    "stateType": "KUBERNETES_SETUP",
                    "className": "OldSetupState"
                })
            })
            .collect();
        docs.push(json!({ "_id": "t1", "stateType": "HELM_DEPLOY", "className": "HelmState" }));
        seed(store.as_ref(), "stateExecutionInstances", docs).await;

        let unit = RenameDiscriminator::new(
            CollectionName::new("stateExecutionInstances"),
            FieldPath::new("stateType"),
            "KUBERNETES_SETUP",
            "KUBERNETES_SETUP",
        )
        .with_class_name(ClassNameRename {
            field: FieldPath::new("className"),
            from: "OldSetupState".to_string(),
            to: "NewSetupState".to_string(),
        });
        let mut runner =
            MigrationRunner::new(single(1, "rename_setup_class", unit), Arc::clone(&store));

        let report = runner.run().await.unwrap();
        let counters = report.entries[0].counters.clone().unwrap();
        assert_eq!(counters.get("updated"), 5);

        let states = snapshot(store.as_ref(), "stateExecutionInstances").await;
        let mismatched = states
            .iter()
            .filter(|d| d["stateType"] == "KUBERNETES_SETUP" && d["className"] != "NewSetupState")
            .count();
        assert_eq!(mismatched, 0);
        assert_eq!(states[5]["className"], "HelmState");
    }
}

// ── Idempotence ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_templates_are_idempotent() {
    let units: Vec<(&str, Box<dyn MigrationUnit>)> = vec![
        (
            "users",
            Box::new(AddFieldIfAbsent::computed(
                CollectionName::new("users"),
                FieldPath::new("profile.displayName"),
                |doc| doc.get("email").cloned().unwrap_or(Value::Null),
            )),
        ),
        (
            "users",
            Box::new(BackfillFromParent::new(
                CollectionName::new("users"),
                FieldPath::new("orgId"),
                CollectionName::new("orgs"),
                FieldPath::new("_id"),
                FieldPath::new("region"),
            )),
        ),
        (
            "users",
            Box::new(RenameDiscriminator::new(
                CollectionName::new("users"),
                FieldPath::new("kind"),
                "ADMIN",
                "ACCOUNT_ADMIN",
            )),
        ),
    ];

    for store in backends() {
        seed(
            store.as_ref(),
            "orgs",
            vec![
                json!({ "_id": "o1", "region": "eu" }),
                json!({ "_id": "o2" }),
            ],
        )
        .await;
        seed(
            store.as_ref(),
            "users",
            vec![
                json!({ "_id": "u1", "email": "a@x.io", "orgId": "o1", "kind": "ADMIN" }),
                json!({ "_id": "u2", "orgId": "o2", "kind": "USER" }),
                json!({ "_id": "u3", "orgId": "o9", "profile": { "displayName": "kept" } }),
                json!({ "_id": "u4", "kind": "ADMIN", "region": null }),
                json!({ "_id": "u5", "profile": "flat-string-is-left-alone", "email": "e@x.io" }),
            ],
        )
        .await;
        let ctx = MigrationContext::new(Arc::clone(&store), 2);

        // u5's scalar `profile` makes the nested add fail on every attempt
        for (collection, unit) in &units {
            let first = unit.apply(&ctx).await;
            let after_first = snapshot(store.as_ref(), collection).await;
            let second = unit.apply(&ctx).await;
            let after_second = snapshot(store.as_ref(), collection).await;

            assert_eq!(after_first, after_second, "{}", store.store_type());
            if let Ok(summary) = second {
                assert_eq!(summary.get("updated"), 0);
            } else {
                assert!(first.is_err());
            }
        }
    }
}

// ── Resource bounds ────────────────────────────────────────────────────

#[tokio::test]
async fn test_large_collection_streams_in_bounded_batches() {
    let store = MemoryStore::new();
    let events = CollectionName::new("events");
    for i in 0..10_000 {
        store
            .insert_one(&events, document(json!({ "_id": format!("e{i:05}"), "n": i })))
            .await
            .unwrap();
    }

    let mut cursor = ScopedCursor::open(&store, &events, &Filter::All, 64)
        .await
        .unwrap();
    let mut seen = 0;
    let mut max_buffered = 0;
    while cursor.has_next().await.unwrap() {
        max_buffered = max_buffered.max(cursor.buffered());
        cursor.next().await.unwrap();
        seen += 1;
    }
    assert_eq!(seen, 10_000);
    assert!(max_buffered <= 64);

    let unit = AddFieldIfAbsent::new(events.clone(), FieldPath::new("archived"), false);
    let mut runner = MigrationRunner::new(single(1, "archive_flag", unit), Arc::new(store.clone()))
        .with_batch_size(64);
    let report = runner.run().await.unwrap();
    assert_eq!(report.entries[0].counters.clone().unwrap().get("updated"), 10_000);
    assert_eq!(store.open_cursors(), 0);
}

/// Reads one document, then fails
#[derive(Clone)]
struct FailsMidScan;

#[async_trait]
impl MigrationUnit for FailsMidScan {
    async fn apply(&self, ctx: &MigrationContext) -> MigrationResult<UnitSummary> {
        let mut cursor = ctx.cursor(&CollectionName::new("users"), &Filter::All).await?;
        cursor.next().await?;
        Err(MigrationError::unit_logic("unexpected document shape"))
    }
}

#[tokio::test]
async fn test_failed_unit_releases_its_cursor() {
    let memory = MemoryStore::new();
    let duck = DuckDbStore::in_memory().unwrap();
    let (memory_handle, duck_handle) = (memory.clone(), duck.clone());
    let stores: Vec<(Arc<dyn DocumentStore>, Box<dyn Fn() -> usize>)> = vec![
        (Arc::new(memory), Box::new(move || memory_handle.open_cursors())),
        (Arc::new(duck), Box::new(move || duck_handle.open_cursors())),
    ];

    for (store, open_cursors) in stores {
        seed(
            store.as_ref(),
            "users",
            vec![json!({ "_id": "u1" }), json!({ "_id": "u2" }), json!({ "_id": "u3" })],
        )
        .await;
        let mut runner = MigrationRunner::new(single(1, "fails", FailsMidScan), Arc::clone(&store))
            .with_batch_size(1);

        let report = runner.run().await.unwrap();
        assert_eq!(report.entries[0].outcome, Outcome::Failed);
        assert_eq!(open_cursors(), 0);
    }
}

// ── Declarative config on a persistent store ───────────────────────────

const CONFIG: &str = r#"
name: platform
store:
  type: duckdb
  path: PLACEHOLDER
batch_size: 2
migrations:
  - sequence: 1
    name: add_disabled_to_users
    kind: add_field
    collection: users
    field: disabled
    value: false
  - sequence: 2
    name: backfill_account_id
    kind: backfill_from_parent
    collection: infrastructureDefinitions
    foreign_key: appId
    parent_collection: apps
    parent_key: _id
    target_field: accountId
  - sequence: 3
    name: archive_legacy_users
    kind: rename_collection
    from: legacyUsers
    to: archivedUsers
"#;

#[tokio::test]
async fn test_config_driven_run_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("platform.duckdb");
    let yaml = CONFIG.replace("PLACEHOLDER", &db_path.display().to_string());
    let config_path = dir.path().join("docshift.yml");
    std::fs::write(&config_path, yaml).unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();

    {
        let store: Arc<dyn DocumentStore> = ds_store::connect(&config.store).unwrap();
        seed(store.as_ref(), "users", vec![json!({ "_id": "u1" })]).await;
        seed(store.as_ref(), "apps", vec![json!({ "_id": "a1", "accountId": "acc1" })]).await;
        seed(
            store.as_ref(),
            "infrastructureDefinitions",
            vec![json!({ "_id": "i1", "appId": "a1" })],
        )
        .await;
        seed(store.as_ref(), "legacyUsers", vec![json!({ "_id": "l1" })]).await;

        let registry = registry_from_defs(&config.migrations).unwrap();
        let mut runner = MigrationRunner::from_config(&config, registry, store);
        let report = runner.run().await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.final_checkpoint.get(), 3);
    }

    // Fresh process: same config, same file
    let store = ds_store::connect(&config.store).unwrap();
    let registry = registry_from_defs(&config.migrations).unwrap();
    let mut runner = MigrationRunner::from_config(&config, registry, Arc::clone(&store));
    assert!(runner.status().await.unwrap().is_up_to_date());

    let report = runner.run().await.unwrap();
    assert!(report.entries.is_empty());
    assert_eq!(report.initial_checkpoint.get(), 3);

    assert!(store
        .collection_exists(&CollectionName::new("archivedUsers"))
        .await
        .unwrap());
    let infra = snapshot(store.as_ref(), "infrastructureDefinitions").await;
    assert_eq!(infra[0]["accountId"], "acc1");
}
