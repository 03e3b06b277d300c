//! End-to-end tests for the save / find / remove lifecycle on every backend.

use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use serde_json::{Value, json};

use crate::db::{
    AdapterConfig, Backend, BeforeSave, ConnectionConfig, ConnectionManager, ConnectionState,
    DbError, DbResult, MemoryBackend, PersistenceAdapter, Record, SaveOperation, record_from_value,
    with_callback,
};
#[cfg(feature = "sqlite")]
use crate::db::SqliteBackend;

fn record(value: Value) -> Record {
    record_from_value(value).expect("test record must be an object")
}

fn first_name(name: &str) -> Record {
    record(json!({ "firstName": name }))
}

async fn people_lifecycle<B: Backend>(backend: B, config: ConnectionConfig) {
    let manager = Arc::new(ConnectionManager::new(backend, config));
    let people = PersistenceAdapter::new(Arc::clone(&manager), AdapterConfig::new("people"))
        .expect("adapter should build");
    let pk = people.primary_key().to_string();

    assert!(people.find_all(None, None).await.unwrap().is_empty());

    let inserted = people
        .save(record(json!({"firstName": "John", "lastName": "Smith"})))
        .await
        .expect("insert should succeed");
    assert_eq!(inserted.operation, SaveOperation::Insert);
    let id = inserted.id_string().expect("insert should assign an id");
    assert_eq!(people.id_of(&inserted.record), Some(id.clone()));

    let mut update = Record::new();
    update.insert(pk.clone(), json!(id));
    update.insert("firstName".to_string(), json!("John"));
    update.insert("lastName".to_string(), json!("Williams"));
    let updated = people.save(update).await.expect("update should succeed");
    assert_eq!(updated.operation, SaveOperation::Update);
    assert_eq!(updated.id, inserted.id);

    let found = people
        .find_one(Some(&first_name("John")), None)
        .await
        .unwrap()
        .expect("John should be found");
    assert_eq!(found.get("lastName"), Some(&json!("Williams")));
    assert_eq!(found.get(&pk), Some(&inserted.id));
    assert_eq!(people.find_all(None, None).await.unwrap().len(), 1);

    people.remove(id.as_str()).await.expect("remove should succeed");
    let gone = people.find_one(Some(&first_name("John")), None).await.unwrap();
    assert_eq!(gone, None);

    assert_eq!(manager.attempts(), 1);
    assert_eq!(manager.state(), ConnectionState::Open);
}

async fn concurrent_saves_share_one_connection<B: Backend>(backend: B, config: ConnectionConfig) {
    let manager = Arc::new(ConnectionManager::new(backend, config));
    let people = Arc::new(
        PersistenceAdapter::new(Arc::clone(&manager), AdapterConfig::new("people")).unwrap(),
    );

    let saves = (0..10).map(|n| {
        let people = Arc::clone(&people);
        tokio::spawn(async move { people.save(record(json!({"n": n}))).await })
    });
    for result in join_all(saves).await {
        result.expect("task should not panic").expect("save should succeed");
    }

    assert_eq!(manager.attempts(), 1);
    assert_eq!(people.find_all(None, None).await.unwrap().len(), 10);
}

async fn hook_and_callback_boundary<B: Backend>(backend: B, config: ConnectionConfig) {
    let manager = Arc::new(ConnectionManager::new(backend, config));
    let hook = BeforeSave::callback(|record, done| {
        if record.contains_key("lastName") {
            record.insert("initials".to_string(), json!("JS"));
            done.done();
        } else {
            done.fail("lastName is required");
        }
    });
    let people = Arc::new(
        PersistenceAdapter::new(manager, AdapterConfig::new("people").with_before_save(hook))
            .unwrap(),
    );

    let seen: Arc<Mutex<Vec<DbResult<Option<String>>>>> = Arc::new(Mutex::new(vec![]));

    let sink = Arc::clone(&seen);
    let adapter = Arc::clone(&people);
    with_callback(
        async move {
            let saved = adapter
                .save(record(json!({"firstName": "John", "lastName": "Smith"})))
                .await?;
            Ok::<_, DbError>(
                saved
                    .record
                    .get("initials")
                    .and_then(Value::as_str)
                    .map(String::from),
            )
        },
        move |result| sink.lock().unwrap().push(result),
    )
    .await
    .unwrap();

    let sink = Arc::clone(&seen);
    let adapter = Arc::clone(&people);
    with_callback(
        async move {
            adapter.save(first_name("Jane")).await?;
            Ok::<_, DbError>(None)
        },
        move |result| sink.lock().unwrap().push(result),
    )
    .await
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], Ok(Some("JS".to_string())));
    assert!(seen[1].is_err());
    drop(seen);

    let stored = people.find_all(None, None).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get("initials"), Some(&json!("JS")));
}

async fn punctuated_field_names<B: Backend>(backend: B, config: ConnectionConfig) {
    let manager = Arc::new(ConnectionManager::new(backend, config));
    let people = PersistenceAdapter::new(manager, AdapterConfig::new("people")).unwrap();

    let john = record(json!({"first-name": "John", "home town": "Leeds"}));
    people.save(john.clone()).await.expect("save should succeed");
    people
        .save(record(json!({"first-name": "Jane", "home town": "York"})))
        .await
        .unwrap();

    let found = people
        .find_all(Some(&john), None)
        .await
        .expect("query by stored fields should succeed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("first-name"), Some(&json!("John")));

    let towns = people.distinct("home town", None).await.unwrap();
    assert_eq!(towns, vec![json!("Leeds"), json!("York")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_people_lifecycle() {
    people_lifecycle(
        MemoryBackend::new(),
        ConnectionConfig::from_url("memory://localhost/integration_test"),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_people_lifecycle_by_address_with_credentials() {
    people_lifecycle(
        MemoryBackend::new().with_user("admin", "secret"),
        ConnectionConfig::from_address("localhost", 27017, "integration_test")
            .with_credentials("admin", "secret"),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_concurrent_saves_share_one_connection() {
    concurrent_saves_share_one_connection(
        MemoryBackend::new(),
        ConnectionConfig::from_url("memory://localhost/integration_test"),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_hook_and_callback_boundary() {
    hook_and_callback_boundary(
        MemoryBackend::new(),
        ConnectionConfig::from_url("memory://localhost/integration_test"),
    )
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_punctuated_field_names() {
    punctuated_field_names(
        MemoryBackend::new(),
        ConnectionConfig::from_url("memory://localhost/integration_test"),
    )
    .await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread")]
async fn sqlite_people_lifecycle() {
    people_lifecycle(
        SqliteBackend::new(),
        ConnectionConfig::from_url("sqlite::memory:"),
    )
    .await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread")]
async fn sqlite_people_lifecycle_on_disk() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("integration_test.db");
    people_lifecycle(
        SqliteBackend::new(),
        ConnectionConfig::from_address("localhost", 0, path.display().to_string()),
    )
    .await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread")]
async fn sqlite_concurrent_saves_share_one_connection() {
    concurrent_saves_share_one_connection(
        SqliteBackend::new(),
        ConnectionConfig::from_url("sqlite::memory:"),
    )
    .await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread")]
async fn sqlite_hook_and_callback_boundary() {
    hook_and_callback_boundary(
        SqliteBackend::new(),
        ConnectionConfig::from_url("sqlite::memory:"),
    )
    .await;
}

#[cfg(feature = "sqlite")]
#[tokio::test(flavor = "multi_thread")]
async fn sqlite_punctuated_field_names() {
    punctuated_field_names(
        SqliteBackend::new(),
        ConnectionConfig::from_url("sqlite::memory:"),
    )
    .await;
}
