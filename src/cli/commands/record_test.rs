use std::sync::Arc;

use serde_json::{Value, json};

use crate::cli::commands::PageParams;
use crate::cli::commands::record::*;
use crate::cli::error::CliError;
use crate::db::{
    AdapterConfig, ConnectionConfig, ConnectionManager, MemoryBackend, PersistenceAdapter,
    SortOrder,
};

fn people() -> PersistenceAdapter<MemoryBackend> {
    let manager = Arc::new(ConnectionManager::new(
        MemoryBackend::new(),
        ConnectionConfig::from_url("memory://localhost/cli"),
    ));
    PersistenceAdapter::new(manager, AdapterConfig::new("people")).expect("adapter")
}

async fn seed(adapter: &PersistenceAdapter<MemoryBackend>) -> String {
    let mut last = String::new();
    for doc in [
        json!({"firstName": "John", "lastName": "Smith", "age": 40}),
        json!({"firstName": "Jane", "lastName": "Smith", "age": 35}),
        json!({"firstName": "Ada", "lastName": "Lovelace", "age": 36}),
    ] {
        let output = save_record(adapter, &doc.to_string(), "json")
            .await
            .expect("save should succeed");
        let saved: Value = serde_json::from_str(&output).unwrap();
        last = saved["id"]["$oid"].as_str().unwrap().to_string();
    }
    last
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_record_table_output() {
    let adapter = people();
    let output = save_record(&adapter, r#"{"firstName": "John"}"#, "table")
        .await
        .expect("save should succeed");
    assert!(output.starts_with("Inserted people "), "{}", output);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_save_record_json_output_then_update() {
    let adapter = people();
    let output = save_record(&adapter, r#"{"firstName": "John"}"#, "json")
        .await
        .unwrap();
    let saved: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(saved["operation"], "insert");

    let id = saved["id"]["$oid"].as_str().unwrap();
    let update = json!({"_id": id, "firstName": "Johnny"}).to_string();
    let output = save_record(&adapter, &update, "table").await.unwrap();
    assert_eq!(output, format!("Updated people {}", id));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_records_json_with_query_and_sort() {
    let adapter = people();
    seed(&adapter).await;

    let page = PageParams {
        sort: Some("age"),
        order: Some("desc"),
        ..PageParams::default()
    };
    let output = find_records(&adapter, Some(r#"{"lastName": "Smith"}"#), page, "json")
        .await
        .expect("find should succeed");
    let found: Vec<Value> = serde_json::from_str(&output).unwrap();
    let names: Vec<&str> = found
        .iter()
        .map(|r| r["firstName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["John", "Jane"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_records_table_lists_all_columns() {
    let adapter = people();
    seed(&adapter).await;

    let output = find_records(&adapter, None, PageParams::default(), "table")
        .await
        .unwrap();
    assert!(output.contains("firstName"));
    assert!(output.contains("lastName"));
    assert!(output.contains("Lovelace"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_records_empty() {
    let adapter = people();
    let output = find_records(&adapter, None, PageParams::default(), "table")
        .await
        .unwrap();
    assert_eq!(output, "No people records found.");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_records_rejects_bad_query() {
    let adapter = people();
    let err = find_records(&adapter, Some("[1, 2]"), PageParams::default(), "json")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidJson { .. }));

    let err = find_records(&adapter, Some("{not json"), PageParams::default(), "json")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidJson { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_format_is_rejected() {
    let adapter = people();
    let err = find_records(&adapter, None, PageParams::default(), "yaml")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_record_by_id() {
    let adapter = people();
    let id = seed(&adapter).await;

    let output = get_record(&adapter, &id, "json").await.unwrap();
    let record: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(record["firstName"], "Ada");

    let table = get_record(&adapter, &id, "table").await.unwrap();
    assert!(table.contains("Field"));
    assert!(table.contains("Lovelace"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_record_not_found() {
    let adapter = people();
    let err = get_record(&adapter, "65a1f0c2e4b0a1b2c3d4e5f6", "table")
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_record_invalid_id() {
    let adapter = people();
    let err = get_record(&adapter, "nope", "table").await.unwrap_err();
    assert!(matches!(err, CliError::Db(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_record() {
    let adapter = people();
    let id = seed(&adapter).await;

    let output = remove_record(&adapter, &id).await.unwrap();
    assert_eq!(output, format!("Removed people {}", id));

    let err = get_record(&adapter, &id, "json").await.unwrap_err();
    assert!(matches!(err, CliError::NotFound { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_distinct_values() {
    let adapter = people();
    seed(&adapter).await;

    let output = distinct_values(&adapter, "lastName", None, "json")
        .await
        .unwrap();
    let values: Vec<Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(values, vec![json!("Smith"), json!("Lovelace")]);

    let table = distinct_values(&adapter, "lastName", None, "table")
        .await
        .unwrap();
    assert!(table.contains("lastName"));
    assert!(table.contains("Smith"));
}

#[test]
fn test_page_params_to_find_options() {
    let page = PageParams {
        limit: Some(5),
        skip: Some(2),
        sort: Some("age"),
        order: None,
        fields: Some("firstName, age"),
    };
    let options = page.to_find_options().unwrap();
    assert_eq!(options.limit, Some(5));
    assert_eq!(options.skip, Some(2));
    assert_eq!(options.sort.as_ref().map(|s| s.order), Some(SortOrder::Asc));
    assert_eq!(
        options.fields,
        Some(vec!["firstName".to_string(), "age".to_string()])
    );
}

#[test]
fn test_page_params_accepts_order_in_any_case() {
    let page = PageParams {
        sort: Some("age"),
        order: Some("DESC"),
        ..PageParams::default()
    };
    let options = page.to_find_options().unwrap();
    assert_eq!(options.sort.map(|s| s.order), Some(SortOrder::Desc));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_find_rejects_unknown_sort_order() {
    let adapter = people();
    let page = PageParams {
        sort: Some("age"),
        order: Some("dsc"),
        ..PageParams::default()
    };
    let err = find_records(&adapter, None, page, "json").await.unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument { .. }));
}
