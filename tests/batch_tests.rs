mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use hiring_ledger::db::MemoryStore;
use hiring_ledger::models::EntityKind;

fn batch_request(payload: Value) -> test::TestRequest {
    test::TestRequest::post().uri("/employees/batch").set_json(payload)
}

fn employee_json(id: i32, department_id: i32, job_id: i32) -> Value {
    json!({
        "id": id,
        "name": format!("Employee {}", id),
        "hired_at": "2021-03-14T08:00:00Z",
        "department_id": department_id,
        "job_id": job_id,
    })
}

#[actix_web::test]
async fn inserts_a_valid_batch() {
    let store = Arc::new(MemoryStore::new());
    seed_reference_data(&store, &[(1, "Sales")], &[(1, "Clerk")]).await;

    let (status, body) = send(
        store.clone(),
        batch_request(json!([employee_json(1, 1, 1), employee_json(2, 1, 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "2 employees inserted");
    assert_eq!(ids(&store, EntityKind::Employee).await, HashSet::from([1, 2]));
}

#[actix_web::test]
async fn payload_must_be_a_list() {
    let store = Arc::new(CountingStore::default());

    let (status, body) = send(store.clone(), batch_request(employee_json(1, 1, 1))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The payload must be a list");
    assert_eq!(store.calls(), 0);
}

#[actix_web::test]
async fn oversized_batch_never_reaches_the_store() {
    let store = Arc::new(CountingStore::default());
    let records: Vec<Value> = (1..=1001).map(|id| employee_json(id, 1, 1)).collect();

    let (status, body) = send(store.clone(), batch_request(Value::Array(records))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "The number of records must be between 1 and 1000");
    assert_eq!(store.calls(), 0);
}

#[actix_web::test]
async fn empty_batch_is_rejected() {
    let store = Arc::new(CountingStore::default());

    let (status, _) = send(store.clone(), batch_request(json!([]))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.calls(), 0);
}

#[actix_web::test]
async fn records_must_match_the_employee_shape() {
    let store = Arc::new(CountingStore::default());

    let mut unknown_field = employee_json(1, 1, 1);
    unknown_field["salary"] = json!(1000);
    let (status, body) = send(store.clone(), batch_request(json!([unknown_field]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Record 1:"));

    let mut bad_date = employee_json(2, 1, 1);
    bad_date["hired_at"] = json!("14/03/2021");
    let (status, body) = send(store.clone(), batch_request(json!([employee_json(1, 1, 1), bad_date]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Record 2:"));

    assert_eq!(store.calls(), 0);
}

#[actix_web::test]
async fn duplicate_id_rolls_back_the_whole_batch() {
    let store = Arc::new(MemoryStore::new());
    seed_reference_data(&store, &[(1, "Sales")], &[(1, "Clerk")]).await;
    send(store.clone(), batch_request(json!([employee_json(1, 1, 1)]))).await;

    let (status, body) = send(
        store.clone(),
        batch_request(json!([employee_json(2, 1, 1), employee_json(1, 1, 1)])),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(ids(&store, EntityKind::Employee).await, HashSet::from([1]));
}

#[actix_web::test]
async fn dangling_reference_returns_an_error_body() {
    let store = Arc::new(MemoryStore::new());
    seed_reference_data(&store, &[(1, "Sales")], &[(1, "Clerk")]).await;

    let (status, body) = send(store.clone(), batch_request(json!([employee_json(1, 4, 1)]))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "insert on employees violates foreign key department_id: 4 does not exist");
    assert!(ids(&store, EntityKind::Employee).await.is_empty());
}

#[actix_web::test]
async fn malformed_json_is_a_bad_request() {
    let store = Arc::new(CountingStore::default());
    let req = test::TestRequest::post()
        .uri("/employees/batch")
        .insert_header(("content-type", "application/json"))
        .set_payload("[{\"id\": ");

    let (status, body) = send(store.clone(), req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON payload"));
    assert_eq!(store.calls(), 0);
}
