#![allow(dead_code)]

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hiring_ledger::db::{ConflictPolicy, MemoryStore, RecordBatch, RecordStore, StoreError};
use hiring_ledger::handlers;
use hiring_ledger::models::{Department, DepartmentHires, Employee, EntityKind, Job, QuarterlyHires};

pub const BOUNDARY: &str = "hiringledgerboundary";

pub enum Part<'a> {
    Text { name: &'a str, value: &'a str },
    File { name: &'a str, filename: &'a str, content: &'a str },
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> test::TestRequest {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!("--{}\r\n", BOUNDARY));
        match part {
            Part::Text { name, value } => {
                body.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name));
                body.push_str(value);
            }
            Part::File { name, filename, content } => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, filename
                ));
                body.push_str("Content-Type: text/csv\r\n\r\n");
                body.push_str(content);
            }
        }
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", BOUNDARY));

    test::TestRequest::post()
        .uri(uri)
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

pub fn upload_table(table: &str, filename: &str, content: &str) -> test::TestRequest {
    multipart_request(
        "/upload-csv",
        &[
            Part::Text { name: "table_name", value: table },
            Part::File { name: "file", filename, content },
        ],
    )
}

pub fn upload_employees(content: &str) -> test::TestRequest {
    multipart_request(
        "/employees/upload-csv",
        &[Part::File { name: "file", filename: "employees.csv", content }],
    )
}

/// Sends one request through a fresh app wired to `store`.
pub async fn send(store: Arc<dyn RecordStore>, req: test::TestRequest) -> (StatusCode, Value) {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(store))
            .configure(handlers::routes),
    )
    .await;
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

pub async fn seed_reference_data(store: &MemoryStore, departments: &[(i32, &str)], jobs: &[(i32, &str)]) {
    let departments = departments
        .iter()
        .map(|(id, name)| Department { id: *id, name: name.to_string() })
        .collect();
    let jobs = jobs
        .iter()
        .map(|(id, name)| Job { id: *id, name: name.to_string() })
        .collect();
    store
        .insert_batch(RecordBatch::Departments(departments), ConflictPolicy::Fail)
        .await
        .unwrap();
    store
        .insert_batch(RecordBatch::Jobs(jobs), ConflictPolicy::Fail)
        .await
        .unwrap();
}

pub fn employee(id: i32, hired_at: &str, department_id: i32, job_id: i32) -> Employee {
    Employee {
        id,
        name: format!("Employee {}", id),
        hired_at: hired_at.to_string(),
        department_id,
        job_id,
    }
}

pub async fn ids(store: &MemoryStore, kind: EntityKind) -> HashSet<i32> {
    store.existing_ids(kind).await.unwrap()
}

/// Reads succeed against empty tables; every write fails as if the
/// connection dropped mid-transaction.
pub struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn existing_ids(&self, _kind: EntityKind) -> Result<HashSet<i32>, StoreError> {
        Ok(HashSet::new())
    }

    async fn insert_batch(&self, _batch: RecordBatch, _policy: ConflictPolicy) -> Result<Vec<i32>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn quarterly_hires(&self, _year: i32) -> Result<Vec<QuarterlyHires>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }

    async fn departments_above_mean(&self, _year: i32) -> Result<Vec<DepartmentHires>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolTimedOut))
    }
}

/// Counts every call before delegating to an inner memory store.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i32>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.existing_ids(kind).await
    }

    async fn insert_batch(&self, batch: RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_batch(batch, policy).await
    }

    async fn quarterly_hires(&self, year: i32) -> Result<Vec<QuarterlyHires>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.quarterly_hires(year).await
    }

    async fn departments_above_mean(&self, year: i32) -> Result<Vec<DepartmentHires>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.departments_above_mean(year).await
    }
}

/// Reports no existing ids, so every row passes the snapshot check, while
/// the inner store already holds some of them. Models a concurrent writer
/// committing between the snapshot read and the insert.
pub struct RacingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl RecordStore for RacingStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i32>, StoreError> {
        match kind {
            EntityKind::Department => Ok(HashSet::new()),
            _ => self.inner.existing_ids(kind).await,
        }
    }

    async fn insert_batch(&self, batch: RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, StoreError> {
        self.inner.insert_batch(batch, policy).await
    }

    async fn quarterly_hires(&self, year: i32) -> Result<Vec<QuarterlyHires>, StoreError> {
        self.inner.quarterly_hires(year).await
    }

    async fn departments_above_mean(&self, year: i32) -> Result<Vec<DepartmentHires>, StoreError> {
        self.inner.departments_above_mean(year).await
    }
}
