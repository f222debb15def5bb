use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::{Department, DepartmentHires, Employee, EntityKind, Job, QuarterlyHires};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("duplicate key value violates unique constraint on {table}: id {id}")]
    UniqueViolation { table: &'static str, id: i32 },
    #[error("insert on {table} violates foreign key {column}: {id} does not exist")]
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
        id: i32,
    },
}

/// What to do when a row's primary identifier is already taken at insert
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave the existing row alone and omit the id from the returned set.
    Skip,
    /// Abort the whole transaction.
    Fail,
}

/// A homogeneous set of records written in a single transaction.
#[derive(Debug, Clone)]
pub enum RecordBatch {
    Departments(Vec<Department>),
    Jobs(Vec<Job>),
    Employees(Vec<Employee>),
}

impl RecordBatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordBatch::Departments(_) => EntityKind::Department,
            RecordBatch::Jobs(_) => EntityKind::Job,
            RecordBatch::Employees(_) => EntityKind::Employee,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Departments(rows) => rows.len(),
            RecordBatch::Jobs(rows) => rows.len(),
            RecordBatch::Employees(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Full scan of the primary identifiers currently stored for `kind`.
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i32>, StoreError>;

    /// Inserts every record of `batch` in one transaction and returns the ids
    /// that were written. Any error rolls the whole batch back.
    async fn insert_batch(&self, batch: RecordBatch, policy: ConflictPolicy) -> Result<Vec<i32>, StoreError>;

    async fn quarterly_hires(&self, year: i32) -> Result<Vec<QuarterlyHires>, StoreError>;

    async fn departments_above_mean(&self, year: i32) -> Result<Vec<DepartmentHires>, StoreError>;
}
