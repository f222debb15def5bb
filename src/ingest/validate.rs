use log::debug;
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::parser::RawRow;
use crate::db::{RecordBatch, RecordStore, StoreError};
use crate::models::{Department, Employee, EntityKind, Job};

/// Why a row was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Incorrect number of fields: expected {expected}, found {found}.")]
    FieldCount { expected: usize, found: usize },
    #[error("The '{column}' field is invalid or empty.")]
    InvalidId { column: &'static str },
    #[error("ID '{id}' already exists.")]
    DuplicateId { id: i32 },
    #[error("The {column} '{id}' does not exist.")]
    ForeignKeyNotFound { column: &'static str, id: i32 },
}

/// A skipped row as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub line: usize,
    pub data: Vec<String>,
    #[serde(rename = "error", serialize_with = "serialize_reason")]
    pub reason: RejectReason,
}

fn serialize_reason<S: Serializer>(reason: &RejectReason, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted<R> {
    pub line: usize,
    pub data: Vec<String>,
    pub record: R,
}

#[derive(Debug)]
pub struct Validated<R> {
    pub accepted: Vec<Accepted<R>>,
    pub rejected: Vec<Rejection>,
}

/// A row's fields keyed by the column names of the target table.
pub struct FieldMap<'a> {
    fields: HashMap<&'static str, &'a str>,
}

impl<'a> FieldMap<'a> {
    fn zip(columns: &[&'static str], values: &'a [String]) -> Self {
        FieldMap {
            fields: columns.iter().copied().zip(values.iter().map(String::as_str)).collect(),
        }
    }

    pub fn text(&self, column: &'static str) -> String {
        self.fields.get(column).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn id(&self, column: &'static str) -> Result<i32, RejectReason> {
        self.fields
            .get(column)
            .and_then(|v| v.trim().parse::<i32>().ok())
            .ok_or(RejectReason::InvalidId { column })
    }
}

/// A table that can be loaded from headerless CSV rows.
pub trait CsvRecord: Sized + Clone {
    const KIND: EntityKind;
    /// Column names, in file order.
    const COLUMNS: &'static [&'static str];
    /// Collections this record points into.
    const REFERENCES: &'static [EntityKind] = &[];

    /// Builds the record, parsing every identifier column.
    fn from_fields(fields: &FieldMap<'_>) -> Result<Self, RejectReason>;

    fn id(&self) -> i32;

    /// `(column, collection, id)` for each foreign key, in check order.
    fn foreign_keys(&self) -> Vec<(&'static str, EntityKind, i32)> {
        Vec::new()
    }

    fn into_batch(records: Vec<Self>) -> RecordBatch;
}

impl CsvRecord for Department {
    const KIND: EntityKind = EntityKind::Department;
    const COLUMNS: &'static [&'static str] = &["id", "department"];

    fn from_fields(fields: &FieldMap<'_>) -> Result<Self, RejectReason> {
        Ok(Department {
            id: fields.id("id")?,
            name: fields.text("department"),
        })
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn into_batch(records: Vec<Self>) -> RecordBatch {
        RecordBatch::Departments(records)
    }
}

impl CsvRecord for Job {
    const KIND: EntityKind = EntityKind::Job;
    const COLUMNS: &'static [&'static str] = &["id", "job"];

    fn from_fields(fields: &FieldMap<'_>) -> Result<Self, RejectReason> {
        Ok(Job {
            id: fields.id("id")?,
            name: fields.text("job"),
        })
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn into_batch(records: Vec<Self>) -> RecordBatch {
        RecordBatch::Jobs(records)
    }
}

impl CsvRecord for Employee {
    const KIND: EntityKind = EntityKind::Employee;
    const COLUMNS: &'static [&'static str] = &["id", "name", "hired_at", "department_id", "job_id"];
    const REFERENCES: &'static [EntityKind] = &[EntityKind::Department, EntityKind::Job];

    fn from_fields(fields: &FieldMap<'_>) -> Result<Self, RejectReason> {
        Ok(Employee {
            id: fields.id("id")?,
            name: fields.text("name"),
            hired_at: fields.text("hired_at"),
            department_id: fields.id("department_id")?,
            job_id: fields.id("job_id")?,
        })
    }

    fn id(&self) -> i32 {
        self.id
    }

    fn foreign_keys(&self) -> Vec<(&'static str, EntityKind, i32)> {
        vec![
            ("department_id", EntityKind::Department, self.department_id),
            ("job_id", EntityKind::Job, self.job_id),
        ]
    }

    fn into_batch(records: Vec<Self>) -> RecordBatch {
        RecordBatch::Employees(records)
    }
}

/// Identifiers considered taken while a batch is validated. `taken` grows as
/// rows are accepted; the reference sets stay as loaded.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    taken: HashSet<i32>,
    references: HashMap<EntityKind, HashSet<i32>>,
}

impl Snapshot {
    pub fn new(taken: HashSet<i32>) -> Self {
        Snapshot {
            taken,
            references: HashMap::new(),
        }
    }

    pub fn with_references(mut self, kind: EntityKind, ids: HashSet<i32>) -> Self {
        self.references.insert(kind, ids);
        self
    }

    /// One full scan of the target collection and of every collection `R`
    /// references.
    pub async fn load<R: CsvRecord>(store: &dyn RecordStore) -> Result<Self, StoreError> {
        let mut snapshot = Snapshot::new(store.existing_ids(R::KIND).await?);
        for kind in R::REFERENCES {
            let ids = store.existing_ids(*kind).await?;
            snapshot = snapshot.with_references(*kind, ids);
        }
        Ok(snapshot)
    }

    fn is_taken(&self, id: i32) -> bool {
        self.taken.contains(&id)
    }

    fn references(&self, kind: EntityKind, id: i32) -> bool {
        self.references.get(&kind).is_some_and(|ids| ids.contains(&id))
    }
}

/// Sorts every non-blank row into accepted records or rejections, stopping
/// at the first failing check for each row.
pub fn validate_rows<R: CsvRecord>(rows: Vec<RawRow>, snapshot: &mut Snapshot) -> Validated<R> {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for RawRow { line, fields } in rows {
        if fields.is_empty() {
            continue;
        }
        match check_row::<R>(&fields, snapshot) {
            Ok(record) => {
                snapshot.taken.insert(record.id());
                accepted.push(Accepted {
                    line,
                    data: fields,
                    record,
                });
            }
            Err(reason) => {
                debug!("Skipping {} row {}: {}", R::KIND.table_name(), line, reason);
                rejected.push(Rejection {
                    line,
                    data: fields,
                    reason,
                });
            }
        }
    }

    Validated { accepted, rejected }
}

fn check_row<R: CsvRecord>(fields: &[String], snapshot: &Snapshot) -> Result<R, RejectReason> {
    if fields.len() != R::COLUMNS.len() {
        return Err(RejectReason::FieldCount {
            expected: R::COLUMNS.len(),
            found: fields.len(),
        });
    }

    let record = R::from_fields(&FieldMap::zip(R::COLUMNS, fields))?;

    if snapshot.is_taken(record.id()) {
        return Err(RejectReason::DuplicateId { id: record.id() });
    }
    for (column, kind, id) in record.foreign_keys() {
        if !snapshot.references(kind, id) {
            return Err(RejectReason::ForeignKeyNotFound { column, id });
        }
    }
    Ok(record)
}
