use log::{info, warn};
use std::collections::HashSet;

use super::validate::{CsvRecord, RejectReason, Rejection, Validated};
use crate::db::{ConflictPolicy, RecordBatch, RecordStore, StoreError};
use crate::models::Employee;

/// Final tally of a CSV batch after the write committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub loaded: usize,
    pub rejected: Vec<Rejection>,
}

/// Writes every accepted record in one transaction. Rows whose id was taken
/// by another writer after the snapshot was read come back from the store
/// as not inserted and are reported as duplicates. Any store error discards
/// the whole batch, diagnostics included.
pub async fn persist<R: CsvRecord>(store: &dyn RecordStore, validated: Validated<R>) -> Result<BatchReport, StoreError> {
    let Validated { accepted, mut rejected } = validated;

    if accepted.is_empty() {
        return Ok(BatchReport { loaded: 0, rejected });
    }

    let records = accepted.iter().map(|a| a.record.clone()).collect();
    let inserted: HashSet<i32> = store
        .insert_batch(R::into_batch(records), ConflictPolicy::Skip)
        .await?
        .into_iter()
        .collect();

    let mut loaded = 0;
    for row in accepted {
        let id = row.record.id();
        if inserted.contains(&id) {
            loaded += 1;
        } else {
            warn!("{} id {} was taken concurrently, skipping line {}", R::KIND.table_name(), id, row.line);
            rejected.push(Rejection {
                line: row.line,
                data: row.data,
                reason: RejectReason::DuplicateId { id },
            });
        }
    }
    rejected.sort_by_key(|r| r.line);

    info!("Loaded {} {} records, skipped {}", loaded, R::KIND.table_name(), rejected.len());
    Ok(BatchReport { loaded, rejected })
}

/// Inserts fully formed employees as-is. A taken id or a dangling reference
/// fails the whole batch.
pub async fn insert_employees(store: &dyn RecordStore, employees: Vec<Employee>) -> Result<usize, StoreError> {
    let inserted = store
        .insert_batch(RecordBatch::Employees(employees), ConflictPolicy::Fail)
        .await?;
    info!("Inserted {} employees", inserted.len());
    Ok(inserted.len())
}
