//! CSV batch ingestion: parse the upload, validate every row against a
//! snapshot of existing ids, then write the accepted rows in one transaction.

pub mod parser;
pub mod validate;
pub mod writer;

use thiserror::Error;

pub use parser::{parse_rows, ParseError, RawRow, MAX_ROWS, MIN_ROWS};
pub use validate::{validate_rows, Accepted, CsvRecord, RejectReason, Rejection, Snapshot, Validated};
pub use writer::{insert_employees, persist, BatchReport};

use crate::db::{RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the whole pipeline for one upload. Nothing touches the store until
/// the text has parsed and its row count is within bounds.
pub async fn ingest_csv<R: CsvRecord>(store: &dyn RecordStore, text: &str) -> Result<BatchReport, IngestError> {
    let rows = parse_rows(text)?;
    let mut snapshot = Snapshot::load::<R>(store).await?;
    let validated = validate_rows::<R>(rows, &mut snapshot);
    Ok(persist(store, validated).await?)
}
