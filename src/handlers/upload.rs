use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use log::{error, warn};
use serde::Serialize;

use crate::db::RecordStore;
use crate::errors::AppError;
use crate::ingest::{self, BatchReport, CsvRecord, IngestError, Rejection};
use crate::models::{Department, Employee, Job};

#[derive(Serialize)]
struct UploadSummary {
    status: &'static str,
    loaded_records: usize,
    skipped_records: usize,
    details_of_skipped: Vec<Rejection>,
}

impl From<BatchReport> for UploadSummary {
    fn from(report: BatchReport) -> Self {
        UploadSummary {
            status: "Processing finished.",
            loaded_records: report.loaded,
            skipped_records: report.rejected.len(),
            details_of_skipped: report.rejected,
        }
    }
}

struct UploadFile {
    filename: String,
    content: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    file: Option<UploadFile>,
    table_name: Option<String>,
}

async fn read_form(mut payload: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.extend_from_slice(&chunk?);
        }

        match name.as_str() {
            "file" => {
                form.file = Some(UploadFile {
                    filename: filename.unwrap_or_default(),
                    content: data,
                });
            }
            "table_name" => {
                let value = String::from_utf8(data)
                    .map_err(|_| AppError::BadRequest("Parameter 'table_name' must be UTF-8 text".to_string()))?;
                form.table_name = Some(value);
            }
            _ => {}
        }
    }

    Ok(form)
}

fn csv_text(file: UploadFile) -> Result<String, AppError> {
    if !file.filename.ends_with(".csv") {
        return Err(AppError::BadRequest("Invalid file format. It must be a .csv file".to_string()));
    }
    String::from_utf8(file.content).map_err(|_| AppError::BadRequest("The file must be UTF-8 encoded".to_string()))
}

async fn run<R: CsvRecord>(store: &dyn RecordStore, text: &str, context: &str) -> Result<HttpResponse, AppError> {
    match ingest::ingest_csv::<R>(store, text).await {
        Ok(report) => Ok(HttpResponse::Ok().json(UploadSummary::from(report))),
        Err(IngestError::Parse(err)) => {
            warn!("Rejected {} upload: {}", R::KIND.table_name(), err);
            Err(AppError::BadRequest(err.to_string()))
        }
        Err(IngestError::Store(err)) => {
            error!("{} upload failed: {}", R::KIND.table_name(), err);
            Err(AppError::DatabaseError(format!("{}: {}", context, err)))
        }
    }
}

/// `POST /upload-csv`: departments or jobs, chosen by the `table_name` field.
pub async fn upload_csv(store: web::Data<dyn RecordStore>, payload: Multipart) -> Result<HttpResponse, AppError> {
    let form = read_form(payload).await?;

    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("No file found".to_string()))?;
    let table_name = match form.table_name {
        Some(name) if !file.filename.is_empty() => name,
        _ => return Err(AppError::BadRequest("Missing parameters: 'file' or 'table_name'".to_string())),
    };
    let text = csv_text(file)?;

    match table_name.as_str() {
        "departments" => run::<Department>(store.get_ref(), &text, "Error processing the file").await,
        "jobs" => run::<Job>(store.get_ref(), &text, "Error processing the file").await,
        other => Err(AppError::BadRequest(format!("Table '{}' is not supported.", other))),
    }
}

/// `POST /employees/upload-csv`
pub async fn upload_employees_csv(store: web::Data<dyn RecordStore>, payload: Multipart) -> Result<HttpResponse, AppError> {
    let form = read_form(payload).await?;

    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("No file found".to_string()))?;
    let text = csv_text(file)?;

    run::<Employee>(store.get_ref(), &text, "Error processing the employees file").await
}
