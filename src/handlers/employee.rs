use actix_web::{web, HttpResponse};
use log::{error, warn};
use serde_json::{json, Value};

use crate::db::RecordStore;
use crate::errors::AppError;
use crate::ingest::{self, MAX_ROWS, MIN_ROWS};
use crate::models::Employee;
use crate::utils::validation::validate_payload;

fn parse_records(payload: Value) -> Result<Vec<Employee>, AppError> {
    let records = match payload {
        Value::Array(records) => records,
        _ => return Err(AppError::BadRequest("The payload must be a list".to_string())),
    };

    if !(MIN_ROWS..=MAX_ROWS).contains(&records.len()) {
        return Err(AppError::BadRequest(format!(
            "The number of records must be between {} and {}",
            MIN_ROWS, MAX_ROWS
        )));
    }

    records
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let context = format!("Record {}", idx + 1);
            let employee: Employee = serde_json::from_value(record)
                .map_err(|err| AppError::BadRequest(format!("{}: {}", context, err)))?;
            validate_payload(&employee, &context)?;
            Ok(employee)
        })
        .collect()
}

/// `POST /employees/batch`: inserts the given employees in one transaction,
/// without checking them against stored ids.
pub async fn add_employees_batch(
    store: web::Data<dyn RecordStore>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    let employees = parse_records(payload.into_inner()).map_err(|err| {
        warn!("Rejected employee batch: {}", err);
        err
    })?;

    match ingest::insert_employees(store.get_ref(), employees).await {
        Ok(count) => Ok(HttpResponse::Created().json(json!({
            "message": format!("{} employees inserted", count),
        }))),
        Err(err) => {
            error!("Employee batch insert failed: {}", err);
            Err(err.into())
        }
    }
}
