use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::RecordStore;
use crate::errors::AppError;

const DEFAULT_YEAR: &str = "2021";

#[derive(Deserialize)]
pub struct ReportQuery {
    year: Option<String>,
}

#[derive(Serialize)]
struct ReportResponse<T> {
    status: &'static str,
    result: Vec<T>,
}

impl<T: Serialize> ReportResponse<T> {
    fn ok(result: Vec<T>) -> HttpResponse {
        HttpResponse::Ok().json(ReportResponse { status: "ok", result })
    }
}

/// The requested year, or a ready 400 response carrying an empty result.
fn requested_year(query: &ReportQuery) -> Result<i32, HttpResponse> {
    let raw = query.year.as_deref().unwrap_or(DEFAULT_YEAR);
    raw.trim().parse::<i32>().map_err(|_| {
        HttpResponse::BadRequest().json(json!({
            "error": format!("The 'year' parameter must be an integer, got '{}'", raw),
            "result": [],
        }))
    })
}

/// `GET /reports/hires-quarterly`
pub async fn hires_quarterly(
    store: web::Data<dyn RecordStore>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    let year = match requested_year(&query) {
        Ok(year) => year,
        Err(response) => return Ok(response),
    };
    let rows = store.quarterly_hires(year).await?;
    Ok(ReportResponse::ok(rows))
}

/// `GET /reports/above-mean-hires`
pub async fn above_mean_hires(
    store: web::Data<dyn RecordStore>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, AppError> {
    let year = match requested_year(&query) {
        Ok(year) => year,
        Err(response) => return Ok(response),
    };
    let rows = store.departments_above_mean(year).await?;
    Ok(ReportResponse::ok(rows))
}
