pub mod employee;
pub mod report;
pub mod upload;

use actix_web::web;

use crate::errors::AppError;

/// Registers every endpoint. The store is expected as
/// `web::Data<dyn RecordStore>` app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON payload: {}", err)).into()),
    )
    .service(
        web::resource("/upload-csv")
            .route(web::post().to(upload::upload_csv)),
    )
    .service(
        web::resource("/employees/upload-csv")
            .route(web::post().to(upload::upload_employees_csv)),
    )
    .service(
        web::resource("/employees/batch")
            .route(web::post().to(employee::add_employees_batch)),
    )
    .service(
        web::resource("/reports/hires-quarterly")
            .route(web::get().to(report::hires_quarterly)),
    )
    .service(
        web::resource("/reports/above-mean-hires")
            .route(web::get().to(report::above_mean_hires)),
    );
}
