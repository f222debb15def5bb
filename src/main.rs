use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use std::io;
use std::sync::Arc;

use hiring_ledger::config::Config;
use hiring_ledger::db::{PgStore, RecordStore};
use hiring_ledger::handlers;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|err| {
        error!("Invalid configuration: {}", err);
        io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
    })?;

    let pg_store = PgStore::connect(&config).await.map_err(|err| {
        error!("Failed to connect to the database: {}", err);
        io::Error::new(io::ErrorKind::ConnectionRefused, err.to_string())
    })?;
    pg_store
        .create_schema()
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

    let store: Arc<dyn RecordStore> = Arc::new(pg_store);

    info!("Starting server at {}", config.bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::from(store.clone()))
            .configure(handlers::routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
